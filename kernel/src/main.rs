#![no_std]
#![no_main]

extern crate alloc;

use alloc::sync::Arc;

use bootloader::BootInfo;
use x86_64::VirtAddr;

use vga::println;
use vfscore::{FileType, OpenMode, VfsError};

mod allocator;
mod device;
mod drivers;
mod gdt;
mod interrupts;
mod memory;
mod panic;
mod shell;
mod task;
mod util;
mod vfs_frame;
mod vga;

use task::Task;
use task::executor::Executor;

bootloader::entry_point!(kernel_main);

/// The entrypoint into the kernel. Do NOT call this function directly. It
/// gets invoked automatically by the bootloader after setting up the stack,
/// paging, and passing along the memory map via `boot_info`.
fn kernel_main(boot_info: &'static BootInfo) -> ! {
    println!("Riptide booting...");

    gdt::init_gdt();
    interrupts::init_idt();
    interrupts::init_pics();

    let physical_memory_offset = VirtAddr::new(boot_info.physical_memory_offset);
    let mut mapper = unsafe { memory::init(physical_memory_offset) };
    let mut frame_allocator = unsafe { memory::BootInfoFrameAllocator::init(&boot_info.memory_map) };

    allocator::init_heap(&mut mapper, &mut frame_allocator).expect("heap initialization failed");

    x86_64::instructions::interrupts::enable();

    mount_boot_volume();

    let mut executor = Executor::new();
    executor.spawn(Task::new(shell::run()));
    executor.run();
}

/// Scans the primary ATA disk for a GPT partition table and, if its ESP
/// carries a FAT32 volume, grafts it in read-only at `/boot` alongside the
/// memfs root (§10.5, §10.6). Absence of a disk, a partition table, or a
/// recognizable FAT32 volume is diagnostic, not fatal: the shell still boots
/// against its memfs root either way.
fn mount_boot_volume() {
    // SAFETY: the only `AtaDisk` constructed for this bus, built once here.
    let disk = unsafe { drivers::block::ata::AtaDisk::new(2880) };

    let partitions = match vfscore::gpt::find_partitions(&disk) {
        Ok(partitions) => partitions,
        Err(err) => {
            println!("boot disk: no GPT partition table found ({err})");
            return;
        }
    };

    let Some(esp) = partitions
        .into_iter()
        .find(|p| p.filesystem == vfscore::gpt::Filesystem::Fat32)
    else {
        println!("boot disk: no FAT32 (ESP) partition found");
        return;
    };

    let cached = vfscore::block::cache::CachingBlockDevice::new(esp.device);
    let driver = match vfscore::fat::FatDriver::new(cached) {
        Ok(driver) => driver,
        Err(err) => {
            println!("boot disk: FAT32 volume rejected: {err}");
            return;
        }
    };

    let controller = shell::controller();

    let root = controller
        .open("/", OpenMode::Write)
        .expect("memfs root mount must already exist");
    if let Err(err) = root.create("boot", FileType::Directory) {
        if err != VfsError::FileExists {
            println!("boot disk: mkdir /boot failed: {err}");
            let _ = root.close();
            return;
        }
    }
    let _ = root.close();

    match controller.mount("/boot", Arc::new(driver)) {
        Ok(()) => println!("boot disk: FAT32 volume mounted at /boot"),
        Err(err) => println!("boot disk: mount /boot failed: {err}"),
    }
}
