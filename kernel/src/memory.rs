//! Physical memory bookkeeping: walks the bootloader-supplied memory map to
//! hand out page frames, and maps the active level-4 page table so the heap
//! (see [`crate::allocator`]) and future mappings can be installed.

use bootloader::bootinfo::{MemoryMap, MemoryRegionType};
use x86_64::structures::paging::{FrameAllocator, OffsetPageTable, PageTable, PhysFrame, Size4KiB};
use x86_64::{PhysAddr, VirtAddr};

/// Builds an [`OffsetPageTable`] over the currently active level-4 table,
/// assuming the entire physical address space is mapped starting at
/// `physical_memory_offset` (the bootloader's `map_physical_memory` feature
/// guarantees this).
///
/// # Safety
/// Must be called only once; callers must guarantee `physical_memory_offset`
/// is correct and that the complete physical memory is actually mapped there.
pub unsafe fn init(physical_memory_offset: VirtAddr) -> OffsetPageTable<'static> {
    let level_4_table = unsafe { active_level_4_table(physical_memory_offset) };
    unsafe { OffsetPageTable::new(level_4_table, physical_memory_offset) }
}

unsafe fn active_level_4_table(physical_memory_offset: VirtAddr) -> &'static mut PageTable {
    use x86_64::registers::control::Cr3;

    let (level_4_table_frame, _) = Cr3::read();

    let phys = level_4_table_frame.start_address();
    let virt = physical_memory_offset + phys.as_u64();
    let page_table_ptr: *mut PageTable = virt.as_mut_ptr();

    unsafe { &mut *page_table_ptr }
}

/// A [`FrameAllocator`] that hands out every `Usable` region the bootloader's
/// memory map reports, in order, never reusing a frame (matching the source
/// codebase's single-allocation-pass frame allocator — see
/// `memory-manager.hpp` in the original source: a bump allocator over
/// firmware-reported usable regions).
pub struct BootInfoFrameAllocator {
    memory_map: &'static MemoryMap,
    next: usize,
}

impl BootInfoFrameAllocator {
    /// # Safety
    /// The passed memory map must be valid: every region it marks `Usable`
    /// must actually be unused by anything else.
    pub unsafe fn init(memory_map: &'static MemoryMap) -> Self {
        Self { memory_map, next: 0 }
    }

    fn usable_frames(&self) -> impl Iterator<Item = PhysFrame> {
        let regions = self.memory_map.iter();
        let usable_regions = regions.filter(|r| r.region_type == MemoryRegionType::Usable);
        let addr_ranges = usable_regions.map(|r| r.range.start_addr()..r.range.end_addr());
        let frame_addresses = addr_ranges.flat_map(|r| r.step_by(4096));
        frame_addresses.map(|addr| PhysFrame::containing_address(PhysAddr::new(addr)))
    }
}

unsafe impl FrameAllocator<Size4KiB> for BootInfoFrameAllocator {
    fn allocate_frame(&mut self) -> Option<PhysFrame> {
        let frame = self.usable_frames().nth(self.next);
        self.next += 1;
        frame
    }
}
