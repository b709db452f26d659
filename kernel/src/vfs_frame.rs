//! The kernel's [`vfscore::drivers::memfs::FrameAllocator`] capability:
//! backs the memory driver's fixed-size pages with heap allocations rather
//! than a process-wide global (§4.5, §9 design note). Reclaimed pages are
//! kept on a free list so long-running shells that create and delete files
//! don't leak heap space one page at a time.

use alloc::boxed::Box;
use alloc::vec::Vec;

use spin::Mutex;
use vfscore::drivers::memfs::{FrameAllocator, FrameId, PAGE_BYTES};
use vfscore::VfsError;

type Page = Box<[u8; PAGE_BYTES]>;

#[derive(Default)]
pub struct KernelFrameAllocator {
    pages: Mutex<Vec<Option<Page>>>,
    free: Mutex<Vec<u64>>,
}

impl KernelFrameAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameAllocator for KernelFrameAllocator {
    fn allocate(&self) -> Result<FrameId, VfsError> {
        if let Some(id) = self.free.lock().pop() {
            return Ok(FrameId(id));
        }

        let mut pages = self.pages.lock();
        let id = pages.len() as u64;
        pages.push(Some(Box::new([0u8; PAGE_BYTES])));
        Ok(FrameId(id))
    }

    fn deallocate(&self, frame: FrameId) {
        let mut pages = self.pages.lock();
        if let Some(slot) = pages.get_mut(frame.0 as usize) {
            *slot = None;
        }
        self.free.lock().push(frame.0);
    }

    fn read(&self, frame: FrameId, offset: usize, buf: &mut [u8]) {
        let pages = self.pages.lock();
        let page = pages[frame.0 as usize].as_ref().expect("read from a deallocated frame");
        buf.copy_from_slice(&page[offset..offset + buf.len()]);
    }

    fn write(&self, frame: FrameId, offset: usize, buf: &[u8]) {
        let mut pages = self.pages.lock();
        let page = pages[frame.0 as usize].as_mut().expect("write to a deallocated frame");
        page[offset..offset + buf.len()].copy_from_slice(buf);
    }
}
