//! Fixtures used only by this crate's own test suite: a bump-pointer frame
//! allocator for the memory driver and an in-memory block device for the
//! FAT32/GPT drivers. Neither is exposed outside `#[cfg(test)]`.

use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::block::{BlockDevice, BlockDeviceError, BlockDeviceMetadata};
use crate::drivers::memfs::{FrameAllocator, FrameId, PAGE_BYTES};
use crate::error::VfsError;

pub struct BumpFrameAllocator {
    pages: Mutex<Vec<[u8; PAGE_BYTES]>>,
}

impl BumpFrameAllocator {
    pub fn new() -> Self {
        Self { pages: Mutex::new(Vec::new()) }
    }
}

impl FrameAllocator for BumpFrameAllocator {
    fn allocate(&self) -> Result<FrameId, VfsError> {
        let mut pages = self.pages.lock();
        let id = pages.len() as u64;
        pages.push([0u8; PAGE_BYTES]);
        Ok(FrameId(id))
    }

    fn deallocate(&self, _frame: FrameId) {
        // The bump allocator never reclaims; fine for a short-lived test.
    }

    fn read(&self, frame: FrameId, offset: usize, buf: &mut [u8]) {
        let pages = self.pages.lock();
        buf.copy_from_slice(&pages[frame.0 as usize][offset..offset + buf.len()]);
    }

    fn write(&self, frame: FrameId, offset: usize, buf: &[u8]) {
        let mut pages = self.pages.lock();
        pages[frame.0 as usize][offset..offset + buf.len()].copy_from_slice(buf);
    }
}

/// A `Vec<u8>`-backed block device, standing in for a disk image in tests.
#[derive(Clone)]
pub struct InMemoryBlockDevice {
    block_size: usize,
    data: alloc::sync::Arc<Mutex<Vec<u8>>>,
}

impl InMemoryBlockDevice {
    pub fn new(block_size: usize, data: Vec<u8>) -> Self {
        Self {
            block_size,
            data: alloc::sync::Arc::new(Mutex::new(data)),
        }
    }

    pub fn zeroed(block_size: usize, total_blocks: usize) -> Self {
        Self::new(block_size, vec![0u8; block_size * total_blocks])
    }
}

impl BlockDevice for InMemoryBlockDevice {
    fn metadata(&self) -> BlockDeviceMetadata {
        let data = self.data.lock();
        BlockDeviceMetadata {
            block_size: self.block_size,
            total_blocks: data.len() / self.block_size,
        }
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BlockDeviceError> {
        let data = self.data.lock();
        if offset + buf.len() > data.len() {
            return Err(BlockDeviceError::OffsetOutOfBounds);
        }
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(buf.len())
    }

    fn write(&self, offset: usize, buf: &[u8]) -> Result<usize, BlockDeviceError> {
        let mut data = self.data.lock();
        if offset + buf.len() > data.len() {
            return Err(BlockDeviceError::OffsetOutOfBounds);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }
}
