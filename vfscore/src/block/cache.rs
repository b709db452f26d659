//! A sector-indexed cache in front of any [`BlockDevice`], reading through
//! on a miss. Shape matches the reference implementation's own sector
//! cache, just expressed against this crate's trait.

use alloc::collections::btree_map::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use super::{BlockDevice, BlockDeviceError, BlockDeviceMetadata};

struct CachedSector {
    dirty: bool,
    data: Vec<u8>,
}

pub struct CachingBlockDevice<D: BlockDevice> {
    inner: D,
    sectors: Mutex<BTreeMap<u64, CachedSector>>,
}

impl<D: BlockDevice> CachingBlockDevice<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            sectors: Mutex::new(BTreeMap::new()),
        }
    }

    fn block_size(&self) -> usize {
        self.inner.metadata().block_size
    }
}

impl<D: BlockDevice> BlockDevice for CachingBlockDevice<D> {
    fn metadata(&self) -> BlockDeviceMetadata {
        self.inner.metadata()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BlockDeviceError> {
        let block_size = self.block_size();
        if offset % block_size != 0 {
            return Err(BlockDeviceError::UnalignedOffset);
        }
        if buf.len() % block_size != 0 {
            return Err(BlockDeviceError::MismatchedBlockSize);
        }

        let mut sectors = self.sectors.lock();
        for (chunk_index, chunk) in buf.chunks_mut(block_size).enumerate() {
            let sector = (offset / block_size + chunk_index) as u64;
            if !sectors.contains_key(&sector) {
                let mut data = vec![0u8; block_size];
                self.inner.read(sector as usize * block_size, &mut data)?;
                sectors.insert(sector, CachedSector { dirty: false, data });
            }
            chunk.copy_from_slice(&sectors[&sector].data);
        }
        Ok(buf.len())
    }

    fn write(&self, offset: usize, buf: &[u8]) -> Result<usize, BlockDeviceError> {
        let block_size = self.block_size();
        if offset % block_size != 0 {
            return Err(BlockDeviceError::UnalignedOffset);
        }
        if buf.len() % block_size != 0 {
            return Err(BlockDeviceError::MismatchedBlockSize);
        }

        let mut sectors = self.sectors.lock();
        for (chunk_index, chunk) in buf.chunks(block_size).enumerate() {
            let sector = (offset / block_size + chunk_index) as u64;
            sectors.insert(
                sector,
                CachedSector {
                    dirty: true,
                    data: chunk.to_vec(),
                },
            );
        }
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::test_support::InMemoryBlockDevice;

    #[test]
    fn reads_through_on_miss_and_caches() {
        let mut backing = vec![0u8; 512 * 4];
        backing[512] = 0xAB;
        let device = InMemoryBlockDevice::new(512, backing);
        let cache = CachingBlockDevice::new(device);

        let mut buf = [0u8; 512];
        cache.read(512, &mut buf).unwrap();
        assert_eq!(buf[0], 0xAB);

        assert_eq!(cache.sectors.lock().len(), 1);
    }

    #[test]
    fn writes_are_visible_without_touching_backing_store() {
        let device = InMemoryBlockDevice::zeroed(512, 4);
        let cache = CachingBlockDevice::new(device);

        cache.write(0, &[1u8; 512]).unwrap();
        let mut buf = [0u8; 512];
        cache.read(0, &mut buf).unwrap();
        assert_eq!(buf, [1u8; 512]);
    }
}
