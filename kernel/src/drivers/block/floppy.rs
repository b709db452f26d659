//! Floppy Disk Driver

use crate::device::block::{BlockDevice, BlockDeviceIoError, BlockDeviceMetadata};

pub struct FloppyDisk {
    drive_id: u8,
    direction: bool,
    step_index: u8,
}

impl FloppyDisk {
    /// Callers must ensure that only one instance of this driver exists for
    /// each drive ID
    pub unsafe fn new(drive_id: u8) -> Self {
        Self {
            drive_id,
            direction: false,
            step_index: 0,
        }
    }

    /// Resets the floppy disk to a known state. Should be called after
    /// instantiation.
    pub fn reset(&mut self) {}
}

impl BlockDevice for FloppyDisk {
    fn metadata(&self) -> BlockDeviceMetadata {
        BlockDeviceMetadata {
            block_size: 512,
            total_blocks: 2880,
        }
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BlockDeviceIoError> {
        todo!()
    }

    fn write(&self, offset: usize, buf: &[u8]) -> Result<usize, BlockDeviceIoError> {
        todo!()
    }
}

fn bridge_err(err: BlockDeviceIoError) -> vfscore::block::BlockDeviceError {
    match err {
        BlockDeviceIoError::OperationNotSupported => vfscore::block::BlockDeviceError::OperationNotSupported,
        BlockDeviceIoError::UnalignedOffset => vfscore::block::BlockDeviceError::UnalignedOffset,
        BlockDeviceIoError::OffsetOutOfBounds => vfscore::block::BlockDeviceError::OffsetOutOfBounds,
        BlockDeviceIoError::MismatchedBlockSize => vfscore::block::BlockDeviceError::MismatchedBlockSize,
    }
}

/// Bridges the kernel's own hardware-facing trait onto `vfscore`'s, so the
/// GPT scanner and FAT driver can read straight through a `FloppyDisk`
/// without vfscore knowing this crate exists.
impl vfscore::block::BlockDevice for FloppyDisk {
    fn metadata(&self) -> vfscore::block::BlockDeviceMetadata {
        let m = BlockDevice::metadata(self);
        vfscore::block::BlockDeviceMetadata {
            block_size: m.block_size,
            total_blocks: m.total_blocks,
        }
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, vfscore::block::BlockDeviceError> {
        BlockDevice::read(self, offset, buf).map_err(bridge_err)
    }

    fn write(&self, offset: usize, buf: &[u8]) -> Result<usize, vfscore::block::BlockDeviceError> {
        BlockDevice::write(self, offset, buf).map_err(bridge_err)
    }
}
