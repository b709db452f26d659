//! Block-device abstraction the FAT32 driver and GPT scanner read through.
//! Out of the distilled core's test surface (SPEC_FULL.md §1), but part of
//! the crate: mirrors the shape of the host kernel's own
//! `device::block::BlockDevice` trait so the two can be bridged with a
//! one-line wrapper impl instead of duplicated.

pub mod cache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDeviceMetadata {
    pub block_size: usize,
    pub total_blocks: usize,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDeviceError {
    #[error("operation not supported")]
    OperationNotSupported,
    #[error("offset not aligned to block size")]
    UnalignedOffset,
    #[error("offset out of range")]
    OffsetOutOfBounds,
    #[error("buffer length not a multiple of block size")]
    MismatchedBlockSize,
}

/// An abstract device which can read and write data to/from a store in
/// fixed-size blocks.
pub trait BlockDevice: Send + Sync {
    fn metadata(&self) -> BlockDeviceMetadata;

    fn read(&self, _offset: usize, _buf: &mut [u8]) -> Result<usize, BlockDeviceError> {
        Err(BlockDeviceError::OperationNotSupported)
    }

    fn write(&self, _offset: usize, _buf: &[u8]) -> Result<usize, BlockDeviceError> {
        Err(BlockDeviceError::OperationNotSupported)
    }
}
