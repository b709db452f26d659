//! Error kinds shared by the controller, the node cache, and every driver.

/// Every fallible operation in this crate returns one of these kinds, never a
/// raw driver-specific code. Drivers below the VFS proper (block devices,
/// GPT) have their own small error enums that get folded into this one at
/// the boundary where they're consumed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("not implemented")]
    NotImplemented,
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("i/o error")]
    IoError,
    #[error("invalid data")]
    InvalidData,
    #[error("invalid sector")]
    InvalidSector,
    #[error("not a directory")]
    NotDirectory,
    #[error("not a file")]
    NotFile,
    #[error("no such file")]
    NoSuchFile,
    #[error("file exists")]
    FileExists,
    #[error("file opened")]
    FileOpened,
    #[error("not opened")]
    NotOpened,
    #[error("volume already mounted")]
    VolumeMounted,
    #[error("volume busy")]
    VolumeBusy,
    #[error("not mounted")]
    NotMounted,
    #[error("end of file")]
    EndOfFile,
    #[error("not a valid MBR")]
    NotMbr,
    #[error("not a valid GPT")]
    NotGpt,
    #[error("unsupported GPT layout")]
    UnsupportedGpt,
    #[error("not a FAT volume")]
    NotFat,
}

impl From<crate::block::BlockDeviceError> for VfsError {
    fn from(_: crate::block::BlockDeviceError) -> Self {
        VfsError::IoError
    }
}
