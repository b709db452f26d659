//! The narrow contract every filesystem plugin implements.

use alloc::string::String;

use crate::error::VfsError;

/// The two kinds of entry a driver can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
}

/// What a driver hands back to identify one entry: its kind, its byte size
/// (0 for directories), and an opaque token the driver alone interprets. The
/// core never inspects `token` beyond moving it around.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub kind: FileType,
    pub size: usize,
    pub token: u64,
}

/// One entry produced by `readdir` or `find`'s linear-scan drivers.
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: FileType,
    pub size: usize,
    pub token: u64,
}

/// A pluggable filesystem implementation. Two drivers ship with this crate
/// ([`crate::drivers::basic::BasicDriver`] and [`crate::drivers::memfs::MemFs`])
/// plus the read-only [`crate::fat::FatDriver`].
pub trait Driver: Send + Sync {
    fn read(&self, desc: &Descriptor, offset: usize, buf: &mut [u8]) -> Result<usize, VfsError>;

    fn write(&self, desc: &Descriptor, offset: usize, buf: &[u8]) -> Result<usize, VfsError>;

    /// Produces a fresh descriptor for `name` under the directory `desc`
    /// identifies. Does not touch the node cache.
    fn find(&self, desc: &Descriptor, name: &str) -> Result<Descriptor, VfsError>;

    fn create(&self, desc: &Descriptor, name: &str, kind: FileType) -> Result<(), VfsError>;

    /// The `index`-th child in driver-defined order.
    fn readdir(&self, desc: &Descriptor, index: usize) -> Result<DirEntryInfo, VfsError>;

    fn remove(&self, desc: &Descriptor, name: &str) -> Result<(), VfsError>;

    /// The driver's volume root descriptor.
    fn get_root(&self) -> Descriptor;
}
