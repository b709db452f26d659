//! The persistent, always-empty root driver the controller owns directly.
//! Every operation besides `get_root` fails, matching the reference
//! implementation's always-empty root (it never stores anything of its
//! own; the real filesystem starts at whatever gets mounted over it).

use crate::driver::{Descriptor, DirEntryInfo, Driver, FileType};
use crate::error::VfsError;

pub struct BasicDriver;

impl Driver for BasicDriver {
    fn read(&self, _desc: &Descriptor, _offset: usize, _buf: &mut [u8]) -> Result<usize, VfsError> {
        Err(VfsError::InvalidData)
    }

    fn write(&self, _desc: &Descriptor, _offset: usize, _buf: &[u8]) -> Result<usize, VfsError> {
        Err(VfsError::InvalidData)
    }

    fn find(&self, _desc: &Descriptor, _name: &str) -> Result<Descriptor, VfsError> {
        Err(VfsError::InvalidData)
    }

    fn create(&self, _desc: &Descriptor, _name: &str, _kind: FileType) -> Result<(), VfsError> {
        Err(VfsError::InvalidData)
    }

    fn readdir(&self, _desc: &Descriptor, _index: usize) -> Result<DirEntryInfo, VfsError> {
        Err(VfsError::InvalidData)
    }

    fn remove(&self, _desc: &Descriptor, _name: &str) -> Result<(), VfsError> {
        Err(VfsError::InvalidData)
    }

    fn get_root(&self) -> Descriptor {
        Descriptor {
            kind: FileType::Directory,
            size: 0,
            token: 0,
        }
    }
}
