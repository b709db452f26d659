//! Read-only FAT32 support (§4.6, §10.7): BPB parsing, directory entry
//! layout, long-filename reconstruction, and the [`Driver`] implementation
//! that ties them to a [`crate::block::BlockDevice`].

mod bpb;
mod dirent;
mod driver;
mod lfn;

pub use bpb::Bpb;
pub use dirent::Attribute;
pub use driver::FatDriver;
