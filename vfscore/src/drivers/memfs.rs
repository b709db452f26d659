//! In-memory driver: directories and files backed by fixed-size pages
//! acquired from an injected frame allocator (§4.5).

use alloc::collections::btree_map::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::driver::{Descriptor, DirEntryInfo, Driver, FileType};
use crate::error::VfsError;

pub const PAGE_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId(pub u64);

/// A capability that allocates and releases fixed-size pages, and moves
/// bytes in and out of them. Passed into [`MemFs::new`] rather than reached
/// through a process-wide global (§9 design note, §4.5).
pub trait FrameAllocator: Send + Sync {
    fn allocate(&self) -> Result<FrameId, VfsError>;
    fn deallocate(&self, frame: FrameId);
    fn read(&self, frame: FrameId, offset: usize, buf: &mut [u8]);
    fn write(&self, frame: FrameId, offset: usize, buf: &[u8]);
}

struct MemFile {
    size: usize,
    pages: Vec<FrameId>,
}

struct MemDirectory {
    children: BTreeMap<String, u64>,
}

enum MemObject {
    File(MemFile),
    Directory(MemDirectory),
}

struct Entry {
    kind: FileType,
    object: MemObject,
}

/// The memory driver. `desc.token` identifies an entry in `objects`.
pub struct MemFs<A: FrameAllocator> {
    allocator: A,
    objects: Mutex<BTreeMap<u64, Entry>>,
    next_token: AtomicU64,
}

const ROOT_TOKEN: u64 = 0;

impl<A: FrameAllocator> MemFs<A> {
    pub fn new(allocator: A) -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(
            ROOT_TOKEN,
            Entry {
                kind: FileType::Directory,
                object: MemObject::Directory(MemDirectory {
                    children: BTreeMap::new(),
                }),
            },
        );
        Self {
            allocator,
            objects: Mutex::new(objects),
            next_token: AtomicU64::new(ROOT_TOKEN + 1),
        }
    }

    fn alloc_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn page_of(&self, offset: usize) -> (usize, usize) {
        (offset / PAGE_BYTES, offset % PAGE_BYTES)
    }
}

impl<A: FrameAllocator> Driver for MemFs<A> {
    fn read(&self, desc: &Descriptor, offset: usize, buf: &mut [u8]) -> Result<usize, VfsError> {
        if desc.kind != FileType::Regular {
            return Err(VfsError::NotFile);
        }
        let objects = self.objects.lock();
        let Some(Entry { object: MemObject::File(file), .. }) = objects.get(&desc.token) else {
            return Err(VfsError::NotFile);
        };
        if offset >= file.size {
            return Err(VfsError::EndOfFile);
        }
        let to_read = buf.len().min(file.size - offset);

        let mut done = 0;
        while done < to_read {
            let (page_index, page_offset) = self.page_of(offset + done);
            let chunk = (PAGE_BYTES - page_offset).min(to_read - done);
            let frame = file.pages[page_index];
            self.allocator.read(frame, page_offset, &mut buf[done..done + chunk]);
            done += chunk;
        }
        Ok(done)
    }

    fn write(&self, desc: &Descriptor, offset: usize, buf: &[u8]) -> Result<usize, VfsError> {
        if desc.kind != FileType::Regular {
            return Err(VfsError::InvalidData);
        }
        let mut objects = self.objects.lock();
        let Some(Entry { object: MemObject::File(file), .. }) = objects.get_mut(&desc.token) else {
            return Err(VfsError::NotFile);
        };

        let needed_pages = (offset + buf.len()).div_ceil(PAGE_BYTES);
        while file.pages.len() < needed_pages {
            file.pages.push(self.allocator.allocate()?);
        }

        let mut done = 0;
        while done < buf.len() {
            let (page_index, page_offset) = self.page_of(offset + done);
            let chunk = (PAGE_BYTES - page_offset).min(buf.len() - done);
            let frame = file.pages[page_index];
            self.allocator.write(frame, page_offset, &buf[done..done + chunk]);
            done += chunk;
        }

        file.size = file.size.max(offset + buf.len());
        Ok(done)
    }

    fn find(&self, desc: &Descriptor, name: &str) -> Result<Descriptor, VfsError> {
        let objects = self.objects.lock();
        let Some(Entry { object: MemObject::Directory(dir), .. }) = objects.get(&desc.token) else {
            return Err(VfsError::NotDirectory);
        };
        let token = *dir.children.get(name).ok_or(VfsError::NoSuchFile)?;
        let entry = objects.get(&token).expect("dangling memfs child token");
        Ok(Descriptor {
            kind: entry.kind,
            size: match &entry.object {
                MemObject::File(f) => f.size,
                MemObject::Directory(_) => 0,
            },
            token,
        })
    }

    fn create(&self, desc: &Descriptor, name: &str, kind: FileType) -> Result<(), VfsError> {
        let mut objects = self.objects.lock();
        {
            let Some(Entry { object: MemObject::Directory(dir), .. }) = objects.get(&desc.token) else {
                return Err(VfsError::NotDirectory);
            };
            if dir.children.contains_key(name) {
                return Err(VfsError::FileExists);
            }
        }

        let token = self.alloc_token();
        let object = match kind {
            FileType::Regular => MemObject::File(MemFile { size: 0, pages: Vec::new() }),
            FileType::Directory => MemObject::Directory(MemDirectory { children: BTreeMap::new() }),
        };
        objects.insert(token, Entry { kind, object });

        let Some(Entry { object: MemObject::Directory(dir), .. }) = objects.get_mut(&desc.token) else {
            unreachable!("checked above");
        };
        dir.children.insert(name.to_string(), token);
        Ok(())
    }

    fn readdir(&self, desc: &Descriptor, index: usize) -> Result<DirEntryInfo, VfsError> {
        let objects = self.objects.lock();
        let Some(Entry { object: MemObject::Directory(dir), .. }) = objects.get(&desc.token) else {
            return Err(VfsError::NotDirectory);
        };
        let (name, token) = dir.children.iter().nth(index).ok_or(VfsError::IndexOutOfRange)?;
        let entry = objects.get(token).expect("dangling memfs child token");
        Ok(DirEntryInfo {
            name: name.clone(),
            kind: entry.kind,
            size: match &entry.object {
                MemObject::File(f) => f.size,
                MemObject::Directory(_) => 0,
            },
            token: *token,
        })
    }

    fn remove(&self, desc: &Descriptor, name: &str) -> Result<(), VfsError> {
        let mut objects = self.objects.lock();
        let token = {
            let Some(Entry { object: MemObject::Directory(dir), .. }) = objects.get_mut(&desc.token) else {
                return Err(VfsError::NotDirectory);
            };
            dir.children.remove(name).ok_or(VfsError::NoSuchFile)?
        };
        if let Some(Entry { object: MemObject::File(file), .. }) = objects.remove(&token) {
            for page in file.pages {
                self.allocator.deallocate(page);
            }
        }
        Ok(())
    }

    fn get_root(&self) -> Descriptor {
        Descriptor {
            kind: FileType::Directory,
            size: 0,
            token: ROOT_TOKEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::test_support::BumpFrameAllocator;

    #[test]
    fn write_then_read_back_across_page_boundary() {
        let fs = MemFs::new(BumpFrameAllocator::new());
        let root = fs.get_root();
        fs.create(&root, "file", FileType::Regular).unwrap();
        let desc = fs.find(&root, "file").unwrap();

        let mut big = [0u8; PAGE_BYTES * 3];
        for (i, b) in big.iter_mut().enumerate() {
            *b = i as u8;
        }
        let head = PAGE_BYTES + 1;
        fs.write(&desc, head, &big).unwrap();
        let desc = fs.find(&root, "file").unwrap();

        let mut window = [0u8; 256];
        fs.read(&desc, head, &mut window).unwrap();
        assert_eq!(&window[..], &big[..256]);
    }

    #[test]
    fn read_past_end_is_end_of_file() {
        let fs = MemFs::new(BumpFrameAllocator::new());
        let root = fs.get_root();
        fs.create(&root, "file", FileType::Regular).unwrap();
        let desc = fs.find(&root, "file").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(fs.read(&desc, 0, &mut buf), Err(VfsError::EndOfFile));
    }

    #[test]
    fn directory_write_is_invalid_data() {
        let fs = MemFs::new(BumpFrameAllocator::new());
        let root = fs.get_root();
        assert_eq!(fs.write(&root, 0, b"x"), Err(VfsError::InvalidData));
    }

    #[test]
    fn page_count_tracks_size() {
        let fs = MemFs::new(BumpFrameAllocator::new());
        let root = fs.get_root();
        fs.create(&root, "file", FileType::Regular).unwrap();
        let desc = fs.find(&root, "file").unwrap();
        fs.write(&desc, 0, &[0u8; PAGE_BYTES + 10]).unwrap();

        let objects = fs.objects.lock();
        let Entry { object: MemObject::File(file), .. } = objects.get(&desc.token).unwrap() else {
            panic!("expected file");
        };
        assert_eq!(file.pages.len(), 2);
        assert_eq!(file.size, PAGE_BYTES + 10);
    }
}
