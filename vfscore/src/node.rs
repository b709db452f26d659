//! The cached representation of one filesystem entry: `OpenInfo`.

use alloc::collections::btree_map::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};

use spin::Mutex;

use crate::driver::{Descriptor, Driver, FileType};
use crate::error::VfsError;

pub type NodeRef = Arc<Mutex<Node>>;

/// One reachable name at one point in the mount tree.
///
/// Invariants (see SPEC_FULL.md §3): `write_count <= 1`; `write_count == 1`
/// implies `read_count == 0` and vice versa; a child's `parent` always
/// points back at the containing node; a mounted node's target has
/// `volume_root = true` and `parent = None`; a busy node is never evicted.
pub struct Node {
    pub name: String,
    pub kind: FileType,
    pub size: usize,
    pub token: u64,
    pub read_count: usize,
    pub write_count: usize,
    pub parent: Option<Weak<Mutex<Node>>>,
    pub mount: Option<NodeRef>,
    pub children: BTreeMap<String, NodeRef>,
    pub volume_root: bool,
    pub driver: Arc<dyn Driver>,
}

impl Node {
    pub fn new_volume_root(desc: Descriptor, driver: Arc<dyn Driver>) -> Self {
        Self {
            name: String::from("/"),
            kind: desc.kind,
            size: desc.size,
            token: desc.token,
            read_count: 0,
            write_count: 0,
            parent: None,
            mount: None,
            children: BTreeMap::new(),
            volume_root: true,
            driver,
        }
    }

    pub fn new_child(
        desc: Descriptor,
        name: impl Into<String>,
        parent: Weak<Mutex<Node>>,
        driver: Arc<dyn Driver>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: desc.kind,
            size: desc.size,
            token: desc.token,
            read_count: 0,
            write_count: 0,
            parent: Some(parent),
            mount: None,
            children: BTreeMap::new(),
            volume_root: false,
            driver,
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            kind: self.kind,
            size: self.size,
            token: self.token,
        }
    }

    /// Invariant 5: busy iff held, populated, or mounted-over.
    pub fn is_busy(&self) -> bool {
        self.read_count > 0 || self.write_count > 0 || !self.children.is_empty() || self.mount.is_some()
    }

    pub fn is_volume_root(&self) -> bool {
        self.volume_root
    }

    /// §4.2 `read`: requires the node to be held for reading.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, VfsError> {
        if self.read_count == 0 {
            return Err(VfsError::NotOpened);
        }
        self.driver.read(&self.descriptor(), offset, buf)
    }

    /// §4.2 `write`: requires the node to be held for writing.
    pub fn write(&mut self, offset: usize, buf: &[u8]) -> Result<usize, VfsError> {
        if self.write_count == 0 {
            return Err(VfsError::NotOpened);
        }
        let written = self.driver.write(&self.descriptor(), offset, buf)?;
        // The on-disk/in-memory size may have grown; reflect it so later
        // `get_size`/`read` calls on this cached node see it without a
        // round trip through the driver.
        self.size = self.size.max(offset + written);
        Ok(written)
    }

    /// §4.2 `find`: asks the driver for a fresh, not-yet-cached child.
    pub fn find(&self, name: &str) -> Result<Descriptor, VfsError> {
        if self.read_count == 0 {
            return Err(VfsError::NotOpened);
        }
        self.driver.find(&self.descriptor(), name)
    }

    /// §4.2 `create`: delegates; the new entry is not inserted into
    /// `children` here, the next path walk does that.
    pub fn create(&self, name: &str, kind: FileType) -> Result<(), VfsError> {
        if self.write_count == 0 {
            return Err(VfsError::NotOpened);
        }
        self.driver.create(&self.descriptor(), name, kind)
    }

    pub fn readdir(&self, index: usize) -> Result<crate::driver::DirEntryInfo, VfsError> {
        if self.read_count == 0 {
            return Err(VfsError::NotOpened);
        }
        self.driver.readdir(&self.descriptor(), index)
    }

    /// §4.2 `remove`: conservatively refuses if the child is cached at all,
    /// not only if it is currently held (design note (a) in SPEC_FULL.md).
    pub fn remove(&self, name: &str) -> Result<(), VfsError> {
        if self.write_count == 0 {
            return Err(VfsError::NotOpened);
        }
        if self.children.contains_key(name) {
            return Err(VfsError::FileOpened);
        }
        self.driver.remove(&self.descriptor(), name)
    }
}
