//! The controller (open/close/mount/unmount) and the `Handle` capability it
//! hands back to callers.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::driver::{DirEntryInfo, Driver, FileType};
use crate::error::VfsError;
use crate::node::{Node, NodeRef};
use crate::path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Follows `mount` links until the tip of the chain, the node a path walk
/// actually observes.
fn follow_mounts(mut node: NodeRef) -> NodeRef {
    loop {
        let next = node.lock().mount.clone();
        match next {
            Some(mounted) => node = mounted,
            None => return node,
        }
    }
}

/// §4.3 `try_open`: enforces invariants (1)-(2) and increments the matching
/// counter, or fails with `FileOpened` without touching any counter.
fn try_open(node: &NodeRef, mode: OpenMode) -> Result<(), VfsError> {
    let mut n = node.lock();
    match mode {
        OpenMode::Write => {
            if n.write_count >= 1 || n.read_count >= 1 {
                return Err(VfsError::FileOpened);
            }
            n.write_count += 1;
        }
        OpenMode::Read => {
            if n.write_count >= 1 {
                return Err(VfsError::FileOpened);
            }
            n.read_count += 1;
        }
    }
    Ok(())
}

pub(crate) struct HandleState {
    pub node: NodeRef,
    pub mode: OpenMode,
}

/// Decrements the handle's counter, then walks upward through `parent`
/// links evicting every node that becomes non-busy, stopping at the first
/// busy or volume-root node or when `parent` is null (§4.3 `close`).
fn close_state(state: HandleState) {
    {
        let mut n = state.node.lock();
        match state.mode {
            OpenMode::Read => n.read_count = n.read_count.saturating_sub(1),
            OpenMode::Write => n.write_count = n.write_count.saturating_sub(1),
        }
    }

    let mut current = Some(state.node);
    while let Some(cur) = current {
        let (busy, vroot, parent, name) = {
            let n = cur.lock();
            (n.is_busy(), n.is_volume_root(), n.parent.clone(), n.name.clone())
        };
        if busy || vroot {
            break;
        }
        let Some(parent_weak) = parent else {
            break;
        };
        let Some(parent_arc) = parent_weak.upgrade() else {
            break;
        };
        parent_arc.lock().children.remove(&name);
        current = Some(parent_arc);
    }
}

/// Thin wrapper around a node reference and the mode it was opened with
/// (§4.7). Closing is a scoped resource: dropping a `Handle` without an
/// explicit [`Handle::close`] still releases the counter it holds, the same
/// "defuse on success" shape [`crate::util`]... mirrors with `scopeguard`.
pub struct Handle(scopeguard::ScopeGuard<HandleState, fn(HandleState)>);

impl Handle {
    fn new(node: NodeRef, mode: OpenMode) -> Self {
        Self(scopeguard::guard(HandleState { node, mode }, close_state as fn(HandleState)))
    }

    fn node(&self) -> &NodeRef {
        &self.0.node
    }

    pub fn mode(&self) -> OpenMode {
        self.0.mode
    }

    pub fn get_size(&self) -> usize {
        self.node().lock().size
    }

    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, VfsError> {
        self.node().lock().read(offset, buf)
    }

    /// Write-side operation: fails with `NotOpened` unless this handle was
    /// opened in `Write` mode (§4.7).
    pub fn write(&self, offset: usize, buf: &[u8]) -> Result<usize, VfsError> {
        if self.mode() != OpenMode::Write {
            return Err(VfsError::NotOpened);
        }
        self.node().lock().write(offset, buf)
    }

    pub fn find(&self, name: &str) -> Result<crate::driver::Descriptor, VfsError> {
        self.node().lock().find(name)
    }

    /// Write-side operation.
    pub fn create(&self, name: &str, kind: FileType) -> Result<(), VfsError> {
        if self.mode() != OpenMode::Write {
            return Err(VfsError::NotOpened);
        }
        self.node().lock().create(name, kind)
    }

    pub fn readdir(&self, index: usize) -> Result<DirEntryInfo, VfsError> {
        self.node().lock().readdir(index)
    }

    /// Write-side operation.
    pub fn remove(&self, name: &str) -> Result<(), VfsError> {
        if self.mode() != OpenMode::Write {
            return Err(VfsError::NotOpened);
        }
        self.node().lock().remove(name)
    }

    /// §4.7 `Handle::open`: if `name` is already cached, follow any mount
    /// chain from there; otherwise ask the driver via `find`. Only inserts
    /// the freshly produced node into `children` once `try_open` succeeds.
    pub fn open(&self, name: &str, mode: OpenMode) -> Result<Handle, VfsError> {
        let cached = self.node().lock().children.get(name).cloned();

        let (backing, freshly_created) = match cached {
            Some(child) => (child, false),
            None => {
                let desc = self.node().lock().find(name)?;
                let weak = Arc::downgrade(self.node());
                let driver = self.node().lock().driver.clone();
                let child = Arc::new(Mutex::new(Node::new_child(desc, name, weak, driver)));
                (child, true)
            }
        };

        let target = follow_mounts(backing.clone());
        try_open(&target, mode)?;

        if freshly_created {
            self.node().lock().children.insert(name.to_string(), backing);
        }

        Ok(Handle::new(target, mode))
    }

    /// Consumes the guard immediately, running the same release logic as a
    /// bare drop would, but synchronously and exactly once.
    pub fn close(self) -> Result<(), VfsError> {
        let state = scopeguard::ScopeGuard::into_inner(self.0);
        close_state(state);
        Ok(())
    }
}

struct MountEntry {
    path: String,
    mountpoint: NodeRef,
    volume_root: NodeRef,
    write_handle: Handle,
    driver: Arc<dyn Driver>,
}

/// A sink for the one place this core logs rather than returns an error
/// (§7, §10.2): `open_parent_directory`'s internal close failure, which
/// indicates an invariant violation rather than recoverable caller state.
pub type LogSink = Arc<dyn Fn(core::fmt::Arguments) + Send + Sync>;

/// Orchestrates open/close/mount/unmount; owns the persistent root node and
/// the list of active mounts (§4.3).
pub struct Controller {
    root: NodeRef,
    mounts: Mutex<Vec<MountEntry>>,
    logger: Option<LogSink>,
}

impl Controller {
    pub fn new(basic_driver: Arc<dyn Driver>) -> Self {
        let root_desc = basic_driver.get_root();
        let root = Arc::new(Mutex::new(Node::new_volume_root(root_desc, basic_driver)));
        Self {
            root,
            mounts: Mutex::new(Vec::new()),
            logger: None,
        }
    }

    /// Attaches a log sink invoked on the internal close failures described
    /// above. The kernel wires the VGA writer here; tests wire a `Vec<String>`
    /// collector; a bare `Controller::new` stays silent.
    pub fn with_logger(mut self, logger: LogSink) -> Self {
        self.logger = Some(logger);
        self
    }

    fn log_bug(&self, args: core::fmt::Arguments) {
        if let Some(logger) = &self.logger {
            logger(args);
        }
    }

    pub fn open_root(&self, mode: OpenMode) -> Result<Handle, VfsError> {
        let target = follow_mounts(self.root.clone());
        try_open(&target, mode)?;
        Ok(Handle::new(target, mode))
    }

    /// §4.3 `open`: splits the path, resolves every intermediate segment in
    /// `Read` mode (closing each parent handle as soon as its child is
    /// opened, per `open_parent_directory`), then opens the final segment
    /// in the requested mode.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<Handle, VfsError> {
        let segments = path::split(path);
        let Some((filename, dirname)) = segments.split_last() else {
            return self.open_root(mode);
        };

        let mut parent = self.open_root(OpenMode::Read)?;
        for segment in dirname {
            let next = parent.open(segment, OpenMode::Read)?;
            if let Err(err) = parent.close() {
                self.log_bug(format_args!("open_parent_directory: close failed: {err}"));
            }
            parent = next;
        }

        let result = parent.open(filename, mode);
        if let Err(err) = parent.close() {
            self.log_bug(format_args!("open_parent_directory: close failed: {err}"));
        }
        result
    }

    /// §4.3 `mount`: opens `path` for writing (pinning the mountpoint),
    /// attaches the driver's volume root, and records the held handle so
    /// the mount stays pinned until `unmount`. Mounting over an existing
    /// mountpoint stacks: the new mount attaches to the current top of the
    /// chain, discovered by the write-open itself following prior mounts.
    pub fn mount(&self, path: &str, driver: Arc<dyn Driver>) -> Result<(), VfsError> {
        let root_desc = driver.get_root();
        let volume_root = Arc::new(Mutex::new(Node::new_volume_root(root_desc, driver.clone())));

        let handle = self.open(path, OpenMode::Write)?;
        let mountpoint = handle.node().clone();
        mountpoint.lock().mount = Some(volume_root.clone());

        self.mounts.lock().push(MountEntry {
            path: path.to_string(),
            mountpoint,
            volume_root,
            write_handle: handle,
            driver,
        });

        Ok(())
    }

    /// §4.3 `unmount`: resolves `path` to its most-recently-mounted top,
    /// refuses while the volume root is busy, then clears the mount link
    /// and releases the pinning write-handle.
    pub fn unmount(&self, path: &str) -> Result<Arc<dyn Driver>, VfsError> {
        let mut mounts = self.mounts.lock();
        let index = mounts
            .iter()
            .rposition(|entry| entry.path == path)
            .ok_or(VfsError::NotMounted)?;

        if mounts[index].volume_root.lock().is_busy() {
            return Err(VfsError::VolumeBusy);
        }

        let entry = mounts.remove(index);
        drop(mounts);

        entry.mountpoint.lock().mount = None;
        entry.write_handle.close()?;

        Ok(entry.driver)
    }

    /// Test/debug helper mirroring the source's tree-shape assertions
    /// (§8): true iff the persistent root has no children and no mount.
    #[cfg(test)]
    fn root_is_empty(&self) -> bool {
        let root = self.root.lock();
        root.children.is_empty() && root.mount.is_none()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::drivers::basic::BasicDriver;
    use crate::drivers::memfs::{MemFs, PAGE_BYTES};
    use crate::drivers::test_support::BumpFrameAllocator;

    fn new_controller() -> Controller {
        Controller::new(Arc::new(BasicDriver))
    }

    fn new_memfs() -> Arc<MemFs<BumpFrameAllocator>> {
        Arc::new(MemFs::new(BumpFrameAllocator::new()))
    }

    #[test]
    fn nested_mount_unmount_returns_to_empty_root() {
        let controller = new_controller();
        assert!(controller.root_is_empty());

        controller.mount("/", new_memfs()).unwrap();
        assert!(!controller.root_is_empty());

        let h = controller.open("/", OpenMode::Write).unwrap();
        h.create("tmp", FileType::Directory).unwrap();
        h.close().unwrap();

        controller.mount("/tmp", new_memfs()).unwrap();
        controller.mount("/tmp", new_memfs()).unwrap();

        controller.unmount("/tmp").unwrap();
        controller.unmount("/tmp").unwrap();
        controller.unmount("/").unwrap();

        assert!(controller.root_is_empty());
    }

    #[test]
    fn nested_open_close_evicts_on_full_close() {
        let controller = new_controller();
        controller.mount("/", new_memfs()).unwrap();

        let root = controller.open("/", OpenMode::Write).unwrap();
        root.create("dir", FileType::Directory).unwrap();
        root.create("dir2", FileType::Directory).unwrap();
        root.close().unwrap();

        let dir = controller.open("/dir", OpenMode::Write).unwrap();
        dir.create("dir", FileType::Directory).unwrap();
        dir.close().unwrap();

        let h1 = controller.open("/dir", OpenMode::Read).unwrap();
        let h2 = controller.open("/dir2", OpenMode::Read).unwrap();
        let h3 = controller.open("/dir/dir", OpenMode::Read).unwrap();

        h1.close().unwrap();
        h2.close().unwrap();
        h3.close().unwrap();

        // Closing every outstanding handle evicts the now-idle cache
        // entries, even though the backing directories still exist.
        let root = controller.open("/", OpenMode::Read).unwrap();
        assert!(root.node().lock().children.is_empty());
        root.close().unwrap();

        let dir = controller.open("/dir", OpenMode::Read).unwrap();
        dir.close().unwrap();
    }

    #[test]
    fn write_guard_on_read_handle() {
        let controller = new_controller();
        controller.mount("/", new_memfs()).unwrap();

        let root = controller.open("/", OpenMode::Read).unwrap();
        assert_eq!(root.create("dir", FileType::Directory), Err(VfsError::NotOpened));
        root.close().unwrap();
    }

    #[test]
    fn absent_entry_is_no_such_file() {
        let controller = new_controller();
        controller.mount("/", new_memfs()).unwrap();

        assert_eq!(controller.open("/dir", OpenMode::Read).unwrap_err(), VfsError::NoSuchFile);
    }

    #[test]
    fn tmpfs_read_write_roundtrip_across_pages() {
        let controller = new_controller();
        controller.mount("/", new_memfs()).unwrap();

        let root = controller.open("/", OpenMode::Write).unwrap();
        root.create("file", FileType::Regular).unwrap();
        root.close().unwrap();

        let file = controller.open("/file", OpenMode::Write).unwrap();

        let data = b"test data";
        file.write(0, data).unwrap();
        let mut buf = [0xFFu8; 9];
        file.read(0, &mut buf).unwrap();
        assert_eq!(&buf, data);

        let mut big = [0u8; PAGE_BYTES * 3];
        for (i, b) in big.iter_mut().enumerate() {
            *b = i as u8;
        }
        let write_head = PAGE_BYTES + 1;
        file.write(write_head, &big).unwrap();

        let mut window = [0u8; 256];
        file.read(write_head, &mut window).unwrap();
        assert_eq!(&window[..], &big[..256]);

        file.close().unwrap();
    }

    #[test]
    fn duplicated_mounts_at_distinct_paths_are_independent() {
        let controller = new_controller();
        controller.mount("/", new_memfs()).unwrap();

        let root = controller.open("/", OpenMode::Write).unwrap();
        root.create("a", FileType::Directory).unwrap();
        root.create("b", FileType::Directory).unwrap();
        root.close().unwrap();

        let b = controller.open("/b", OpenMode::Write).unwrap();
        b.create("bb", FileType::Directory).unwrap();
        b.close().unwrap();

        controller.mount("/a", new_memfs()).unwrap();
        controller.mount("/b/bb", new_memfs()).unwrap();

        // Stacking a further mount on `/a` must not disturb `/b/bb`'s chain.
        controller.mount("/a", new_memfs()).unwrap();

        let bb = controller.open("/b/bb", OpenMode::Read).unwrap();
        bb.close().unwrap();

        controller.unmount("/a").unwrap();
        controller.unmount("/a").unwrap();
        controller.unmount("/b/bb").unwrap();
        controller.unmount("/").unwrap();
    }

    #[test]
    fn path_resolution_is_associative_in_segments() {
        let controller = new_controller();
        controller.mount("/", new_memfs()).unwrap();

        let root = controller.open("/", OpenMode::Write).unwrap();
        root.create("a", FileType::Directory).unwrap();
        root.close().unwrap();

        let a = controller.open("/a", OpenMode::Write).unwrap();
        a.create("b", FileType::Directory).unwrap();
        a.close().unwrap();

        let direct = controller.open("/a/b", OpenMode::Read).unwrap();
        let direct_token = direct.node().lock().token;
        direct.close().unwrap();

        let a = controller.open("/a", OpenMode::Read).unwrap();
        let b = a.open("b", OpenMode::Read).unwrap();
        let stepwise_token = b.node().lock().token;
        b.close().unwrap();
        a.close().unwrap();

        assert_eq!(direct_token, stepwise_token);
    }
}
