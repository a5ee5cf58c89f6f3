//! In-memory host filesystem
//!
//! A complete [`DebugFs`] host that keeps its nodes in a path-ordered map.
//! It serves reads and writes straight from the registered sources and
//! implements the recursive-remove fence: removed nodes disappear before
//! any stats session beneath them is drained.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{DebugfsError, Result};
use crate::registry::{AccessMode, ExportEntry};
use crate::stats::{SessionId, StatsEndpoint};

use super::host::{DebugFs, ExportSource, NodeId};

/// Permission bits reported for directories
const DIR_PERMISSIONS: u32 = 0o755;

/// Kind of a host node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Dir,
    File,
}

/// Metadata reported for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: NodeKind,
    /// Unix permission bits
    pub permissions: u32,
    /// Advertised size in bytes
    pub size: usize,
}

#[derive(Debug)]
enum Node {
    Dir,
    File {
        mode: AccessMode,
        source: ExportSource,
    },
}

/// Host filesystem held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: RwLock<BTreeMap<String, Node>>,
    /// Names whose creation is refused
    rejected: RwLock<HashSet<String>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to create any node called `name`
    pub fn reject(&self, name: impl Into<String>) {
        self.rejected.write().insert(name.into());
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.read().contains_key(path)
    }

    /// Names of the direct children of `dir`, sorted
    pub fn list(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir);
        self.nodes
            .read()
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, _)| {
                let rest = &path[prefix.len()..];
                (!rest.contains('/')).then(|| rest.to_string())
            })
            .collect()
    }

    pub fn metadata(&self, path: &str) -> Result<Metadata> {
        let nodes = self.nodes.read();
        match nodes.get(path) {
            Some(Node::Dir) => Ok(Metadata {
                kind: NodeKind::Dir,
                permissions: DIR_PERMISSIONS,
                size: 0,
            }),
            Some(Node::File { mode, source }) => Ok(Metadata {
                kind: NodeKind::File,
                permissions: mode.permissions(),
                size: source.size(),
            }),
            None => Err(DebugfsError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Open the file at `path`
    ///
    /// Opening a stats file starts a snapshot session that lasts until the
    /// returned handle is closed or dropped.
    pub fn open(&self, path: &str) -> Result<OpenFile> {
        let source = {
            let nodes = self.nodes.read();
            match nodes.get(path) {
                Some(Node::File { source, .. }) => source.clone(),
                _ => {
                    return Err(DebugfsError::NotFound {
                        path: path.to_string(),
                    })
                }
            }
        };

        let handle = match source {
            ExportSource::Entry(entry) => Handle::Entry(entry),
            ExportSource::Stats(endpoint) => {
                let id = endpoint.open()?;
                Handle::Session { endpoint, id }
            }
        };

        Ok(OpenFile {
            path: path.to_string(),
            handle: Some(handle),
        })
    }

    /// Open, read everything, close
    pub fn read_file(&self, path: &str) -> Result<Bytes> {
        let file = self.open(path)?;
        let mut out = Vec::new();
        loop {
            let chunk = file.read(out.len(), 4096)?;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        file.close()?;
        Ok(Bytes::from(out))
    }

    /// Open, write `data` at offset 0, close
    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<usize> {
        let file = self.open(path)?;
        let written = file.write(0, data)?;
        file.close()?;
        Ok(written)
    }

    fn check_name(&self, parent: Option<&NodeId>, name: &str) -> Result<NodeId> {
        let node = NodeId::child(parent, name);
        let rejected = self.rejected.read().contains(name);
        let parent_missing = parent
            .is_some_and(|p| !matches!(self.nodes.read().get(p.path()), Some(Node::Dir)));

        if rejected || parent_missing || name.is_empty() || name.contains('/') {
            return Err(DebugfsError::HostRejected {
                path: node.path().to_string(),
            });
        }
        Ok(node)
    }

    fn insert(&self, node: NodeId, value: Node) -> Result<NodeId> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(node.path()) {
            return Err(DebugfsError::HostRejected {
                path: node.path().to_string(),
            });
        }
        nodes.insert(node.path().to_string(), value);
        Ok(node)
    }
}

impl DebugFs for MemoryFs {
    fn create_dir(&self, parent: Option<&NodeId>, name: &str) -> Result<NodeId> {
        let node = self.check_name(parent, name)?;
        self.insert(node, Node::Dir)
    }

    fn create_file(
        &self,
        parent: &NodeId,
        name: &str,
        mode: AccessMode,
        source: ExportSource,
    ) -> Result<NodeId> {
        let node = self.check_name(Some(parent), name)?;
        self.insert(node, Node::File { mode, source })
    }

    fn remove_recursive(&self, node: &NodeId) {
        let prefix = format!("{}/", node.path());

        // Unlink first so no new open can find the nodes
        let removed: Vec<Node> = {
            let mut nodes = self.nodes.write();
            let paths: Vec<String> = nodes
                .keys()
                .filter(|p| *p == node.path() || p.starts_with(&prefix))
                .cloned()
                .collect();
            paths.iter().filter_map(|p| nodes.remove(p)).collect()
        };

        for removed_node in &removed {
            if let Node::File {
                source: ExportSource::Stats(endpoint),
                ..
            } = removed_node
            {
                endpoint.retire();
            }
        }

        tracing::debug!(node = %node, removed = removed.len(), "Removed subtree");
    }
}

enum Handle {
    Entry(Arc<ExportEntry>),
    Session {
        endpoint: Arc<StatsEndpoint>,
        id: SessionId,
    },
}

/// An open file on a [`MemoryFs`]
///
/// Dropping the handle closes it.
pub struct OpenFile {
    path: String,
    handle: Option<Handle>,
}

impl OpenFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read up to `len` bytes at `offset`
    pub fn read(&self, offset: usize, len: usize) -> Result<Bytes> {
        match &self.handle {
            Some(Handle::Entry(entry)) => Ok(entry.read(offset, len)),
            Some(Handle::Session { endpoint, id }) => endpoint.read(*id, offset, len),
            None => Err(DebugfsError::NotFound {
                path: self.path.clone(),
            }),
        }
    }

    /// Write `data` at `offset`
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<usize> {
        match &self.handle {
            Some(Handle::Entry(entry)) => entry.write(offset, data),
            Some(Handle::Session { .. }) => Err(DebugfsError::ReadOnly {
                path: self.path.clone(),
            }),
            None => Err(DebugfsError::NotFound {
                path: self.path.clone(),
            }),
        }
    }

    /// Close the file, ending its stats session if any
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(Handle::Session { endpoint, id }) => endpoint.close(id),
            _ => Ok(()),
        }
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl std::fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFile").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::time::Duration;

    use super::*;
    use crate::registry::ExportRegistry;
    use crate::stats::StatsProvider;
    use crate::store::Region;

    struct Fixed;

    impl StatsProvider for Fixed {
        fn write_stats(&self, out: &mut dyn fmt::Write) -> fmt::Result {
            out.write_str("frames: 1\n")
        }
    }

    fn stats_fs() -> (MemoryFs, NodeId) {
        let fs = MemoryFs::new();
        let root = fs.create_dir(None, "root").unwrap();
        let dir = fs.create_dir(Some(&root), "1-2-0").unwrap();
        let endpoint = Arc::new(StatsEndpoint::new("/root/1-2-0/stats", Arc::new(Fixed), 1024));
        fs.create_file(&dir, "stats", AccessMode::ReadOnly, ExportSource::Stats(endpoint))
            .unwrap();
        (fs, dir)
    }

    #[test]
    fn test_create_and_list() {
        let fs = MemoryFs::new();
        let root = fs.create_dir(None, "root").unwrap();
        let sub = fs.create_dir(Some(&root), "sub").unwrap();
        fs.create_dir(Some(&sub), "deep").unwrap();

        assert!(fs.exists("/root/sub/deep"));
        assert_eq!(fs.list("/root"), vec!["sub".to_string()]);
        assert_eq!(fs.metadata("/root").unwrap().kind, NodeKind::Dir);
    }

    #[test]
    fn test_create_rejections() {
        let fs = MemoryFs::new();
        fs.reject("blocked");
        let root = fs.create_dir(None, "root").unwrap();

        assert!(fs.create_dir(None, "blocked").is_err());
        assert!(fs.create_dir(None, "root").is_err());
        assert!(fs.create_dir(Some(&NodeId::new("/missing")), "x").is_err());
        assert!(fs.create_dir(Some(&root), "a/b").is_err());
    }

    #[test]
    fn test_entry_file_read_write() {
        let fs = MemoryFs::new();
        let root = fs.create_dir(None, "root").unwrap();
        let region = Arc::new(Region::zeroed(1));
        let mut registry = ExportRegistry::new();
        let entry = registry
            .register(root.path(), "modeSwitch", &region, AccessMode::ReadWrite)
            .unwrap();
        fs.create_file(&root, "modeSwitch", AccessMode::ReadWrite, ExportSource::Entry(entry))
            .unwrap();

        assert_eq!(fs.write_file("/root/modeSwitch", &[3]).unwrap(), 1);
        assert_eq!(&fs.read_file("/root/modeSwitch").unwrap()[..], &[3]);
        let meta = fs.metadata("/root/modeSwitch").unwrap();
        assert_eq!(meta.permissions, 0o644);
        assert_eq!(meta.size, 1);
    }

    #[test]
    fn test_stats_file_is_read_only() {
        let (fs, _) = stats_fs();
        let file = fs.open("/root/1-2-0/stats").unwrap();

        assert!(matches!(file.write(0, b"x"), Err(DebugfsError::ReadOnly { .. })));
        assert_eq!(&file.read(0, 100).unwrap()[..], b"frames: 1\n");
        file.close().unwrap();
    }

    #[test]
    fn test_drop_closes_session() {
        let (fs, _) = stats_fs();
        let endpoint = match fs.nodes.read().get("/root/1-2-0/stats") {
            Some(Node::File {
                source: ExportSource::Stats(ep),
                ..
            }) => Arc::clone(ep),
            _ => panic!("stats node missing"),
        };

        let file = fs.open("/root/1-2-0/stats").unwrap();
        assert_eq!(endpoint.open_sessions(), 1);
        drop(file);
        assert_eq!(endpoint.open_sessions(), 0);
    }

    #[test]
    fn test_remove_recursive_unlinks_subtree() {
        let (fs, dir) = stats_fs();

        fs.remove_recursive(&dir);

        assert!(!fs.exists("/root/1-2-0"));
        assert!(!fs.exists("/root/1-2-0/stats"));
        assert!(fs.exists("/root"));
        assert!(matches!(
            fs.open("/root/1-2-0/stats"),
            Err(DebugfsError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_remove_waits_for_open_session() {
        let (fs, dir) = stats_fs();
        let fs = Arc::new(fs);
        let file = fs.open("/root/1-2-0/stats").unwrap();

        let remover = Arc::clone(&fs);
        let handle = tokio::task::spawn_blocking(move || remover.remove_recursive(&dir));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert!(!fs.exists("/root/1-2-0/stats"));
        assert_eq!(&file.read(0, 100).unwrap()[..], b"frames: 1\n");

        file.close().unwrap();
        handle.await.unwrap();
    }
}
