//! Host filesystem seam
//!
//! The export tree only describes what it registers. Creating nodes,
//! enforcing permissions and dispatching reads/writes is the host
//! filesystem's job, expressed by the [`DebugFs`] trait.

use std::sync::Arc;

use crate::error::Result;
use crate::registry::{AccessMode, ExportEntry};
use crate::stats::StatsEndpoint;

/// Handle to a node created by the host, identified by its full path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Handle for the node at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Handle for `name` beneath `parent` (or beneath `/`)
    pub fn child(parent: Option<&NodeId>, name: &str) -> Self {
        match parent {
            Some(parent) => Self(format!("{}/{}", parent.0, name)),
            None => Self(format!("/{}", name)),
        }
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What backs a file node
#[derive(Debug, Clone)]
pub enum ExportSource {
    /// Direct view of a frame-store region
    Entry(Arc<ExportEntry>),
    /// One snapshot session per open
    Stats(Arc<StatsEndpoint>),
}

impl ExportSource {
    /// Size the host advertises for the node
    ///
    /// Stats files advertise no size; their length is only known per session.
    pub fn size(&self) -> usize {
        match self {
            ExportSource::Entry(entry) => entry.size(),
            ExportSource::Stats(_) => 0,
        }
    }
}

/// Host filesystem the export tree registers into
pub trait DebugFs: Send + Sync {
    /// Create a directory named `name` under `parent` (the host root when `None`)
    fn create_dir(&self, parent: Option<&NodeId>, name: &str) -> Result<NodeId>;

    /// Create a file named `name` under `parent`, backed by `source`
    fn create_file(
        &self,
        parent: &NodeId,
        name: &str,
        mode: AccessMode,
        source: ExportSource,
    ) -> Result<NodeId>;

    /// Remove `node` and everything beneath it
    ///
    /// Must refuse new opens of the removed nodes and must not return
    /// before every stats session opened beneath `node` is closed.
    fn remove_recursive(&self, node: &NodeId);
}

impl<T: DebugFs + ?Sized> DebugFs for Arc<T> {
    fn create_dir(&self, parent: Option<&NodeId>, name: &str) -> Result<NodeId> {
        (**self).create_dir(parent, name)
    }

    fn create_file(
        &self,
        parent: &NodeId,
        name: &str,
        mode: AccessMode,
        source: ExportSource,
    ) -> Result<NodeId> {
        (**self).create_file(parent, name, mode, source)
    }

    fn remove_recursive(&self, node: &NodeId) {
        (**self).remove_recursive(node)
    }
}
