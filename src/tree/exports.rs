//! Export tree lifecycle
//!
//! Owns the frame store, the export registry and the host directories,
//! and sequences their setup and teardown.

use std::sync::Arc;

use crate::config::ExportConfig;
use crate::error::{DebugfsError, Result};
use crate::registry::{AccessMode, ExportRegistry};
use crate::stats::{StatsEndpoint, StatsProvider};
use crate::store::{FrameStore, StoreField};

use super::host::{DebugFs, ExportSource, NodeId};
use super::stream::{StreamExportHandle, StreamIdentity};

/// Name of the per-stream statistics entry
pub const STATS_ENTRY_NAME: &str = "stats";

/// Diagnostic export tree
///
/// ```text
/// /<root>
/// ├── store/      one entry per frame-store field
/// └── streams/
///     └── <bus>-<device>-<interface>/stats
/// ```
///
/// If the root directory cannot be created the tree stays disabled: nothing
/// is exported and stream attach is a no-op.
pub struct ExportTree<F: DebugFs> {
    /// Host filesystem
    fs: F,

    /// Configuration
    config: ExportConfig,

    /// Frame store backing the `store/` entries
    store: FrameStore,

    /// Entries registered under `store/`
    registry: ExportRegistry,

    /// Root directory, `None` when exports are disabled
    root: Option<NodeId>,

    /// Parent of the per-stream directories
    streams_dir: Option<NodeId>,

    /// Failures recorded during initialization
    init_errors: Vec<DebugfsError>,

    /// Set once `shutdown` has run
    shut_down: bool,
}

impl<F: DebugFs> ExportTree<F> {
    /// Build the tree: create the root, allocate the frame store and
    /// register its fields
    ///
    /// Failures never abort construction. They are logged, recorded in
    /// [`init_errors`](Self::init_errors), and the affected entries are
    /// left out.
    pub fn new(fs: F, config: ExportConfig) -> Self {
        let registry = ExportRegistry::with_capacity(config.max_exports);
        let mut tree = Self {
            fs,
            config,
            store: FrameStore::new(),
            registry,
            root: None,
            streams_dir: None,
            init_errors: Vec::new(),
            shut_down: false,
        };

        tree.init_root();

        if let Err(e) = tree
            .store
            .initialize(tree.config.frame_data_capacity, tree.config.frame_sizes_capacity)
        {
            tracing::warn!(error = %e, "Frame store payload buffers not allocated");
            tree.init_errors.push(e);
        }

        tree.init_store_exports();
        tree
    }

    fn init_root(&mut self) {
        let root = match self.fs.create_dir(None, &self.config.root_name) {
            Ok(root) => root,
            Err(e) => {
                tracing::error!(
                    root = %self.config.root_name,
                    error = %e,
                    "Cannot create diagnostic root, exports disabled"
                );
                self.init_errors.push(DebugfsError::RootAbsent);
                return;
            }
        };

        match self.fs.create_dir(Some(&root), &self.config.streams_dir_name) {
            Ok(dir) => self.streams_dir = Some(dir),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot create streams directory");
                self.init_errors.push(e);
            }
        }

        tracing::info!(root = %root, "Diagnostic root created");
        self.root = Some(root);
    }

    fn init_store_exports(&mut self) {
        let Some(root) = self.root.as_ref() else {
            return;
        };

        let dir = match self.fs.create_dir(Some(root), &self.config.store_dir_name) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot create frame store directory");
                self.init_errors.push(e);
                return;
            }
        };

        let mode = self.config.store_access;
        for field in StoreField::ALL {
            if let Err(e) = self.export_field(&dir, field, mode) {
                tracing::warn!(entry = field.name(), error = %e, "Frame store entry not exported");
                self.init_errors.push(e);
            }
        }

        tracing::info!(
            dir = %dir,
            entries = self.registry.len(),
            "Frame store exported"
        );
    }

    fn export_field(&mut self, dir: &NodeId, field: StoreField, mode: AccessMode) -> Result<()> {
        let region = self
            .store
            .region(field)
            .ok_or(DebugfsError::StoreNotAllocated)?;
        let entry = self.registry.register(dir.path(), field.name(), region, mode)?;
        self.fs
            .create_file(dir, field.name(), mode, ExportSource::Entry(entry))?;
        Ok(())
    }

    /// Give a newly attached stream its directory and stats entry
    ///
    /// Returns `None` when exports are disabled or the host refuses the
    /// nodes; the stream then simply has no diagnostic presence.
    pub fn attach_stream(
        &self,
        identity: StreamIdentity,
        provider: Arc<dyn StatsProvider>,
    ) -> Option<StreamExportHandle> {
        let Some(streams_dir) = self.streams_dir.as_ref() else {
            tracing::debug!(stream = %identity, "Exports disabled, stream not exported");
            return None;
        };

        let dir = match self.fs.create_dir(Some(streams_dir), &identity.dir_name()) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(stream = %identity, error = %e, "Cannot create stream directory");
                return None;
            }
        };

        let stats = Arc::new(StatsEndpoint::new(
            format!("{}/{}", dir, STATS_ENTRY_NAME),
            provider,
            self.config.stats_buffer_size,
        ));
        let source = ExportSource::Stats(Arc::clone(&stats));
        if let Err(e) = self
            .fs
            .create_file(&dir, STATS_ENTRY_NAME, AccessMode::ReadOnly, source)
        {
            tracing::warn!(stream = %identity, error = %e, "Cannot create stats entry");
            self.fs.remove_recursive(&dir);
            return None;
        }

        tracing::info!(stream = %identity, dir = %dir, "Stream exported");
        Some(StreamExportHandle {
            identity,
            dir,
            stats,
        })
    }

    /// Remove a stream's directory and everything beneath it
    ///
    /// Returns once the host has removed the subtree, which includes
    /// waiting for open stats sessions to close.
    pub fn detach_stream(&self, handle: StreamExportHandle) {
        self.fs.remove_recursive(&handle.dir);
        tracing::info!(stream = %handle.identity, "Stream export removed");
    }

    /// Tear the whole tree down, then release the frame store
    ///
    /// Directory removal always completes before the payload buffers are
    /// freed. A second call is rejected with
    /// [`DebugfsError::StoreNotAllocated`].
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            tracing::error!("Export tree shut down twice");
            return Err(DebugfsError::StoreNotAllocated);
        }
        self.shut_down = true;

        self.streams_dir = None;
        if let Some(root) = self.root.take() {
            self.fs.remove_recursive(&root);
        }
        self.registry.clear();

        if self.store.is_allocated() {
            self.store.release()?;
        }

        tracing::info!("Export tree shut down");
        Ok(())
    }

    /// Whether the root exists and entries are being exported
    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    /// The frame store, for the capture path
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn registry(&self) -> &ExportRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Failures recorded while building the tree
    pub fn init_errors(&self) -> &[DebugfsError] {
        &self.init_errors
    }
}

impl<F: DebugFs> Drop for ExportTree<F> {
    fn drop(&mut self) {
        if !self.shut_down {
            let _ = self.shutdown();
        }
    }
}

impl<F: DebugFs> std::fmt::Debug for ExportTree<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportTree")
            .field("root", &self.root)
            .field("entries", &self.registry.len())
            .field("store_allocated", &self.store.is_allocated())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
