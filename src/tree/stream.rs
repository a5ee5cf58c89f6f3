//! Stream identity and per-stream export handle

use std::fmt::Write;
use std::sync::Arc;

use crate::config::MAX_STREAM_DIR_NAME;
use crate::stats::StatsEndpoint;

use super::host::NodeId;

/// Decimal digits of `u32::MAX`
const U32_DIGITS: usize = 10;

// Three u32 fields and two separators always fit the directory name bound
const _: () = assert!(3 * U32_DIGITS + 2 <= MAX_STREAM_DIR_NAME);

/// Bus/device/interface triple identifying a capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamIdentity {
    /// USB bus number
    pub bus: u32,
    /// Device number on the bus
    pub device: u32,
    /// Streaming interface number
    pub interface: u32,
}

impl StreamIdentity {
    pub fn new(bus: u32, device: u32, interface: u32) -> Self {
        Self {
            bus,
            device,
            interface,
        }
    }

    /// Directory name, `<bus>-<device>-<interface>`
    ///
    /// Never longer than [`MAX_STREAM_DIR_NAME`].
    pub fn dir_name(&self) -> String {
        let mut name = String::with_capacity(MAX_STREAM_DIR_NAME);
        // Writing to a String cannot fail
        let _ = write!(name, "{}", self);
        name
    }
}

impl std::fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.bus, self.device, self.interface)
    }
}

/// A stream's presence in the export tree
///
/// Created by attach and consumed by detach, one per live stream. It owns
/// no frame-store memory.
#[derive(Debug)]
pub struct StreamExportHandle {
    pub(super) identity: StreamIdentity,
    pub(super) dir: NodeId,
    pub(super) stats: Arc<StatsEndpoint>,
}

impl StreamExportHandle {
    pub fn identity(&self) -> StreamIdentity {
        self.identity
    }

    /// The stream's subdirectory
    pub fn dir(&self) -> &NodeId {
        &self.dir
    }

    /// Path of the stream's stats entry
    pub fn stats_path(&self) -> &str {
        self.stats.path()
    }

    /// Stats sessions currently open on this stream
    pub fn open_sessions(&self) -> usize {
        self.stats.open_sessions()
    }
}
