//! Diagnostic export tree
//!
//! The tree publishes the frame store and per-stream statistics into a
//! host filesystem:
//!
//! ```text
//!   ExportTree::new ──► /capture-debug
//!                         ├── store/segmentCount ... modeSwitch   (FrameStore regions)
//!                         └── streams/
//!   attach_stream  ──►        └── 1-2-0/stats                     (StatsEndpoint)
//!   detach_stream  ──► remove 1-2-0/ (waits for open sessions)
//!   shutdown       ──► remove /capture-debug, then free payload buffers
//! ```
//!
//! Reads and writes never pass through the tree itself; the host
//! dispatches them to the [`ExportSource`] registered on each file.

pub mod exports;
pub mod host;
pub mod memory;
pub mod stream;

pub use exports::{ExportTree, STATS_ENTRY_NAME};
pub use host::{DebugFs, ExportSource, NodeId};
pub use memory::{MemoryFs, Metadata, NodeKind, OpenFile};
pub use stream::{StreamExportHandle, StreamIdentity};
