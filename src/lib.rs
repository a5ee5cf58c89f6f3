//! Runtime introspection for a video capture pipeline
//!
//! This crate keeps a bounded frame store of segmented capture metadata and
//! raw frame payloads, exposes its fields as entries of a diagnostic
//! filesystem, and produces per-stream statistics snapshots on demand.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use capture_debugfs::{ExportConfig, ExportTree, MemoryFs, StreamCounters, StreamIdentity};
//!
//! let fs = Arc::new(MemoryFs::new());
//! let mut tree = ExportTree::new(Arc::clone(&fs), ExportConfig::with_capacities(4096, 1024));
//!
//! // The capture path flips the mode switch; readers see it immediately
//! tree.store().set_mode_switch(1);
//! assert_eq!(&fs.read_file("/capture-debug/store/modeSwitch").unwrap()[..], &[1]);
//!
//! let counters = Arc::new(StreamCounters::new());
//! let stream = tree
//!     .attach_stream(StreamIdentity::new(1, 2, 0), counters.clone())
//!     .unwrap();
//! counters.record_frame(4096);
//! let stats = fs.read_file("/capture-debug/streams/1-2-0/stats").unwrap();
//! assert!(stats.starts_with(b"frames:  1\n"));
//!
//! tree.detach_stream(stream);
//! tree.shutdown().unwrap();
//! ```
//!
//! # Concurrency
//!
//! Exported frame-store regions are shared with the capture path without
//! any locking. Access is memory safe, but a reader can observe a
//! multi-byte value mid-update. Statistics sessions each own an immutable
//! snapshot and are never shared.

pub mod config;
pub mod error;
pub mod registry;
pub mod stats;
pub mod store;
pub mod tree;

pub use config::ExportConfig;
pub use error::{DebugfsError, Result};
pub use registry::{AccessMode, ExportEntry, ExportRegistry};
pub use stats::{SessionId, StatsEndpoint, StatsProvider, StreamCounters, StreamStats};
pub use store::{FrameStore, Region, SegmentFormat, SegmentInfo, StoreField};
pub use tree::{DebugFs, ExportSource, ExportTree, MemoryFs, NodeId, StreamExportHandle, StreamIdentity};
