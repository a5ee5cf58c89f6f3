//! Per-stream statistics
//!
//! Live counters are kept by the capture path in [`StreamCounters`]; each
//! open of a stream's `stats` entry captures a bounded text snapshot via
//! [`StatsEndpoint`].

pub mod metrics;
pub mod session;

pub use metrics::{StatsProvider, StreamCounters, StreamStats};
pub use session::{SessionId, StatsEndpoint};
