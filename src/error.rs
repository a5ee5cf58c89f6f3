//! Error types
//!
//! Error type shared by the frame store, export registry, statistics
//! sessions and the export tree.

use crate::stats::SessionId;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DebugfsError>;

/// Error type for diagnostic export operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugfsError {
    /// A buffer or session allocation could not be satisfied
    AllocationFailure {
        /// What was being allocated
        what: &'static str,
        /// Requested size in bytes
        size: usize,
    },
    /// The export table already holds its maximum number of entries
    RegistryFull {
        /// Table capacity
        capacity: usize,
    },
    /// The diagnostic root directory does not exist
    RootAbsent,
    /// Read or close on a session that was never opened or is already closed
    InvalidSession(SessionId),
    /// Payload buffers are not allocated (release without init, or double release)
    StoreNotAllocated,
    /// Payload buffers were already allocated
    StoreAlreadyAllocated,
    /// All segment slots are in use
    SegmentsFull {
        /// Maximum number of segments
        capacity: usize,
    },
    /// A segment does not fit into a payload buffer
    PayloadFull {
        /// Which buffer overflowed
        what: &'static str,
        /// Bytes the buffer would need to hold
        needed: usize,
        /// Buffer capacity in bytes
        capacity: usize,
    },
    /// Segment metadata breaks the offset invariants
    LayoutViolation {
        /// Offending segment index
        segment: usize,
        /// What is wrong with it
        reason: &'static str,
    },
    /// The statistics endpoint has been removed and accepts no new sessions
    EndpointRetired,
    /// The host filesystem refused to create a node
    HostRejected {
        /// Path of the node that could not be created
        path: String,
    },
    /// No node exists at the given path
    NotFound {
        /// Requested path
        path: String,
    },
    /// Write attempted on a read-only node
    ReadOnly {
        /// Path of the node
        path: String,
    },
}

impl std::fmt::Display for DebugfsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebugfsError::AllocationFailure { what, size } => {
                write!(f, "Failed to allocate {} ({} bytes)", what, size)
            }
            DebugfsError::RegistryFull { capacity } => {
                write!(f, "Export registry full ({} entries)", capacity)
            }
            DebugfsError::RootAbsent => write!(f, "Diagnostic root directory is absent"),
            DebugfsError::InvalidSession(id) => write!(f, "Invalid stats session: {}", id),
            DebugfsError::StoreNotAllocated => write!(f, "Frame store buffers not allocated"),
            DebugfsError::StoreAlreadyAllocated => {
                write!(f, "Frame store buffers already allocated")
            }
            DebugfsError::SegmentsFull { capacity } => {
                write!(f, "All {} segment slots in use", capacity)
            }
            DebugfsError::PayloadFull {
                what,
                needed,
                capacity,
            } => write!(
                f,
                "Segment does not fit in {}: need {} bytes, capacity {}",
                what, needed, capacity
            ),
            DebugfsError::LayoutViolation { segment, reason } => {
                write!(f, "Segment {} layout violation: {}", segment, reason)
            }
            DebugfsError::EndpointRetired => write!(f, "Stats endpoint has been removed"),
            DebugfsError::HostRejected { path } => {
                write!(f, "Host filesystem rejected node: {}", path)
            }
            DebugfsError::NotFound { path } => write!(f, "No such node: {}", path),
            DebugfsError::ReadOnly { path } => write!(f, "Node is read-only: {}", path),
        }
    }
}

impl std::error::Error for DebugfsError {}
