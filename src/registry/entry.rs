//! Export entry and access mode types
//!
//! An entry names a region of frame-store memory without owning it.

use std::sync::{Arc, Weak};

use bytes::Bytes;

use crate::error::{DebugfsError, Result};
use crate::store::Region;

/// Access mode advertised for an exported entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Readable by anyone, writable by nobody
    ReadOnly,
    /// Readable by anyone, writable by the owner
    ReadWrite,
}

impl AccessMode {
    /// Unix permission bits for this mode
    pub fn permissions(self) -> u32 {
        match self {
            AccessMode::ReadOnly => 0o444,
            AccessMode::ReadWrite => 0o644,
        }
    }

    /// Whether writes are accepted
    pub fn is_writable(self) -> bool {
        self == AccessMode::ReadWrite
    }
}

/// A named, sized reference to a borrowed memory region
///
/// The entry holds a weak reference. Once the owner drops the region,
/// reads return nothing and writes are discarded.
pub struct ExportEntry {
    /// Entry name within its directory
    name: String,

    /// Full path of the entry
    path: String,

    /// Borrowed backing memory
    region: Weak<Region>,

    /// Size fixed at registration
    size: usize,

    /// Access mode fixed at registration
    mode: AccessMode,
}

impl ExportEntry {
    /// Create an entry borrowing `region`
    pub(super) fn new(dir: &str, name: &str, region: &Arc<Region>, mode: AccessMode) -> Self {
        Self {
            name: name.to_string(),
            path: format!("{}/{}", dir, name),
            region: Arc::downgrade(region),
            size: region.len(),
            mode,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Authoritative size advertised for reads
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether the backing region is still alive
    pub fn is_live(&self) -> bool {
        self.region.strong_count() > 0
    }

    /// Read up to `len` bytes at `offset`, clamped to the declared size
    ///
    /// The capture path may be writing the region concurrently; the bytes
    /// returned can mix old and new contents.
    pub fn read(&self, offset: usize, len: usize) -> Bytes {
        let Some(region) = self.region.upgrade() else {
            return Bytes::new();
        };
        let len = len.min(self.size.saturating_sub(offset));
        let data = region.read_at(offset, len);

        tracing::trace!(entry = %self.path, offset, len = data.len(), "Entry read");
        data
    }

    /// Copy `data` into the region at `offset`
    ///
    /// At most `size - offset` bytes are written; bytes past the written
    /// range keep their previous value. Returns the number of bytes written.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<usize> {
        if !self.mode.is_writable() {
            return Err(DebugfsError::ReadOnly {
                path: self.path.clone(),
            });
        }
        let Some(region) = self.region.upgrade() else {
            return Ok(0);
        };
        let len = data.len().min(self.size.saturating_sub(offset));
        let written = region.write_at(offset, &data[..len]);

        tracing::trace!(entry = %self.path, offset, written, "Entry write");
        Ok(written)
    }
}

impl std::fmt::Debug for ExportEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportEntry")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("mode", &self.mode)
            .field("live", &self.is_live())
            .finish()
    }
}
