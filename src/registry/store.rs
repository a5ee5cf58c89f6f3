//! Export registry implementation
//!
//! A bounded, append-only table of export entries. The table is filled
//! during initialization and only ever emptied as a whole.

use std::sync::Arc;

use crate::config::DEFAULT_MAX_EXPORTS;
use crate::error::{DebugfsError, Result};
use crate::store::Region;

use super::entry::{AccessMode, ExportEntry};

/// Bounded table of export entries
///
/// Not synchronized: registration happens on a single thread during
/// initialization. Registered entries are shared via `Arc` and are safe to
/// read from any thread afterwards.
#[derive(Debug)]
pub struct ExportRegistry {
    /// Registered entries, in registration order
    entries: Vec<Arc<ExportEntry>>,

    /// Maximum number of entries
    capacity: usize,
}

impl ExportRegistry {
    /// Create a registry with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EXPORTS)
    }

    /// Create a registry holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            // Grows on demand; the capacity may be arbitrarily large
            entries: Vec::with_capacity(capacity.min(DEFAULT_MAX_EXPORTS)),
            capacity,
        }
    }

    /// Append an entry for `region` under directory `dir`
    ///
    /// Returns [`DebugfsError::RegistryFull`] when the table is full; the
    /// existing entries are left untouched.
    pub fn register(
        &mut self,
        dir: &str,
        name: &str,
        region: &Arc<Region>,
        mode: AccessMode,
    ) -> Result<Arc<ExportEntry>> {
        if self.is_full() {
            tracing::warn!(
                entry = name,
                capacity = self.capacity,
                "Export registry full, entry not registered"
            );
            return Err(DebugfsError::RegistryFull {
                capacity: self.capacity,
            });
        }

        let entry = Arc::new(ExportEntry::new(dir, name, region, mode));
        self.entries.push(Arc::clone(&entry));

        tracing::debug!(
            entry = %entry.path(),
            size = entry.size(),
            mode = format_args!("{:o}", mode.permissions()),
            "Export registered"
        );

        Ok(entry)
    }

    /// Look up an entry by full path
    pub fn get(&self, path: &str) -> Option<&Arc<ExportEntry>> {
        self.entries.iter().find(|e| e.path() == path)
    }

    /// All entries in registration order
    pub fn entries(&self) -> &[Arc<ExportEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Drop every entry (whole-tree teardown)
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ExportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
