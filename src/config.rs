//! Export tree configuration

use crate::registry::AccessMode;

/// Maximum number of segments tracked by the frame store
pub const MAX_SEGMENTS: usize = 20;

/// Default export table capacity
pub const DEFAULT_MAX_EXPORTS: usize = 32;

/// Default capacity of a statistics snapshot
pub const DEFAULT_STATS_BUFFER_SIZE: usize = 1024;

/// Longest stream directory name (`<bus>-<device>-<interface>`)
pub const MAX_STREAM_DIR_NAME: usize = 32;

/// Export tree configuration options
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Name of the root directory
    pub root_name: String,

    /// Name of the frame-store subdirectory
    pub store_dir_name: String,

    /// Name of the directory holding one subdirectory per stream
    pub streams_dir_name: String,

    /// Capacity of the raw frame payload buffer in bytes
    pub frame_data_capacity: usize,

    /// Capacity of the per-frame size table in bytes
    pub frame_sizes_capacity: usize,

    /// Maximum number of entries in the export registry
    pub max_exports: usize,

    /// Capacity of each statistics snapshot in bytes
    pub stats_buffer_size: usize,

    /// Access mode of the frame-store entries
    pub store_access: AccessMode,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            root_name: "capture-debug".to_string(),
            store_dir_name: "store".to_string(),
            streams_dir_name: "streams".to_string(),
            frame_data_capacity: 32 * 1024 * 1024, // 32MB
            frame_sizes_capacity: 16 * 1024,       // 4096 frames
            max_exports: DEFAULT_MAX_EXPORTS,
            stats_buffer_size: DEFAULT_STATS_BUFFER_SIZE,
            store_access: AccessMode::ReadWrite,
        }
    }
}

impl ExportConfig {
    /// Create a config with custom payload capacities
    pub fn with_capacities(frame_data: usize, frame_sizes: usize) -> Self {
        Self {
            frame_data_capacity: frame_data,
            frame_sizes_capacity: frame_sizes,
            ..Default::default()
        }
    }

    /// Set the root directory name
    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    /// Set the frame payload capacity
    pub fn frame_data_capacity(mut self, bytes: usize) -> Self {
        self.frame_data_capacity = bytes;
        self
    }

    /// Set the frame size table capacity
    pub fn frame_sizes_capacity(mut self, bytes: usize) -> Self {
        self.frame_sizes_capacity = bytes;
        self
    }

    /// Set the export table capacity
    pub fn max_exports(mut self, max: usize) -> Self {
        self.max_exports = max;
        self
    }

    /// Set the statistics snapshot capacity
    pub fn stats_buffer_size(mut self, bytes: usize) -> Self {
        self.stats_buffer_size = bytes;
        self
    }

    /// Register every frame-store entry read-only
    pub fn read_only_exports(mut self) -> Self {
        self.store_access = AccessMode::ReadOnly;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();

        assert_eq!(config.root_name, "capture-debug");
        assert_eq!(config.store_dir_name, "store");
        assert_eq!(config.streams_dir_name, "streams");
        assert_eq!(config.max_exports, 32);
        assert_eq!(config.stats_buffer_size, 1024);
        assert_eq!(config.store_access, AccessMode::ReadWrite);
    }

    #[test]
    fn test_with_capacities() {
        let config = ExportConfig::with_capacities(4096, 1024);

        assert_eq!(config.frame_data_capacity, 4096);
        assert_eq!(config.frame_sizes_capacity, 1024);
        assert_eq!(config.max_exports, DEFAULT_MAX_EXPORTS);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ExportConfig::default()
            .with_root_name("uvcvideo")
            .frame_data_capacity(8192)
            .frame_sizes_capacity(512)
            .max_exports(12)
            .stats_buffer_size(256)
            .read_only_exports();

        assert_eq!(config.root_name, "uvcvideo");
        assert_eq!(config.frame_data_capacity, 8192);
        assert_eq!(config.frame_sizes_capacity, 512);
        assert_eq!(config.max_exports, 12);
        assert_eq!(config.stats_buffer_size, 256);
        assert_eq!(config.store_access, AccessMode::ReadOnly);
    }
}
