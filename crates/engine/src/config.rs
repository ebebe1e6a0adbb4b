//! Store configuration via `chatvault.toml`
//!
//! The file lives in the base directory shared by all session stores. It is
//! created with defaults the first time a store is opened from that
//! directory; edit it and reopen to change settings.

use chatvault_core::{Error, Result};
use chatvault_durability::{
    RetentionPolicy, StoreConfig, DEFAULT_MAX_RECORD_BYTES, DEFAULT_QUEUE_DEPTH,
};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Config file name placed in the base directory.
pub const CONFIG_FILE_NAME: &str = "chatvault.toml";

/// Configuration loaded from `chatvault.toml`.
///
/// # Example
///
/// ```toml
/// codec = "zstd"
/// compression_level = 3
/// queue_depth = 1024
/// max_stored_messages = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Record codec: `"zstd"` or `"identity"`.
    #[serde(default = "default_codec")]
    pub codec: String,
    /// zstd compression level, 1 to 22.
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Largest decoded record, in bytes.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    /// Pending writes before a commit is deferred.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Events persisted per room.
    #[serde(default = "default_max_stored_messages")]
    pub max_stored_messages: usize,
    /// Tail length used when no token is found near the retention boundary.
    #[serde(default = "default_aggressive_tail")]
    pub aggressive_tail: usize,
}

fn default_codec() -> String {
    "zstd".to_string()
}

fn default_compression_level() -> i32 {
    StoreConfig::default().compression_level
}

fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

fn default_max_stored_messages() -> usize {
    RetentionPolicy::default().max_stored
}

fn default_aggressive_tail() -> usize {
    RetentionPolicy::default().aggressive_tail
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            compression_level: default_compression_level(),
            max_record_bytes: default_max_record_bytes(),
            queue_depth: default_queue_depth(),
            max_stored_messages: default_max_stored_messages(),
            aggressive_tail: default_aggressive_tail(),
        }
    }
}

impl VaultConfig {
    /// Convert to a validated [`StoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn to_store_config(&self) -> Result<StoreConfig> {
        let config = StoreConfig::default()
            .with_codec(self.codec.clone())
            .with_compression_level(self.compression_level)
            .with_max_record_bytes(self.max_record_bytes)
            .with_queue_depth(self.queue_depth)
            .with_retention(RetentionPolicy {
                max_stored: self.max_stored_messages,
                aggressive_tail: self.aggressive_tail,
            });
        config.validate().map_err(|e| {
            Error::InvalidOperation(format!("Invalid value in {}: {}", CONFIG_FILE_NAME, e))
        })?;
        Ok(config)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# chatvault store configuration
#
# Record codec: "zstd" (default) or "identity" (uncompressed, for debugging)
codec = "zstd"

# zstd compression level, 1-22 (default: 3)
compression_level = 3

# Largest decoded record in bytes (default: 64 MiB).
# Larger records are abandoned and reported as resource exhaustion.
max_record_bytes = 67108864

# Pending writes before a commit is deferred to the next one (default: 1024)
queue_depth = 1024

# Events persisted per room (default: 50)
max_stored_messages = 50

# When no pagination token is found near the retention boundary, keep only
# this many events from the end (default: 10)
aggressive_tail = 10
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: VaultConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidOperation(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.to_store_config()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::IoError(io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to write default config file '{}': {}",
                        path.display(),
                        e
                    ),
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::IoError(io::Error::new(
                e.kind(),
                format!("Failed to write config file '{}': {}", path.display(), e),
            ))
        })
    }
}
