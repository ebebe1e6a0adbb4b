//! Store configuration
//!
//! Controls the codec, record size limits, write-behind queue depth and
//! message retention.

use serde::{Deserialize, Serialize};

use crate::blob::DEFAULT_MAX_RECORD_BYTES;
use crate::codec::{get_codec, DEFAULT_COMPRESSION_LEVEL};
use crate::retention::{RetentionPolicy, RetentionPolicyError};

/// Default bound of the write-behind queue
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Codec identifier (default: "zstd")
    #[serde(default = "default_codec_id")]
    pub codec_id: String,
    /// zstd compression level
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Largest decoded record the store will serialize or load
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    /// Jobs the write-behind queue holds before rejecting
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Message history retention
    #[serde(default)]
    pub retention: RetentionPolicy,
}

fn default_codec_id() -> String {
    "zstd".to_string()
}

fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}

fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            codec_id: default_codec_id(),
            compression_level: default_compression_level(),
            max_record_bytes: default_max_record_bytes(),
            queue_depth: default_queue_depth(),
            retention: RetentionPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Create config for testing
    ///
    /// Uses the identity codec so files can be inspected, and a small queue.
    pub fn for_testing() -> Self {
        StoreConfig {
            codec_id: "identity".to_string(),
            queue_depth: 64,
            ..Default::default()
        }
    }

    /// Set codec identifier
    pub fn with_codec(mut self, codec_id: impl Into<String>) -> Self {
        self.codec_id = codec_id.into();
        self
    }

    /// Set compression level
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the record size limit
    pub fn with_max_record_bytes(mut self, bytes: usize) -> Self {
        self.max_record_bytes = bytes;
        self
    }

    /// Set the write-behind queue bound
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Set the retention policy
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        get_codec(&self.codec_id, self.compression_level)
            .map_err(|e| ConfigError::InvalidCodec(e.to_string()))?;
        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigError::InvalidCompressionLevel(self.compression_level));
        }
        if self.max_record_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_record_bytes"));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroLimit("queue_depth"));
        }
        self.retention.validate()?;
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid codec identifier
    #[error("Invalid codec: {0}")]
    InvalidCodec(String),

    /// Compression level outside zstd's range
    #[error("Invalid compression level: {0}")]
    InvalidCompressionLevel(i32),

    /// A size limit was zero
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    /// Invalid retention policy
    #[error("Invalid retention policy: {0}")]
    InvalidRetention(#[from] RetentionPolicyError),
}
