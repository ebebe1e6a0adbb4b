//! Error types for chatvault
//!
//! This module defines the error type shared by the persistence crates.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! None of these errors cross the store boundary: the engine converts them
//! into success flags and listener notifications.

use std::io;
use thiserror::Error;

/// Result type alias for chatvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the persistence layer
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A record or buffer exceeded the memory the store is allowed to use
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// On-disk format version differs from the one this build writes
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build understands
        expected: u32,
        /// Version found on disk
        actual: u32,
    },

    /// Stored session identity does not match the credentials in use
    #[error("Identity mismatch for user {user_id}")]
    IdentityMismatch {
        /// User id from the credentials
        user_id: String,
    },

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// True for failures that should raise the exhaustion notification.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Error::ResourceExhausted(_))
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(e: std::collections::TryReserveError) -> Self {
        Error::ResourceExhausted(e.to_string())
    }
}
