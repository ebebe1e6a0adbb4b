//! Durability layer for chatvault
//!
//! This crate handles everything that touches disk:
//!
//! - Crash-atomic record files (two-phase rename, temp-file rescue)
//! - Storage codec abstraction (zstd compression, identity)
//! - Store directory layout and disk accounting
//! - Message history retention
//! - Store configuration
//! - Crash injection for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob; // Crash-atomic record read/write
pub mod codec; // Compression seam
pub mod config; // StoreConfig and validation
pub mod paths; // Directory layout
pub mod retention; // Message history trimming
pub mod testing; // Crash points

// === Re-exports ===
pub use blob::{list_entries, temp_sibling, BlobError, BlobStore, DEFAULT_MAX_RECORD_BYTES, TEMP_SUFFIX};
pub use codec::{get_codec, CodecError, IdentityCodec, StorageCodec, ZstdCodec};
pub use config::{ConfigError, StoreConfig, DEFAULT_QUEUE_DEPTH};
pub use paths::{decode_entry_name, directory_size, encode_entry_name, RoomCategory, StorePaths};
pub use retention::{
    RetainedHistory, RetentionPolicy, RetentionPolicyError, AGGRESSIVE_TAIL, MAX_STORED_MESSAGES,
};
pub use testing::CrashPoint;
