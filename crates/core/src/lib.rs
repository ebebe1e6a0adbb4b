//! Core types for chatvault
//!
//! This crate defines the records the persistence layer stores:
//! - Identifiers: RoomId, UserId, EventId, Credentials
//! - Event: timeline events with embedded pagination tokens
//! - Room records: RoomState, RoomSummary, RoomAccountData
//! - ReceiptRecord: read receipts
//! - UserProfile: profiles with placeholder flag and shard assignment
//! - StoreMetadata: versioned session identity
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod metadata;
pub mod receipt;
pub mod room;
pub mod types;
pub mod user;

pub use error::{Error, Result};
pub use event::{Direction, Event, SentState};
pub use metadata::{StoreMetadata, ThirdPartyIdentifier, FORMAT_VERSION};
pub use receipt::{ReceiptMap, ReceiptRecord};
pub use room::{Membership, RoomAccountData, RoomMember, RoomState, RoomSummary};
pub use types::{now_millis, Credentials, EventId, RoomId, UserId};
pub use user::{storage_shard, Presence, UserProfile, USER_SHARD_COUNT};
