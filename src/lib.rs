//! chatvault - crash-safe write-behind persistence for chat session caches
//!
//! chatvault keeps a chat client's session cache (rooms, timelines,
//! summaries, receipts, user profiles) on disk so a restarted client resumes
//! without a full initial sync.
//!
//! # Quick Start
//!
//! ```no_run
//! use chatvault::{Credentials, Direction, Event, FileStore, SessionStore, StoreConfig};
//!
//! # fn main() -> chatvault::Result<()> {
//! let store = FileStore::new(
//!     "/var/lib/client/stores",
//!     Credentials::new("@me:example.org", "access-token"),
//!     StoreConfig::default(),
//! )?;
//! store.open();
//!
//! let event = Event::new("$1", "!room:example.org", "@alice:example.org", "m.room.message", 0);
//! store.store_live_event(event);
//! store.commit();
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `chatvault-core`: records and the error type
//! - `chatvault-durability`: crash-atomic files, codecs, retention, layout
//! - `chatvault-engine`: the cache, the file store and its worker
//!
//! Mutators only touch memory; [`FileStore::commit`] hands snapshots of the
//! changed records to a single worker thread that writes them.

pub use chatvault_core::{
    now_millis, storage_shard, Credentials, Direction, Error, Event, EventId, Membership,
    Presence, ReceiptMap, ReceiptRecord, Result, RoomAccountData, RoomId, RoomMember, RoomState,
    RoomSummary, SentState, StoreMetadata, ThirdPartyIdentifier, UserId, UserProfile,
    FORMAT_VERSION, USER_SHARD_COUNT,
};
pub use chatvault_durability::{
    CrashPoint, RetentionPolicy, RoomCategory, StoreConfig, StorePaths,
};
pub use chatvault_engine::{
    FileStore, Lifecycle, MemoryCache, RecordingListener, SessionStore, StoreListener,
    StoreNotification, VaultConfig, CONFIG_FILE_NAME,
};
