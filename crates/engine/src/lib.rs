//! Session store engine for chatvault
//!
//! This crate ties the lower layers into a usable store:
//! - MemoryCache: in-memory session cache behind the `SessionStore` API
//! - FileStore: write-behind persistence wrapping a `MemoryCache`
//! - WriteBehindScheduler: the single worker executing all disk I/O
//! - Dirty tracking, receipt loading, user merge and metadata management
//! - Store listeners for lifecycle notifications
//!
//! The store is the only component that decides when records reach disk.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod dirty;
pub mod listener;
pub mod metadata;
pub mod receipts;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod users;

pub use cache::{MemoryCache, RoomHistory, SessionInfo};
pub use config::{VaultConfig, CONFIG_FILE_NAME};
pub use dirty::{DirtyKind, DirtyTracker};
pub use listener::{ListenerRegistry, RecordingListener, StoreListener, StoreNotification};
pub use metadata::MetadataManager;
pub use receipts::ReceiptLoader;
pub use scheduler::{BackpressureError, SchedulerStats, WriteBehindScheduler};
pub use session::SessionStore;
pub use store::{FileStore, Lifecycle};
