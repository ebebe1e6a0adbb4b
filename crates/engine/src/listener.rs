//! Store notifications
//!
//! Lifecycle and load events are delivered to registered listeners, keyed by
//! the session's user id. Notifications raised by the worker are delivered on
//! the worker thread; listeners must not block on store I/O.

use chatvault_core::{RoomId, UserId};
use parking_lot::RwLock;
use std::sync::Arc;

/// Receives store notifications. All methods default to no-ops.
pub trait StoreListener: Send + Sync {
    /// The store finished opening and its data is in the cache.
    fn on_store_ready(&self, _user_id: &UserId) {}

    /// Opening failed; the store was reset to an empty, usable state.
    fn on_store_corrupted(&self, _user_id: &UserId, _description: &str) {}

    /// A record could not be (de)serialized within the memory limit.
    fn on_resource_exhausted(&self, _description: &str) {}

    /// Receipts of `room_id` were loaded from disk.
    fn on_read_receipts_loaded(&self, _room_id: &RoomId) {}
}

/// Registered listeners
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn StoreListener>>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("count", &self.listeners.read().len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Register a listener.
    pub fn add(&self, listener: Arc<dyn StoreListener>) {
        self.listeners.write().push(listener);
    }

    /// Unregister a listener, by identity.
    pub fn remove(&self, listener: &Arc<dyn StoreListener>) {
        self.listeners
            .write()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    // Copy out so a listener may (un)register from its callback.
    fn snapshot(&self) -> Vec<Arc<dyn StoreListener>> {
        self.listeners.read().clone()
    }

    pub(crate) fn store_ready(&self, user_id: &UserId) {
        for l in self.snapshot() {
            l.on_store_ready(user_id);
        }
    }

    pub(crate) fn store_corrupted(&self, user_id: &UserId, description: &str) {
        for l in self.snapshot() {
            l.on_store_corrupted(user_id, description);
        }
    }

    pub(crate) fn resource_exhausted(&self, description: &str) {
        for l in self.snapshot() {
            l.on_resource_exhausted(description);
        }
    }

    pub(crate) fn read_receipts_loaded(&self, room_id: &RoomId) {
        for l in self.snapshot() {
            l.on_read_receipts_loaded(room_id);
        }
    }
}

/// Listener that records every notification, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: parking_lot::Mutex<Vec<StoreNotification>>,
}

/// A recorded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreNotification {
    /// See [`StoreListener::on_store_ready`]
    Ready(UserId),
    /// See [`StoreListener::on_store_corrupted`]
    Corrupted(UserId, String),
    /// See [`StoreListener::on_resource_exhausted`]
    ResourceExhausted(String),
    /// See [`StoreListener::on_read_receipts_loaded`]
    ReceiptsLoaded(RoomId),
}

impl RecordingListener {
    /// Notifications received so far.
    pub fn notifications(&self) -> Vec<StoreNotification> {
        self.events.lock().clone()
    }

    /// Number of ready notifications.
    pub fn ready_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|n| matches!(n, StoreNotification::Ready(_)))
            .count()
    }
}

impl StoreListener for RecordingListener {
    fn on_store_ready(&self, user_id: &UserId) {
        self.events.lock().push(StoreNotification::Ready(user_id.clone()));
    }

    fn on_store_corrupted(&self, user_id: &UserId, description: &str) {
        self.events
            .lock()
            .push(StoreNotification::Corrupted(user_id.clone(), description.to_string()));
    }

    fn on_resource_exhausted(&self, description: &str) {
        self.events
            .lock()
            .push(StoreNotification::ResourceExhausted(description.to_string()));
    }

    fn on_read_receipts_loaded(&self, room_id: &RoomId) {
        self.events
            .lock()
            .push(StoreNotification::ReceiptsLoaded(room_id.clone()));
    }
}
