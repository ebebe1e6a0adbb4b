//! File-backed session store
//!
//! [`FileStore`] wraps a [`MemoryCache`] and persists it under
//! `<base>/<user_id>/` with write-behind batching:
//!
//! - Mutators update the cache and mark ids dirty; they never touch disk
//! - [`FileStore::commit`] snapshots the dirty records and queues the writes
//! - One worker thread performs every read, write and delete in order
//!
//! ## Lifecycle
//!
//! ```text
//! Fresh ──open()──> Opening ──load ok──> Ready
//!                      │                   ^
//!                      └──load failed──> reset
//! any ──close()──> Killed
//! ```
//!
//! Construction reads the metadata synchronously. Missing metadata, another
//! format version, or other credentials wipe the directory and start a new
//! storage, which is `Ready` immediately.

mod flush;
mod load;

use crate::cache::{MemoryCache, SessionInfo};
use crate::config::{VaultConfig, CONFIG_FILE_NAME};
use crate::dirty::{DirtyKind, DirtyTracker};
use crate::listener::{ListenerRegistry, StoreListener};
use crate::metadata::MetadataManager;
use crate::receipts::ReceiptLoader;
use crate::scheduler::{SchedulerStats, WriteBehindScheduler};
use crate::session::SessionStore;
use chatvault_core::{
    Credentials, Direction, Error, Event, EventId, ReceiptRecord, Result, RoomAccountData, RoomId,
    RoomState, RoomSummary, StoreMetadata, ThirdPartyIdentifier, UserId, UserProfile,
};
use chatvault_durability::{
    BlobError, BlobStore, RetentionPolicy, RoomCategory, StoreConfig, StorePaths,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a [`FileStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed over existing data, not opened yet
    Fresh,
    /// Loading on the worker
    Opening,
    /// Loaded (or reset to empty) and usable
    Ready,
    /// Closed; terminal
    Killed,
}

/// State shared between the store handle and worker jobs
pub(crate) struct StoreShared {
    pub(crate) credentials: Credentials,
    pub(crate) paths: StorePaths,
    pub(crate) blobs: BlobStore,
    pub(crate) retention: RetentionPolicy,
    pub(crate) cache: Arc<MemoryCache>,
    pub(crate) dirty: DirtyTracker,
    pub(crate) metadata: MetadataManager,
    pub(crate) receipts: ReceiptLoader,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) lifecycle: Mutex<Lifecycle>,
    pub(crate) is_new_storage: AtomicBool,
    pub(crate) users_loaded: AtomicBool,
}

impl StoreShared {
    /// Log a failed disk operation, raising the exhaustion notification
    /// when it applies.
    pub(crate) fn report(&self, context: &str, err: &BlobError) {
        if err.is_resource_exhaustion() {
            error!(target: "chatvault::store", context, error = %err, "Resource exhausted");
            self.listeners
                .resource_exhausted(&format!("{}: {}", context, err));
        } else {
            warn!(target: "chatvault::store", context, error = %err, "Disk operation failed");
        }
    }

    /// Copy session fields from the metadata into the cache.
    pub(crate) fn seed_session(&self) {
        if let Some(metadata) = self.metadata.current() {
            self.cache.set_session_info(session_info(&metadata));
        }
    }

    /// Delete every file of `room`, on the worker.
    pub(crate) fn remove_room_files(&self, room: &RoomId, categories: &[RoomCategory]) {
        for category in categories {
            let path = self.paths.room_file(*category, room);
            if let Err(e) = self.blobs.remove(&path) {
                self.report("remove room file", &e);
            }
        }
    }

    /// Wipe and recreate the directory tree; metadata is dropped.
    pub(crate) fn wipe_storage(&self) {
        if let Err(e) = self.paths.remove_all() {
            error!(target: "chatvault::store", path = %self.paths.root().display(), error = %e, "Failed to delete store directory");
        }
        if let Err(e) = self.paths.create_directories() {
            error!(target: "chatvault::store", path = %self.paths.root().display(), error = %e, "Failed to recreate store directory");
        }
        self.metadata.discard();
        self.users_loaded.store(true, Ordering::Release);
    }
}

fn session_info(metadata: &StoreMetadata) -> SessionInfo {
    SessionInfo {
        sync_cursor: metadata.sync_cursor.clone(),
        display_name: metadata.display_name.clone(),
        avatar_url: metadata.avatar_url.clone(),
        third_party_ids: metadata.third_party_ids.clone(),
        ignored_user_ids: metadata.ignored_user_ids.clone(),
        direct_chat_map: metadata.direct_chat_map.clone(),
    }
}

/// Every per-room category
static ALL_ROOM_FILES: [RoomCategory; 6] = RoomCategory::ALL;

/// Crash-safe, write-behind persistent session store
pub struct FileStore {
    shared: Arc<StoreShared>,
    scheduler: WriteBehindScheduler,
    // Held from taking a dirty list until its batch is queued, so batches of
    // one kind reach the worker in snapshot order.
    flush_lock: Mutex<()>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("user_id", &self.shared.credentials.user_id)
            .field("root", &self.shared.paths.root())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

impl FileStore {
    /// Create a store for `credentials` under `base_dir`.
    ///
    /// Reads the metadata synchronously. When it is missing, unreadable,
    /// from another format version, or from other credentials, the whole
    /// store directory is deleted and recreated before fresh metadata is
    /// queued for writing.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the directory tree cannot be
    /// created, or the worker thread cannot be spawned.
    pub fn new(base_dir: impl AsRef<Path>, credentials: Credentials, config: StoreConfig) -> Result<Self> {
        let paths = StorePaths::for_user(base_dir, &credentials.user_id);
        paths.create_directories()?;

        let blobs = BlobStore::from_config(&config)
            .map_err(|e| Error::InvalidOperation(format!("invalid store config: {}", e)))?;
        let scheduler = WriteBehindScheduler::new(
            format!("chatvault-{}", credentials.user_id),
            config.queue_depth,
        )?;

        let loaded = read_metadata(&blobs, &paths, &credentials);
        let is_new_storage = loaded.is_none();
        if is_new_storage {
            info!(target: "chatvault::store", user_id = %credentials.user_id, "Starting new storage");
            paths.remove_all()?;
            paths.create_directories()?;
        }

        let shared = Arc::new(StoreShared {
            credentials,
            paths,
            blobs,
            retention: config.retention,
            cache: Arc::new(MemoryCache::new()),
            dirty: DirtyTracker::new(),
            metadata: MetadataManager::new(loaded),
            receipts: ReceiptLoader::new(),
            listeners: ListenerRegistry::default(),
            lifecycle: Mutex::new(Lifecycle::Fresh),
            is_new_storage: AtomicBool::new(is_new_storage),
            users_loaded: AtomicBool::new(is_new_storage),
        });

        let store = FileStore {
            shared,
            scheduler,
            flush_lock: Mutex::new(()),
        };
        if is_new_storage {
            store.shared.metadata.install_fresh(&store.shared.credentials);
            store.flush_metadata();
            *store.shared.lifecycle.lock() = Lifecycle::Ready;
        }
        store.shared.seed_session();
        Ok(store)
    }

    /// Create a store configured by `<base_dir>/chatvault.toml`.
    ///
    /// The file is written with defaults if it does not exist.
    pub fn from_config_dir(base_dir: impl AsRef<Path>, credentials: Credentials) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        std::fs::create_dir_all(base_dir)?;
        let config_path = base_dir.join(CONFIG_FILE_NAME);
        VaultConfig::write_default_if_missing(&config_path)?;
        let config = VaultConfig::from_file(&config_path)?.to_store_config()?;
        Self::new(base_dir, credentials, config)
    }

    /// Load persisted data into the cache, on the worker.
    ///
    /// Ignored while opening or after close. On a store that is already
    /// ready, only re-issues the ready notification.
    pub fn open(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Opening | Lifecycle::Killed => {}
            Lifecycle::Ready => {
                let shared = Arc::clone(&self.shared);
                let queued = self.scheduler.submit_unbounded(move || {
                    shared.listeners.store_ready(&shared.credentials.user_id);
                });
                if queued.is_err() {
                    warn!(target: "chatvault::store", "Store worker stopped, ready notification dropped");
                }
            }
            Lifecycle::Fresh => {
                *lifecycle = Lifecycle::Opening;
                info!(target: "chatvault::store", user_id = %self.shared.credentials.user_id, "Opening store");
                let shared = Arc::clone(&self.shared);
                if self
                    .scheduler
                    .submit_unbounded(move || shared.run_open())
                    .is_err()
                {
                    *lifecycle = Lifecycle::Fresh;
                    warn!(target: "chatvault::store", "Store worker stopped, open abandoned");
                }
            }
        }
    }

    /// Stop the worker. Queued writes are dropped. Irreversible.
    pub fn close(&self) {
        info!(target: "chatvault::store", user_id = %self.shared.credentials.user_id, "Closing store");
        *self.shared.lifecycle.lock() = Lifecycle::Killed;
        self.scheduler.kill();
        self.scheduler.shutdown();
    }

    /// Drop all cached and persisted data and recreate an empty layout.
    ///
    /// Runs on the worker after the writes already queued, and returns once
    /// the directory is wiped. The lifecycle state is unchanged; nothing is
    /// persisted again until the store is reconstructed.
    pub fn clear(&self) {
        info!(target: "chatvault::store", user_id = %self.shared.credentials.user_id, "Clearing store");
        self.shared.cache.clear();
        self.shared.dirty.clear();
        self.shared.receipts.clear();

        let shared = Arc::clone(&self.shared);
        if self
            .scheduler
            .run_blocking(move || shared.wipe_storage())
            .is_none()
        {
            // Worker gone: nothing else can touch the directory.
            self.shared.wipe_storage();
        }
    }

    /// Queue every pending change for writing.
    ///
    /// No-op after close or clear.
    pub fn commit(&self) {
        if self.scheduler.is_killed() || !self.shared.metadata.is_present() {
            return;
        }
        debug!(target: "chatvault::store", "Commit");
        self.flush_users();
        self.flush_messages();
        self.flush_states();
        self.flush_summaries_pending();
        self.flush_account_data();
        self.flush_receipts();
        self.flush_metadata();
    }

    /// Block until every queued disk operation has run.
    pub fn drain(&self) {
        self.scheduler.drain();
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.shared.lifecycle.lock()
    }

    /// Whether the store is loaded and usable.
    pub fn is_ready(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_killed(&self) -> bool {
        self.scheduler.is_killed()
    }

    /// Whether construction started a brand-new storage.
    pub fn is_new_storage(&self) -> bool {
        self.shared.is_new_storage.load(Ordering::Acquire)
    }

    /// Whether the background user load has completed.
    pub fn users_loaded(&self) -> bool {
        self.shared.users_loaded.load(Ordering::Acquire)
    }

    /// Session credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.shared.credentials
    }

    /// Directory layout of this store.
    pub fn paths(&self) -> &StorePaths {
        &self.shared.paths
    }

    /// Record reader/writer, for crash injection in tests.
    pub fn blobs(&self) -> &BlobStore {
        &self.shared.blobs
    }

    /// The wrapped cache.
    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.shared.cache
    }

    /// Copy of the metadata record, if one is held.
    pub fn metadata(&self) -> Option<StoreMetadata> {
        self.shared.metadata.current()
    }

    /// Rooms whose receipts are still waiting to be loaded, front first.
    pub fn pending_receipt_rooms(&self) -> Vec<RoomId> {
        self.shared.receipts.pending()
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn StoreListener>) {
        self.shared.listeners.add(listener);
    }

    /// Unregister a listener.
    pub fn remove_listener(&self, listener: &Arc<dyn StoreListener>) {
        self.shared.listeners.remove(listener);
    }

    /// Bytes used by the store directory.
    pub fn disk_usage(&self) -> u64 {
        self.shared.paths.disk_usage()
    }

    /// Worker queue metrics.
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    fn enqueue_removal(&self, room: &RoomId, categories: &'static [RoomCategory]) {
        let shared = Arc::clone(&self.shared);
        let room_id = room.clone();
        if self
            .scheduler
            .submit_unbounded(move || shared.remove_room_files(&room_id, categories))
            .is_err()
        {
            debug!(target: "chatvault::store", room_id = %room, "Store worker stopped, file removal skipped");
        }
    }
}

/// Read and validate the metadata. `None` means a new storage is needed.
fn read_metadata(blobs: &BlobStore, paths: &StorePaths, credentials: &Credentials) -> Option<StoreMetadata> {
    let mut metadata: StoreMetadata = match blobs.read(&paths.metadata()) {
        Ok(metadata) => metadata,
        Err(e) if e.is_not_found() => return None,
        Err(e) => {
            warn!(target: "chatvault::store", error = %e, "Metadata unreadable, resetting store");
            return None;
        }
    };
    metadata.normalize();
    match metadata.validate(credentials) {
        Ok(()) => Some(metadata),
        Err(e) => {
            warn!(target: "chatvault::store", error = %e, "Metadata rejected, resetting store");
            None
        }
    }
}

static MESSAGE_FILES: [RoomCategory; 2] = [RoomCategory::Messages, RoomCategory::Tokens];
static SUMMARY_FILE: [RoomCategory; 1] = [RoomCategory::Summary];

impl SessionStore for FileStore {
    fn sync_cursor(&self) -> Option<String> {
        self.shared.cache.sync_cursor()
    }

    fn set_sync_cursor(&self, cursor: Option<String>) {
        debug!(target: "chatvault::store", cursor = ?cursor, "Set sync cursor");
        self.shared.cache.set_sync_cursor(cursor.clone());
        self.shared.metadata.set_sync_cursor(cursor);
    }

    fn display_name(&self) -> Option<String> {
        self.shared.cache.display_name()
    }

    fn set_display_name(&self, name: Option<String>) {
        debug!(target: "chatvault::store", "Set display name");
        self.shared.cache.set_display_name(name.clone());
        self.shared.metadata.set_display_name(name);
    }

    fn avatar_url(&self) -> Option<String> {
        self.shared.cache.avatar_url()
    }

    fn set_avatar_url(&self, url: Option<String>) {
        debug!(target: "chatvault::store", "Set avatar url");
        self.shared.cache.set_avatar_url(url.clone());
        self.shared.metadata.set_avatar_url(url);
    }

    fn third_party_ids(&self) -> Vec<ThirdPartyIdentifier> {
        self.shared.cache.third_party_ids()
    }

    fn set_third_party_ids(&self, ids: Vec<ThirdPartyIdentifier>) {
        debug!(target: "chatvault::store", "Set third-party identifiers");
        self.shared.cache.set_third_party_ids(ids.clone());
        self.shared.metadata.set_third_party_ids(ids);
    }

    fn ignored_user_ids(&self) -> Vec<UserId> {
        self.shared.cache.ignored_user_ids()
    }

    fn set_ignored_user_ids(&self, users: Vec<UserId>) {
        debug!(target: "chatvault::store", count = users.len(), "Set ignored users");
        self.shared.cache.set_ignored_user_ids(users.clone());
        self.shared.metadata.set_ignored_user_ids(users);
    }

    fn direct_chat_map(&self) -> BTreeMap<UserId, Vec<RoomId>> {
        self.shared.cache.direct_chat_map()
    }

    fn set_direct_chat_map(&self, map: BTreeMap<UserId, Vec<RoomId>>) {
        debug!(target: "chatvault::store", count = map.len(), "Set direct chats");
        self.shared.cache.set_direct_chat_map(map.clone());
        self.shared.metadata.set_direct_chat_map(map);
    }

    fn room_ids(&self) -> Vec<RoomId> {
        self.shared.cache.room_ids()
    }

    fn has_room(&self, room: &RoomId) -> bool {
        self.shared.cache.has_room(room)
    }

    fn room_state(&self, room: &RoomId) -> Option<RoomState> {
        self.shared.cache.room_state(room)
    }

    fn store_room_state(&self, room: &RoomId, state: RoomState) {
        let known = self.shared.cache.has_room(room);
        self.shared.cache.store_room_state(room, state);
        self.shared.dirty.mark_room(DirtyKind::State, room);
        if !known {
            // Rooms are discovered from their message files at open.
            self.shared.dirty.mark_room(DirtyKind::Messages, room);
        }
    }

    fn delete_room(&self, room: &RoomId) {
        debug!(target: "chatvault::store", room_id = %room, "Delete room");
        self.shared.cache.delete_room(room);
        self.shared.receipts.remove(room);
        self.enqueue_removal(room, &ALL_ROOM_FILES);
    }

    fn store_room_events(
        &self,
        room: &RoomId,
        events: Vec<Event>,
        token: Option<String>,
        direction: Direction,
    ) {
        // Paging back through a room that already holds a full history
        // would only rewrite the same retained suffix.
        let can_store = direction == Direction::Forwards
            || self.shared.cache.history_len(room) < self.shared.retention.max_stored;
        if !can_store {
            debug!(target: "chatvault::store", room_id = %room, "Backward chunk not flushed, history at max size");
        }

        self.shared
            .cache
            .store_room_events(room, events, token, direction);

        if can_store {
            self.shared.dirty.mark_room(DirtyKind::Messages, room);
        }
    }

    fn store_live_event(&self, event: Event) {
        let room = event.room_id.clone();
        self.shared.cache.store_live_event(event);
        self.shared.dirty.mark_room(DirtyKind::Messages, &room);
    }

    fn delete_event(&self, room: &RoomId, event_id: &EventId) -> bool {
        let removed = self.shared.cache.delete_event(room, event_id);
        self.shared.dirty.mark_room(DirtyKind::Messages, room);
        removed
    }

    fn delete_all_room_messages(&self, room: &RoomId, keep_unsent: bool) {
        debug!(target: "chatvault::store", room_id = %room, keep_unsent, "Delete all room messages");
        self.shared.cache.delete_all_room_messages(room, keep_unsent);
        if !keep_unsent {
            self.enqueue_removal(room, &MESSAGE_FILES);
        }
        self.enqueue_removal(room, &SUMMARY_FILE);
        self.shared.dirty.mark_room(DirtyKind::Messages, room);
        self.shared.dirty.mark_room(DirtyKind::Summary, room);
    }

    fn room_events(&self, room: &RoomId) -> Vec<Event> {
        self.shared.cache.room_events(room)
    }

    fn pagination_token(&self, room: &RoomId) -> Option<String> {
        self.shared.cache.pagination_token(room)
    }

    fn store_summary(&self, summary: RoomSummary) {
        let room = summary.room_id.clone();
        self.shared.cache.store_summary(summary);
        self.shared.dirty.mark_room(DirtyKind::Summary, &room);
    }

    fn flush_summary(&self, summary: RoomSummary) {
        let room = summary.room_id.clone();
        self.shared.cache.flush_summary(summary);
        // Already pending: the next commit writes it.
        if self.shared.dirty.mark_room(DirtyKind::Summary, &room) {
            self.flush_summaries_pending();
        }
    }

    fn flush_summaries(&self) {
        self.shared.cache.flush_summaries();
        let rooms = self.shared.cache.summary_ids();
        self.shared.dirty.mark_rooms(DirtyKind::Summary, rooms.iter());
        self.flush_summaries_pending();
    }

    fn summary(&self, room: &RoomId) -> Option<RoomSummary> {
        self.shared.cache.summary(room)
    }

    fn summaries(&self) -> Vec<RoomSummary> {
        self.shared.cache.summaries()
    }

    fn store_account_data(&self, room: &RoomId, data: RoomAccountData) {
        self.shared.cache.store_account_data(room, data);
        if self.shared.cache.has_room(room) {
            self.shared.dirty.mark_room(DirtyKind::AccountData, room);
        }
    }

    fn account_data(&self, room: &RoomId) -> Option<RoomAccountData> {
        self.shared.cache.account_data(room)
    }

    fn store_receipt(&self, room: &RoomId, receipt: ReceiptRecord) -> bool {
        let stored = self.shared.cache.store_receipt(room, receipt);
        if stored {
            self.shared.dirty.mark_room(DirtyKind::Receipts, room);
        }
        stored
    }

    fn receipts(&self, room: &RoomId) -> Vec<ReceiptRecord> {
        if self.shared.receipts.promote(room) {
            debug!(target: "chatvault::store", room_id = %room, "Receipt load moved up");
        }
        self.shared.cache.receipts(room)
    }

    fn store_user(&self, profile: UserProfile) {
        if profile.user_id != self.shared.credentials.user_id {
            self.shared.dirty.mark_user(&profile.user_id);
        }
        self.shared.cache.store_user(profile);
    }

    fn user(&self, user: &UserId) -> Option<UserProfile> {
        self.shared.cache.user(user)
    }

    fn user_count(&self) -> usize {
        self.shared.cache.user_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{RecordingListener, StoreNotification};
    use tempfile::TempDir;

    fn credentials() -> Credentials {
        Credentials::new("@me:hs", "token")
    }

    fn new_store(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path(), credentials(), StoreConfig::for_testing()).unwrap()
    }

    #[test]
    fn test_new_storage_is_ready_and_writes_metadata() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        assert!(store.is_new_storage());
        assert!(store.is_ready());
        assert!(store.users_loaded());

        store.drain();
        assert!(store.paths().metadata().exists());
    }

    #[test]
    fn test_open_on_ready_store_reissues_ready() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        let listener = Arc::new(RecordingListener::default());
        store.add_listener(listener.clone());

        store.open();
        store.open();
        store.drain();
        assert_eq!(listener.ready_count(), 2);
        assert_eq!(
            listener.notifications()[0],
            StoreNotification::Ready(UserId::from("@me:hs"))
        );
    }

    #[test]
    fn test_self_user_not_marked_dirty() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        store.store_user(UserProfile::new("@me:hs"));
        assert_eq!(store.shared.dirty.pending_users(), 0);
        assert!(store.user(&UserId::from("@me:hs")).is_some());

        store.store_user(UserProfile::new("@other:hs"));
        assert_eq!(store.shared.dirty.pending_users(), 1);
    }

    #[test]
    fn test_account_data_needs_room() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        let room = RoomId::from("!r:hs");

        store.store_account_data(&room, RoomAccountData::default());
        assert!(!store.shared.dirty.is_room_dirty(DirtyKind::AccountData, &room));

        store.store_room_state(&room, RoomState::default());
        store.store_account_data(&room, RoomAccountData::default());
        assert!(store.shared.dirty.is_room_dirty(DirtyKind::AccountData, &room));
    }

    #[test]
    fn test_backward_chunk_on_full_history_not_marked() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        let room = RoomId::from("!r:hs");

        let events: Vec<Event> = (0..50)
            .map(|i| Event::new(format!("$e{}", i).as_str(), "!r:hs", "@a:hs", "m.room.message", i))
            .collect();
        store.store_room_events(&room, events, None, Direction::Forwards);
        store.shared.dirty.take_rooms(DirtyKind::Messages);

        store.store_room_events(
            &room,
            vec![Event::new("$old", "!r:hs", "@a:hs", "m.room.message", 0)],
            Some("t".into()),
            Direction::Backwards,
        );
        assert!(!store.shared.dirty.is_room_dirty(DirtyKind::Messages, &room));
        assert_eq!(store.room_events(&room).len(), 51);
    }

    #[test]
    fn test_commit_after_close_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        store.drain();
        store.close();
        assert_eq!(store.lifecycle(), Lifecycle::Killed);

        store.store_summary(RoomSummary::new("!r:hs"));
        store.commit();
        assert!(!store
            .paths()
            .room_file(RoomCategory::Summary, &RoomId::from("!r:hs"))
            .exists());

        // open after close stays killed
        store.open();
        assert_eq!(store.lifecycle(), Lifecycle::Killed);
    }
}
