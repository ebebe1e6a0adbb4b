//! Commit path
//!
//! Each flush swaps out one dirty list, snapshots the matching records on
//! the caller thread and queues a single [`FlushBatch`] job. The worker only
//! encodes and writes; it never reads the live tables.

use super::{FileStore, StoreShared};
use crate::dirty::DirtyKind;
use crate::session::SessionStore;
use crate::users;
use chatvault_core::{
    Event, ReceiptRecord, RoomAccountData, RoomId, RoomState, RoomSummary, StoreMetadata,
    UserId, UserProfile,
};
use chatvault_durability::RoomCategory;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Message history and cursor of a room at commit time
pub(crate) struct MessageSnapshot {
    pub(crate) events: Vec<Event>,
    pub(crate) cursor: Option<String>,
}

/// Records captured by one flush. `None` entries are deletions.
pub(crate) enum FlushBatch {
    Messages(Vec<(RoomId, Option<MessageSnapshot>)>),
    States(Vec<(RoomId, Option<RoomState>)>),
    Summaries(Vec<(RoomId, Option<RoomSummary>)>),
    AccountData(Vec<(RoomId, Option<RoomAccountData>)>),
    Receipts(Vec<(RoomId, Vec<ReceiptRecord>)>),
    Users {
        shards: BTreeMap<u32, Vec<UserProfile>>,
        ids: Vec<UserId>,
    },
    Metadata(StoreMetadata),
}

impl FlushBatch {
    fn label(&self) -> &'static str {
        match self {
            FlushBatch::Messages(_) => "messages",
            FlushBatch::States(_) => "states",
            FlushBatch::Summaries(_) => "summaries",
            FlushBatch::AccountData(_) => "account data",
            FlushBatch::Receipts(_) => "receipts",
            FlushBatch::Users { .. } => "users",
            FlushBatch::Metadata(_) => "metadata",
        }
    }

    /// Ids this batch drained from the dirty lists.
    fn dirty_keys(&self) -> DirtyKeys {
        fn rooms<T>(kind: DirtyKind, rooms: &[(RoomId, T)]) -> DirtyKeys {
            DirtyKeys::Rooms(kind, rooms.iter().map(|(room, _)| room.clone()).collect())
        }
        match self {
            FlushBatch::Messages(r) => rooms(DirtyKind::Messages, r),
            FlushBatch::States(r) => rooms(DirtyKind::State, r),
            FlushBatch::Summaries(r) => rooms(DirtyKind::Summary, r),
            FlushBatch::AccountData(r) => rooms(DirtyKind::AccountData, r),
            FlushBatch::Receipts(r) => rooms(DirtyKind::Receipts, r),
            FlushBatch::Users { ids, .. } => DirtyKeys::Users(ids.clone()),
            FlushBatch::Metadata(_) => DirtyKeys::Metadata,
        }
    }
}

/// What a rejected batch puts back on the dirty lists
enum DirtyKeys {
    Rooms(DirtyKind, Vec<RoomId>),
    Users(Vec<UserId>),
    Metadata,
}

impl DirtyKeys {
    fn requeue(self, shared: &StoreShared) {
        match self {
            DirtyKeys::Rooms(kind, rooms) => shared.dirty.mark_rooms(kind, rooms.iter()),
            DirtyKeys::Users(ids) => shared.dirty.mark_users(ids),
            DirtyKeys::Metadata => shared.metadata.mark_dirty(),
        }
    }
}

impl StoreShared {
    pub(crate) fn message_snapshot(&self, room: &RoomId) -> Option<MessageSnapshot> {
        if !self.cache.has_room(room) {
            return None;
        }
        let (events, cursor) = self
            .cache
            .history_snapshot(room)
            .unwrap_or_else(|| (Vec::new(), self.cache.pagination_token(room)));
        Some(MessageSnapshot { events, cursor })
    }

    fn collect_messages(&self) -> Option<FlushBatch> {
        let rooms = self.dirty.take_rooms(DirtyKind::Messages);
        if rooms.is_empty() {
            return None;
        }
        Some(FlushBatch::Messages(
            rooms
                .into_iter()
                .map(|room| {
                    let snapshot = self.message_snapshot(&room);
                    (room, snapshot)
                })
                .collect(),
        ))
    }

    fn collect_states(&self) -> Option<FlushBatch> {
        let rooms = self.dirty.take_rooms(DirtyKind::State);
        if rooms.is_empty() {
            return None;
        }
        Some(FlushBatch::States(
            rooms
                .into_iter()
                .map(|room| {
                    let state = self.cache.room_state(&room);
                    (room, state)
                })
                .collect(),
        ))
    }

    fn collect_summaries(&self) -> Option<FlushBatch> {
        let rooms = self.dirty.take_rooms(DirtyKind::Summary);
        if rooms.is_empty() {
            return None;
        }
        Some(FlushBatch::Summaries(
            rooms
                .into_iter()
                .map(|room| {
                    let summary = self.cache.summary(&room);
                    (room, summary)
                })
                .collect(),
        ))
    }

    fn collect_account_data(&self) -> Option<FlushBatch> {
        let rooms = self.dirty.take_rooms(DirtyKind::AccountData);
        if rooms.is_empty() {
            return None;
        }
        Some(FlushBatch::AccountData(
            rooms
                .into_iter()
                .map(|room| {
                    let data = if self.cache.has_room(&room) {
                        self.cache.account_data(&room)
                    } else {
                        None
                    };
                    (room, data)
                })
                .collect(),
        ))
    }

    pub(crate) fn collect_receipts(&self) -> Option<FlushBatch> {
        let rooms = self.dirty.take_rooms(DirtyKind::Receipts);
        let mut batch = Vec::with_capacity(rooms.len());
        let mut waiting = Vec::new();

        for room in rooms {
            if self.receipts.is_pending(&room) {
                // Writing now would clobber the file before it is read.
                waiting.push(room);
                continue;
            }
            if let Some(map) = self.cache.receipt_map(&room) {
                let mut list: Vec<ReceiptRecord> = map.into_values().collect();
                list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
                batch.push((room, list));
            }
        }

        if !waiting.is_empty() {
            debug!(target: "chatvault::store", count = waiting.len(), "Receipt flush deferred until load");
            self.dirty.mark_rooms(DirtyKind::Receipts, waiting.iter());
        }
        (!batch.is_empty()).then_some(FlushBatch::Receipts(batch))
    }

    pub(crate) fn collect_users(&self) -> Option<FlushBatch> {
        // Shards on disk may hold profiles not loaded yet.
        if !self.users_loaded.load(Ordering::Acquire) {
            return None;
        }
        let ids = self.dirty.take_users();
        if ids.is_empty() {
            return None;
        }
        let own = &self.credentials.user_id;
        let mut shards = self
            .cache
            .with_users(|table| users::dirty_shards(&ids, table));
        for group in shards.values_mut() {
            group.retain(|profile| &profile.user_id != own);
        }
        Some(FlushBatch::Users { shards, ids })
    }

    /// Execute a batch. Runs on the worker.
    pub(crate) fn write_batch(&self, batch: FlushBatch) {
        let started = Instant::now();
        let label = batch.label();
        let count = match batch {
            FlushBatch::Messages(rooms) => {
                let count = rooms.len();
                for (room, snapshot) in rooms {
                    match snapshot {
                        Some(snapshot) => self.save_messages(&room, snapshot),
                        None => self.remove_room_files(
                            &room,
                            &[RoomCategory::Messages, RoomCategory::Tokens],
                        ),
                    }
                }
                count
            }
            FlushBatch::States(rooms) => self.write_room_records(RoomCategory::State, rooms),
            FlushBatch::Summaries(rooms) => self.write_room_records(RoomCategory::Summary, rooms),
            FlushBatch::AccountData(rooms) => {
                self.write_room_records(RoomCategory::AccountData, rooms)
            }
            FlushBatch::Receipts(rooms) => {
                let count = rooms.len();
                for (room, receipts) in rooms {
                    let path = self.paths.room_file(RoomCategory::Receipts, &room);
                    if let Err(e) = self.blobs.write(&path, &receipts) {
                        self.report("save receipts", &e);
                    }
                }
                count
            }
            FlushBatch::Users { shards, .. } => {
                let count = shards.len();
                for (shard, profiles) in shards {
                    let path = self.paths.user_shard_file(shard);
                    let result = if profiles.is_empty() {
                        self.blobs.remove(&path).map(|_| ())
                    } else {
                        self.blobs.write(&path, &profiles)
                    };
                    if let Err(e) = result {
                        self.report("save users", &e);
                    }
                }
                count
            }
            FlushBatch::Metadata(metadata) => {
                self.save_metadata(&metadata);
                1
            }
        };
        debug!(
            target: "chatvault::store",
            kind = label,
            count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Flushed"
        );
    }

    fn write_room_records<T: serde::Serialize>(
        &self,
        category: RoomCategory,
        rooms: Vec<(RoomId, Option<T>)>,
    ) -> usize {
        let count = rooms.len();
        for (room, record) in rooms {
            let path = self.paths.room_file(category, &room);
            let result = match record {
                Some(record) => self.blobs.write(&path, &record),
                None => self.blobs.remove(&path).map(|_| ()),
            };
            if let Err(e) = result {
                self.report(category.dir_name(), &e);
            }
        }
        count
    }

    /// Persist the retained part of a room's history and its cursor.
    pub(crate) fn save_messages(&self, room: &RoomId, snapshot: MessageSnapshot) {
        let kept = self
            .retention
            .apply(&snapshot.events, snapshot.cursor.as_deref());
        if kept.aggressive {
            debug!(target: "chatvault::store", room_id = %room, offset = kept.offset, "Aggressive history trim");
        }

        let messages = self.paths.room_file(RoomCategory::Messages, room);
        if let Err(e) = self.blobs.write(&messages, kept.events) {
            self.report("save messages", &e);
            return;
        }

        let tokens = self.paths.room_file(RoomCategory::Tokens, room);
        let result = match kept.cursor {
            Some(cursor) => self.blobs.write(&tokens, cursor),
            None => self.blobs.remove(&tokens).map(|_| ()),
        };
        if let Err(e) = result {
            self.report("save token", &e);
        }
    }

    pub(crate) fn save_metadata(&self, metadata: &StoreMetadata) {
        if let Err(e) = self.blobs.write(&self.paths.metadata(), metadata) {
            self.report("save metadata", &e);
        }
    }
}

impl FileStore {
    fn dispatch(&self, batch: Option<FlushBatch>) {
        let Some(batch) = batch else {
            return;
        };
        let label = batch.label();
        let keys = batch.dirty_keys();

        let shared = Arc::clone(&self.shared);
        if self
            .scheduler
            .submit(move || shared.write_batch(batch))
            .is_err()
        {
            warn!(target: "chatvault::store", kind = label, "Write queue full, flush deferred");
            keys.requeue(&self.shared);
        }
    }

    pub(super) fn flush_users(&self) {
        let _guard = self.flush_lock.lock();
        self.dispatch(self.shared.collect_users());
    }

    pub(super) fn flush_messages(&self) {
        let _guard = self.flush_lock.lock();
        self.dispatch(self.shared.collect_messages());
    }

    pub(super) fn flush_states(&self) {
        let _guard = self.flush_lock.lock();
        self.dispatch(self.shared.collect_states());
    }

    pub(super) fn flush_summaries_pending(&self) {
        let _guard = self.flush_lock.lock();
        self.dispatch(self.shared.collect_summaries());
    }

    pub(super) fn flush_account_data(&self) {
        let _guard = self.flush_lock.lock();
        self.dispatch(self.shared.collect_account_data());
    }

    pub(super) fn flush_receipts(&self) {
        let _guard = self.flush_lock.lock();
        self.dispatch(self.shared.collect_receipts());
    }

    pub(super) fn flush_metadata(&self) {
        let _guard = self.flush_lock.lock();
        self.dispatch(self.shared.metadata.take_snapshot().map(FlushBatch::Metadata));
    }
}
