//! Open sequence, run on the worker
//!
//! Stages run strictly in order and the first failure aborts the rest:
//!
//! 1. Messages: every file creates its room; pending local echoes become
//!    undeliverable
//! 2. Tokens: cursor per room, unless the oldest event carries one
//! 3. State: then placeholder users from every room's members
//! 4. Summaries
//! 5. Account data: only for known rooms
//!
//! After a successful open the store is ready and receipts, then users, are
//! loaded in the background.

use super::{Lifecycle, StoreShared, ALL_ROOM_FILES};
use crate::session::SessionStore;
use crate::users;
use chatvault_core::{
    Error, Event, ReceiptRecord, Result, RoomAccountData, RoomId, RoomState, RoomSummary,
    SentState, UserProfile,
};
use chatvault_durability::{decode_entry_name, list_entries, RoomCategory};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// First timestamp handed to rewritten local echoes
pub(crate) const UNDELIVERABLE_TS_BASE: u64 = 1 << 50;

/// Mark pending local echoes undeliverable. Returns how many changed.
///
/// Rewritten events get increasing timestamps from
/// [`UNDELIVERABLE_TS_BASE`] so they keep their relative order.
pub(crate) fn rewrite_undeliverable(events: &mut [Event]) -> usize {
    let mut ts = UNDELIVERABLE_TS_BASE;
    let mut count = 0;
    for event in events
        .iter_mut()
        .filter(|e| e.sent_state.is_pending_local_echo())
    {
        event.sent_state = SentState::Undeliverable;
        event.origin_server_ts = ts;
        ts += 1;
        count += 1;
    }
    count
}

impl StoreShared {
    pub(crate) fn is_killed(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Killed
    }

    fn room_entries(&self, category: RoomCategory) -> Result<Vec<RoomId>> {
        let names = list_entries(&self.paths.category_dir(category))?;
        Ok(names
            .iter()
            .map(|name| RoomId::from(decode_entry_name(name)))
            .collect())
    }

    /// Open job body.
    pub(crate) fn run_open(&self) {
        let started = Instant::now();
        let result = self.load_rooms();

        if self.is_killed() {
            debug!(target: "chatvault::store", "Store closed during open");
            return;
        }

        match result {
            Ok(()) => {
                info!(
                    target: "chatvault::store",
                    rooms = self.cache.room_ids().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Store opened"
                );
                match self.room_entries(RoomCategory::Receipts) {
                    Ok(rooms) => self.receipts.enqueue_all(rooms),
                    Err(e) => warn!(target: "chatvault::store", error = %e, "Failed to list receipt files"),
                }
                *self.lifecycle.lock() = Lifecycle::Ready;
                self.listeners.store_ready(&self.credentials.user_id);

                self.load_receipts();
                self.load_users();
            }
            Err(e) => {
                error!(target: "chatvault::store", error = %e, "Open failed, resetting store");
                self.reset_after_failure();
                *self.lifecycle.lock() = Lifecycle::Ready;
                if !self.is_new_storage.load(Ordering::Acquire) {
                    self.listeners
                        .store_corrupted(&self.credentials.user_id, &e.to_string());
                }
            }
        }
    }

    fn load_rooms(&self) -> Result<()> {
        self.load_messages()?;
        self.load_tokens()?;
        self.load_states()?;
        self.derive_placeholders();
        self.load_summaries()?;
        self.load_account_data()?;
        Ok(())
    }

    fn load_messages(&self) -> Result<()> {
        let started = Instant::now();
        let rooms = self.room_entries(RoomCategory::Messages)?;
        for room in &rooms {
            let path = self.paths.room_file(RoomCategory::Messages, room);
            let mut events: Vec<Event> = self.blobs.read(&path).map_err(|e| {
                self.report("load messages", &e);
                Error::from(e)
            })?;

            let rewritten = rewrite_undeliverable(&mut events);
            let cursor = events.first().and_then(|e| e.token.clone());

            self.cache.ensure_room(room);
            self.cache.set_history(room, events);
            if cursor.is_some() {
                self.cache.set_pagination_token(room, cursor);
            }

            if rewritten > 0 {
                debug!(target: "chatvault::store", room_id = %room, count = rewritten, "Local echoes marked undeliverable");
                if let Some(snapshot) = self.message_snapshot(room) {
                    self.save_messages(room, snapshot);
                }
            }
        }
        debug!(
            target: "chatvault::store",
            count = rooms.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded room messages"
        );
        Ok(())
    }

    /// Drop a room found inconsistent on disk.
    fn discard_room(&self, room: &RoomId) {
        warn!(target: "chatvault::store", room_id = %room, "Deleting unreadable room");
        self.cache.delete_room(room);
        self.remove_room_files(room, &ALL_ROOM_FILES);
    }

    fn load_tokens(&self) -> Result<()> {
        for room in self.room_entries(RoomCategory::Tokens)? {
            let path = self.paths.room_file(RoomCategory::Tokens, &room);
            if !self.cache.has_room(&room) {
                debug!(target: "chatvault::store", room_id = %room, "Removing token of unknown room");
                if let Err(e) = self.blobs.remove(&path) {
                    self.report("remove token", &e);
                }
                continue;
            }

            let token: String = match self.blobs.read(&path) {
                Ok(token) => token,
                Err(e) => {
                    self.report("load token", &e);
                    self.discard_room(&room);
                    return Err(e.into());
                }
            };
            // A token embedded on the oldest event is more precise.
            if self.cache.pagination_token(&room).is_none() {
                self.cache.set_pagination_token(&room, Some(token));
            }
        }
        Ok(())
    }

    fn load_states(&self) -> Result<()> {
        let started = Instant::now();
        let rooms = self.room_entries(RoomCategory::State)?;
        for room in &rooms {
            let path = self.paths.room_file(RoomCategory::State, room);
            if !self.cache.has_room(room) {
                debug!(target: "chatvault::store", room_id = %room, "Removing state of unknown room");
                if let Err(e) = self.blobs.remove(&path) {
                    self.report("remove state", &e);
                }
                continue;
            }

            let state: RoomState = match self.blobs.read(&path) {
                Ok(state) => state,
                Err(e) => {
                    self.report("load state", &e);
                    self.discard_room(room);
                    return Err(e.into());
                }
            };
            self.cache.store_room_state(room, state);
        }
        debug!(
            target: "chatvault::store",
            count = rooms.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded room states"
        );
        Ok(())
    }

    fn derive_placeholders(&self) {
        let members = self.cache.all_members();
        let created = self.cache.with_users_mut(|table| {
            members
                .iter()
                .filter(|member| users::apply_member(table, member))
                .count()
        });
        debug!(target: "chatvault::store", count = created, "Derived placeholder users");
    }

    fn load_summaries(&self) -> Result<()> {
        let rooms = self.room_entries(RoomCategory::Summary)?;
        for room in &rooms {
            let path = self.paths.room_file(RoomCategory::Summary, room);
            let mut summary: RoomSummary = self.blobs.read(&path).map_err(|e| {
                self.report("load summary", &e);
                Error::from(e)
            })?;
            // The file name is authoritative.
            summary.room_id = room.clone();
            self.cache.store_summary(summary);
        }
        debug!(target: "chatvault::store", count = rooms.len(), "Loaded room summaries");
        Ok(())
    }

    fn load_account_data(&self) -> Result<()> {
        let rooms = self.room_entries(RoomCategory::AccountData)?;
        for room in &rooms {
            let path = self.paths.room_file(RoomCategory::AccountData, room);
            let data: RoomAccountData = self.blobs.read(&path).map_err(|e| {
                self.report("load account data", &e);
                Error::from(e)
            })?;
            if self.cache.has_room(room) {
                self.cache.store_account_data(room, data);
            }
        }
        debug!(target: "chatvault::store", count = rooms.len(), "Loaded room account data");
        Ok(())
    }

    /// Wipe everything but the session identity after a failed open.
    fn reset_after_failure(&self) {
        match self.metadata.current() {
            Some(mut metadata) => {
                metadata.reset_session_data();
                self.metadata.replace(metadata);
            }
            None => self.metadata.install_fresh(&self.credentials),
        }

        if let Err(e) = self.paths.remove_all() {
            error!(target: "chatvault::store", error = %e, "Failed to delete store directory");
        }
        if let Err(e) = self.paths.create_directories() {
            error!(target: "chatvault::store", error = %e, "Failed to recreate store directory");
        }

        self.cache.clear();
        self.dirty.clear();
        self.receipts.clear();
        self.users_loaded.store(true, Ordering::Release);
        self.seed_session();

        if let Some(metadata) = self.metadata.take_snapshot() {
            self.save_metadata(&metadata);
        }
    }

    /// Drain the receipt queue front to back.
    ///
    /// The front is read, not popped, until its load finished so that a
    /// promotion never lands ahead of the room being loaded.
    fn load_receipts(&self) {
        let started = Instant::now();
        let mut loaded = 0usize;
        while let Some(room) = self.receipts.front() {
            if self.is_killed() {
                return;
            }
            self.load_room_receipts(&room);
            self.receipts.finish(&room);
            loaded += 1;
        }
        debug!(
            target: "chatvault::store",
            count = loaded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded read receipts"
        );

        if let Some(batch) = self.collect_receipts() {
            self.write_batch(batch);
        }
    }

    fn load_room_receipts(&self, room: &RoomId) {
        let path = self.paths.room_file(RoomCategory::Receipts, room);
        let loaded: Vec<ReceiptRecord> = match self.blobs.read(&path) {
            Ok(receipts) => receipts,
            Err(e) => {
                self.report("load receipts", &e);
                Vec::new()
            }
        };
        if self.cache.merge_loaded_receipts(room, loaded) {
            self.dirty.mark_room(crate::dirty::DirtyKind::Receipts, room);
        }
        self.listeners.read_receipts_loaded(room);
    }

    fn load_users(&self) {
        if self.is_killed() {
            return;
        }
        let started = Instant::now();
        let shards = match list_entries(&self.paths.users_dir()) {
            Ok(shards) => shards,
            Err(e) => {
                warn!(target: "chatvault::store", error = %e, "Failed to list user shards");
                Vec::new()
            }
        };

        let mut taken = 0usize;
        for shard in &shards {
            let path = self.paths.users_dir().join(shard);
            match self.blobs.read::<Vec<UserProfile>>(&path) {
                Ok(profiles) => {
                    taken += self
                        .cache
                        .with_users_mut(|table| users::merge_loaded(table, profiles));
                }
                Err(e) => self.report("load users", &e),
            }
        }
        self.users_loaded.store(true, Ordering::Release);
        info!(
            target: "chatvault::store",
            shards = shards.len(),
            count = taken,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded users"
        );

        if let Some(batch) = self.collect_users() {
            self.write_batch(batch);
        }
    }
}
