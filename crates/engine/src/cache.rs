//! In-memory session cache
//!
//! Every table sits behind its own lock so that a commit snapshotting one
//! table never stalls mutators of another.

use chatvault_core::{
    Direction, Event, EventId, ReceiptMap, ReceiptRecord, RoomAccountData, RoomId, RoomMember,
    RoomState, RoomSummary, ThirdPartyIdentifier, UserId, UserProfile,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::receipts::{apply_receipt, merge_loaded};
use crate::session::SessionStore;

/// Account-level session fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    /// Sync stream position
    pub sync_cursor: Option<String>,
    /// Own display name
    pub display_name: Option<String>,
    /// Own avatar
    pub avatar_url: Option<String>,
    /// Bound third-party identifiers
    pub third_party_ids: Vec<ThirdPartyIdentifier>,
    /// Ignored users
    pub ignored_user_ids: Vec<UserId>,
    /// Direct chats by peer
    pub direct_chat_map: BTreeMap<UserId, Vec<RoomId>>,
}

/// Ordered, id-unique event list of one room
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomHistory {
    events: Vec<Event>,
}

impl RoomHistory {
    /// History from chronological events; later duplicates replace earlier ones.
    pub fn from_events(events: Vec<Event>) -> Self {
        let mut history = RoomHistory::default();
        for event in events {
            history.insert(event, Direction::Forwards);
        }
        history
    }

    /// Insert at the end (`Forwards`) or the start (`Backwards`).
    ///
    /// An event whose id is already present replaces it in place.
    pub fn insert(&mut self, event: Event, direction: Direction) {
        if let Some(existing) = self.events.iter_mut().find(|e| e.event_id == event.event_id) {
            *existing = event;
            return;
        }
        match direction {
            Direction::Forwards => self.events.push(event),
            Direction::Backwards => self.events.insert(0, event),
        }
    }

    /// Remove an event by id.
    pub fn remove(&mut self, event_id: &EventId) -> bool {
        let before = self.events.len();
        self.events.retain(|e| &e.event_id != event_id);
        self.events.len() != before
    }

    /// Events, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Mutable access to one event.
    pub fn get_mut(&mut self, event_id: &EventId) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| &e.event_id == event_id)
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// In-memory implementation of [`SessionStore`]
#[derive(Debug, Default)]
pub struct MemoryCache {
    session: RwLock<SessionInfo>,
    rooms: RwLock<HashMap<RoomId, RoomState>>,
    account_data: RwLock<HashMap<RoomId, RoomAccountData>>,
    histories: RwLock<HashMap<RoomId, RoomHistory>>,
    tokens: RwLock<HashMap<RoomId, String>>,
    summaries: RwLock<HashMap<RoomId, RoomSummary>>,
    receipts: RwLock<HashMap<RoomId, ReceiptMap>>,
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl MemoryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every table.
    pub fn clear(&self) {
        *self.session.write() = SessionInfo::default();
        self.rooms.write().clear();
        self.account_data.write().clear();
        self.histories.write().clear();
        self.tokens.write().clear();
        self.summaries.write().clear();
        self.receipts.write().clear();
        self.users.write().clear();
    }

    /// Copy of the session fields.
    pub fn session_info(&self) -> SessionInfo {
        self.session.read().clone()
    }

    /// Replace the session fields.
    pub fn set_session_info(&self, info: SessionInfo) {
        *self.session.write() = info;
    }

    /// Register `room` with an empty state unless it is known.
    pub fn ensure_room(&self, room: &RoomId) {
        self.rooms.write().entry(room.clone()).or_default();
    }

    /// History and cursor of `room`, copied under their locks.
    ///
    /// `None` when the room has no history.
    pub fn history_snapshot(&self, room: &RoomId) -> Option<(Vec<Event>, Option<String>)> {
        let events = self.histories.read().get(room)?.events().to_vec();
        let token = self.tokens.read().get(room).cloned();
        Some((events, token))
    }

    /// Number of events held for `room`.
    pub fn history_len(&self, room: &RoomId) -> usize {
        self.histories.read().get(room).map_or(0, RoomHistory::len)
    }

    /// Replace the history of `room`.
    pub fn set_history(&self, room: &RoomId, events: Vec<Event>) {
        self.histories
            .write()
            .insert(room.clone(), RoomHistory::from_events(events));
    }

    /// Set or clear the cursor of `room`.
    pub fn set_pagination_token(&self, room: &RoomId, token: Option<String>) {
        let mut tokens = self.tokens.write();
        match token {
            Some(token) => tokens.insert(room.clone(), token),
            None => tokens.remove(room),
        };
    }

    /// Rooms that have a summary, sorted.
    pub fn summary_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.summaries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Receipts of `room` as a map, if any were stored.
    pub fn receipt_map(&self, room: &RoomId) -> Option<ReceiptMap> {
        self.receipts.read().get(room).cloned()
    }

    /// Install receipts loaded from disk for `room`.
    ///
    /// Receipts stored while the load ran are reapplied on top. Returns
    /// whether any of them won, meaning the file is now stale.
    pub fn merge_loaded_receipts(&self, room: &RoomId, loaded: Vec<ReceiptRecord>) -> bool {
        let mut receipts = self.receipts.write();
        let (merged, changed) = merge_loaded(loaded, receipts.remove(room));
        receipts.insert(room.clone(), merged);
        changed
    }

    /// Run `f` with the user table locked for writing.
    pub fn with_users_mut<R>(&self, f: impl FnOnce(&mut HashMap<UserId, UserProfile>) -> R) -> R {
        f(&mut self.users.write())
    }

    /// Run `f` with the user table locked for reading.
    pub fn with_users<R>(&self, f: impl FnOnce(&HashMap<UserId, UserProfile>) -> R) -> R {
        f(&self.users.read())
    }

    /// Members of every room, copied out.
    pub fn all_members(&self) -> Vec<RoomMember> {
        self.rooms
            .read()
            .values()
            .flat_map(|state| state.members().cloned())
            .collect()
    }
}

impl SessionStore for MemoryCache {
    fn sync_cursor(&self) -> Option<String> {
        self.session.read().sync_cursor.clone()
    }

    fn set_sync_cursor(&self, cursor: Option<String>) {
        self.session.write().sync_cursor = cursor;
    }

    fn display_name(&self) -> Option<String> {
        self.session.read().display_name.clone()
    }

    fn set_display_name(&self, name: Option<String>) {
        self.session.write().display_name = name;
    }

    fn avatar_url(&self) -> Option<String> {
        self.session.read().avatar_url.clone()
    }

    fn set_avatar_url(&self, url: Option<String>) {
        self.session.write().avatar_url = url;
    }

    fn third_party_ids(&self) -> Vec<ThirdPartyIdentifier> {
        self.session.read().third_party_ids.clone()
    }

    fn set_third_party_ids(&self, ids: Vec<ThirdPartyIdentifier>) {
        self.session.write().third_party_ids = ids;
    }

    fn ignored_user_ids(&self) -> Vec<UserId> {
        self.session.read().ignored_user_ids.clone()
    }

    fn set_ignored_user_ids(&self, users: Vec<UserId>) {
        self.session.write().ignored_user_ids = users;
    }

    fn direct_chat_map(&self) -> BTreeMap<UserId, Vec<RoomId>> {
        self.session.read().direct_chat_map.clone()
    }

    fn set_direct_chat_map(&self, map: BTreeMap<UserId, Vec<RoomId>>) {
        self.session.write().direct_chat_map = map;
    }

    fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn has_room(&self, room: &RoomId) -> bool {
        self.rooms.read().contains_key(room)
    }

    fn room_state(&self, room: &RoomId) -> Option<RoomState> {
        self.rooms.read().get(room).cloned()
    }

    fn store_room_state(&self, room: &RoomId, state: RoomState) {
        self.rooms.write().insert(room.clone(), state);
    }

    fn delete_room(&self, room: &RoomId) {
        self.rooms.write().remove(room);
        self.account_data.write().remove(room);
        self.histories.write().remove(room);
        self.tokens.write().remove(room);
        self.summaries.write().remove(room);
        self.receipts.write().remove(room);
    }

    fn store_room_events(
        &self,
        room: &RoomId,
        events: Vec<Event>,
        token: Option<String>,
        direction: Direction,
    ) {
        self.ensure_room(room);
        {
            let mut histories = self.histories.write();
            let history = histories.entry(room.clone()).or_default();

            // The token resumes history before the oldest event of the chunk.
            let oldest = match direction {
                Direction::Forwards => events.first(),
                Direction::Backwards => events.last(),
            }
            .map(|e| e.event_id.clone());

            for event in events {
                history.insert(event, direction);
            }

            if let (Some(token), Some(oldest)) = (token.as_ref(), oldest) {
                if let Some(event) = history.get_mut(&oldest) {
                    if event.token.is_none() {
                        event.token = Some(token.clone());
                    }
                }
            }
        }

        if let Some(token) = token {
            let mut tokens = self.tokens.write();
            match direction {
                Direction::Backwards => {
                    tokens.insert(room.clone(), token);
                }
                Direction::Forwards => {
                    tokens.entry(room.clone()).or_insert(token);
                }
            }
        }
    }

    fn store_live_event(&self, event: Event) {
        let room = event.room_id.clone();
        self.ensure_room(&room);
        self.histories
            .write()
            .entry(room)
            .or_default()
            .insert(event, Direction::Forwards);
    }

    fn delete_event(&self, room: &RoomId, event_id: &EventId) -> bool {
        self.histories
            .write()
            .get_mut(room)
            .is_some_and(|history| history.remove(event_id))
    }

    fn delete_all_room_messages(&self, room: &RoomId, keep_unsent: bool) {
        {
            let mut histories = self.histories.write();
            if keep_unsent {
                if let Some(history) = histories.get_mut(room) {
                    history.events.retain(|e| e.sent_state.is_pending_local_echo());
                }
            } else {
                histories.remove(room);
            }
        }
        if !keep_unsent {
            self.tokens.write().remove(room);
        }
        self.summaries.write().remove(room);
    }

    fn room_events(&self, room: &RoomId) -> Vec<Event> {
        self.histories
            .read()
            .get(room)
            .map(|h| h.events().to_vec())
            .unwrap_or_default()
    }

    fn pagination_token(&self, room: &RoomId) -> Option<String> {
        self.tokens.read().get(room).cloned()
    }

    fn store_summary(&self, summary: RoomSummary) {
        self.summaries
            .write()
            .insert(summary.room_id.clone(), summary);
    }

    fn flush_summary(&self, summary: RoomSummary) {
        self.store_summary(summary);
    }

    fn flush_summaries(&self) {}

    fn summary(&self, room: &RoomId) -> Option<RoomSummary> {
        self.summaries.read().get(room).cloned()
    }

    fn summaries(&self) -> Vec<RoomSummary> {
        let mut all: Vec<RoomSummary> = self.summaries.read().values().cloned().collect();
        all.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        all
    }

    fn store_account_data(&self, room: &RoomId, data: RoomAccountData) {
        self.account_data.write().insert(room.clone(), data);
    }

    fn account_data(&self, room: &RoomId) -> Option<RoomAccountData> {
        self.account_data.read().get(room).cloned()
    }

    fn store_receipt(&self, room: &RoomId, receipt: ReceiptRecord) -> bool {
        let mut receipts = self.receipts.write();
        apply_receipt(receipts.entry(room.clone()).or_default(), receipt)
    }

    fn receipts(&self, room: &RoomId) -> Vec<ReceiptRecord> {
        let mut list: Vec<ReceiptRecord> = self
            .receipts
            .read()
            .get(room)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        list
    }

    fn store_user(&self, profile: UserProfile) {
        self.users.write().insert(profile.user_id.clone(), profile);
    }

    fn user(&self, user: &UserId) -> Option<UserProfile> {
        self.users.read().get(user).cloned()
    }

    fn user_count(&self) -> usize {
        self.users.read().len()
    }
}
