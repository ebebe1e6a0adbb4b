//! Session cache interface
//!
//! [`SessionStore`] is the mutation and query surface of a session cache.
//! [`MemoryCache`](crate::MemoryCache) implements it in memory only;
//! [`FileStore`](crate::FileStore) wraps a `MemoryCache`, forwards every call
//! to it and records what must reach disk.

use chatvault_core::{
    Direction, Event, EventId, ReceiptRecord, RoomAccountData, RoomId, RoomState, RoomSummary,
    ThirdPartyIdentifier, UserId, UserProfile,
};
use std::collections::BTreeMap;

/// Mutation and query API of a session cache
pub trait SessionStore: Send + Sync {
    // ----- Session -----

    /// Sync stream position to resume from.
    fn sync_cursor(&self) -> Option<String>;
    /// Set the sync stream position.
    fn set_sync_cursor(&self, cursor: Option<String>);
    /// Own display name.
    fn display_name(&self) -> Option<String>;
    /// Set the own display name.
    fn set_display_name(&self, name: Option<String>);
    /// Own avatar.
    fn avatar_url(&self) -> Option<String>;
    /// Set the own avatar.
    fn set_avatar_url(&self, url: Option<String>);
    /// Bound third-party identifiers.
    fn third_party_ids(&self) -> Vec<ThirdPartyIdentifier>;
    /// Set the bound third-party identifiers.
    fn set_third_party_ids(&self, ids: Vec<ThirdPartyIdentifier>);
    /// Ignored users.
    fn ignored_user_ids(&self) -> Vec<UserId>;
    /// Set the ignored users.
    fn set_ignored_user_ids(&self, users: Vec<UserId>);
    /// Direct chats by peer.
    fn direct_chat_map(&self) -> BTreeMap<UserId, Vec<RoomId>>;
    /// Set the direct chats.
    fn set_direct_chat_map(&self, map: BTreeMap<UserId, Vec<RoomId>>);

    // ----- Rooms -----

    /// Known rooms, sorted.
    fn room_ids(&self) -> Vec<RoomId>;
    /// Whether `room` is known.
    fn has_room(&self, room: &RoomId) -> bool;
    /// Live state of `room`.
    fn room_state(&self, room: &RoomId) -> Option<RoomState>;
    /// Replace the live state of `room`, creating the room if needed.
    fn store_room_state(&self, room: &RoomId, state: RoomState);
    /// Forget `room` and everything attached to it.
    fn delete_room(&self, room: &RoomId);

    // ----- Messages -----

    /// Store a chunk of timeline events.
    ///
    /// `Forwards` chunks are chronological and appended; `token` resumes
    /// history before their first event. `Backwards` chunks run newest to
    /// oldest and are prepended; `token` resumes history before their last
    /// event. Events already present are replaced in place.
    fn store_room_events(
        &self,
        room: &RoomId,
        events: Vec<Event>,
        token: Option<String>,
        direction: Direction,
    );
    /// Append one live event to its room.
    fn store_live_event(&self, event: Event);
    /// Remove one event. Returns whether it existed.
    fn delete_event(&self, room: &RoomId, event_id: &EventId) -> bool;
    /// Drop a room's history, keeping unsent local echoes if asked.
    fn delete_all_room_messages(&self, room: &RoomId, keep_unsent: bool);
    /// History of `room`, oldest first.
    fn room_events(&self, room: &RoomId) -> Vec<Event>;
    /// Backward pagination cursor of `room`.
    fn pagination_token(&self, room: &RoomId) -> Option<String>;

    // ----- Summaries -----

    /// Store a room summary.
    fn store_summary(&self, summary: RoomSummary);
    /// Store a summary that must reach disk without waiting for a commit.
    fn flush_summary(&self, summary: RoomSummary);
    /// Push every summary to disk without waiting for a commit.
    fn flush_summaries(&self);
    /// Summary of `room`.
    fn summary(&self, room: &RoomId) -> Option<RoomSummary>;
    /// All summaries, sorted by room.
    fn summaries(&self) -> Vec<RoomSummary>;

    // ----- Account data -----

    /// Store the account data of `room`.
    fn store_account_data(&self, room: &RoomId, data: RoomAccountData);
    /// Account data of `room`.
    fn account_data(&self, room: &RoomId) -> Option<RoomAccountData>;

    // ----- Receipts -----

    /// Store a receipt if it moves the reader forward. Returns whether it did.
    fn store_receipt(&self, room: &RoomId, receipt: ReceiptRecord) -> bool;
    /// Receipts of `room`, sorted by reader.
    fn receipts(&self, room: &RoomId) -> Vec<ReceiptRecord>;

    // ----- Users -----

    /// Insert or replace a user profile.
    fn store_user(&self, profile: UserProfile);
    /// Profile of `user`.
    fn user(&self, user: &UserId) -> Option<UserProfile>;
    /// Number of known users.
    fn user_count(&self) -> usize;
}
