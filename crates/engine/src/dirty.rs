//! Pending-write bookkeeping
//!
//! Mutators record which rooms and users changed since the last commit. At
//! commit each list is swapped for an empty one and the drained ids are
//! handed to the scheduler; ids marked while the flush runs land in the
//! fresh list and go out with the next commit.

use chatvault_core::{RoomId, UserId};
use parking_lot::Mutex;

/// Categories of room-scoped pending writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirtyKind {
    /// Message history and its cursor
    Messages,
    /// Room state
    State,
    /// Room summary
    Summary,
    /// Room account data
    AccountData,
    /// Read receipts
    Receipts,
}

/// An ordered list of ids without duplicates
#[derive(Debug)]
struct PendingList<T> {
    ids: Vec<T>,
}

impl<T: PartialEq> PendingList<T> {
    fn new() -> Self {
        PendingList { ids: Vec::new() }
    }

    fn mark(&mut self, id: T) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.ids)
    }
}

/// The six pending-id lists of a store
#[derive(Debug)]
pub struct DirtyTracker {
    messages: Mutex<PendingList<RoomId>>,
    state: Mutex<PendingList<RoomId>>,
    summaries: Mutex<PendingList<RoomId>>,
    account_data: Mutex<PendingList<RoomId>>,
    receipts: Mutex<PendingList<RoomId>>,
    users: Mutex<PendingList<UserId>>,
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        DirtyTracker {
            messages: Mutex::new(PendingList::new()),
            state: Mutex::new(PendingList::new()),
            summaries: Mutex::new(PendingList::new()),
            account_data: Mutex::new(PendingList::new()),
            receipts: Mutex::new(PendingList::new()),
            users: Mutex::new(PendingList::new()),
        }
    }

    fn list(&self, kind: DirtyKind) -> &Mutex<PendingList<RoomId>> {
        match kind {
            DirtyKind::Messages => &self.messages,
            DirtyKind::State => &self.state,
            DirtyKind::Summary => &self.summaries,
            DirtyKind::AccountData => &self.account_data,
            DirtyKind::Receipts => &self.receipts,
        }
    }

    /// Mark a room dirty. Returns false if it already was.
    pub fn mark_room(&self, kind: DirtyKind, room: &RoomId) -> bool {
        self.list(kind).lock().mark(room.clone())
    }

    /// Mark several rooms dirty, keeping their order.
    pub fn mark_rooms<'a>(&self, kind: DirtyKind, rooms: impl IntoIterator<Item = &'a RoomId>) {
        let mut list = self.list(kind).lock();
        for room in rooms {
            list.mark(room.clone());
        }
    }

    /// Mark a user dirty. Returns false if it already was.
    pub fn mark_user(&self, user: &UserId) -> bool {
        self.users.lock().mark(user.clone())
    }

    /// Mark several users dirty.
    pub fn mark_users(&self, users: impl IntoIterator<Item = UserId>) {
        let mut list = self.users.lock();
        for user in users {
            list.mark(user);
        }
    }

    /// Swap out the pending rooms of `kind`.
    pub fn take_rooms(&self, kind: DirtyKind) -> Vec<RoomId> {
        self.list(kind).lock().take()
    }

    /// Swap out the pending users.
    pub fn take_users(&self) -> Vec<UserId> {
        self.users.lock().take()
    }

    /// Whether `room` is pending in `kind`.
    pub fn is_room_dirty(&self, kind: DirtyKind, room: &RoomId) -> bool {
        self.list(kind).lock().ids.contains(room)
    }

    /// Number of pending users.
    pub fn pending_users(&self) -> usize {
        self.users.lock().ids.len()
    }

    /// Whether nothing is pending.
    pub fn is_clean(&self) -> bool {
        self.messages.lock().ids.is_empty()
            && self.state.lock().ids.is_empty()
            && self.summaries.lock().ids.is_empty()
            && self.account_data.lock().ids.is_empty()
            && self.receipts.lock().ids.is_empty()
            && self.users.lock().ids.is_empty()
    }

    /// Drop everything pending.
    pub fn clear(&self) {
        for kind in [
            DirtyKind::Messages,
            DirtyKind::State,
            DirtyKind::Summary,
            DirtyKind::AccountData,
            DirtyKind::Receipts,
        ] {
            self.list(kind).lock().take();
        }
        self.users.lock().take();
    }
}
