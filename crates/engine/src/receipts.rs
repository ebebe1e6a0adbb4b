//! Background receipt loading
//!
//! Receipts are not needed to show a room, so they are loaded after the
//! store is ready, one room at a time, in the order their files were found.
//! The room at the front of the queue is the one being loaded. A synchronous
//! read of a room further back moves it to position 1, right behind the load
//! in progress.

use chatvault_core::{ReceiptMap, ReceiptRecord, RoomId};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Ordered queue of rooms whose receipts are still on disk only
#[derive(Debug, Default)]
pub struct ReceiptLoader {
    queue: Mutex<VecDeque<RoomId>>,
}

impl ReceiptLoader {
    /// Empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rooms to the back of the queue, skipping ones already queued.
    pub fn enqueue_all(&self, rooms: impl IntoIterator<Item = RoomId>) {
        let mut queue = self.queue.lock();
        for room in rooms {
            if !queue.contains(&room) {
                queue.push_back(room);
            }
        }
    }

    /// Move `room` to position 1 if it waits at position 2 or later.
    ///
    /// Returns whether the room was moved. The front is never touched.
    pub fn promote(&self, room: &RoomId) -> bool {
        let mut queue = self.queue.lock();
        match queue.iter().position(|r| r == room) {
            Some(pos) if pos >= 2 => {
                if let Some(id) = queue.remove(pos) {
                    queue.insert(1, id);
                }
                true
            }
            _ => false,
        }
    }

    /// Room to load next, left in place until [`finish`](Self::finish).
    pub fn front(&self) -> Option<RoomId> {
        self.queue.lock().front().cloned()
    }

    /// Remove `room` from the front once its load is done.
    pub fn finish(&self, room: &RoomId) {
        let mut queue = self.queue.lock();
        if queue.front() == Some(room) {
            queue.pop_front();
        }
    }

    /// Whether `room` still waits to be loaded.
    pub fn is_pending(&self, room: &RoomId) -> bool {
        self.queue.lock().contains(room)
    }

    /// Remove `room` wherever it is queued.
    pub fn remove(&self, room: &RoomId) {
        self.queue.lock().retain(|r| r != room);
    }

    /// Queue contents, front first.
    pub fn pending(&self) -> Vec<RoomId> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Number of queued rooms.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drop every queued room.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

/// Store `receipt` in `map` if it is new or supersedes the stored one.
pub fn apply_receipt(map: &mut ReceiptMap, receipt: ReceiptRecord) -> bool {
    match map.get(&receipt.user_id) {
        Some(current) if !receipt.supersedes(current) => false,
        _ => {
            map.insert(receipt.user_id.clone(), receipt);
            true
        }
    }
}

/// Merge a loaded map with the receipts that were in memory during the load.
///
/// The loaded map replaces the in-memory one, then each in-memory receipt is
/// reapplied. Returns the merged map and whether any in-memory receipt won.
pub fn merge_loaded(loaded: Vec<ReceiptRecord>, in_memory: Option<ReceiptMap>) -> (ReceiptMap, bool) {
    let mut merged: ReceiptMap = loaded
        .into_iter()
        .map(|r| (r.user_id.clone(), r))
        .collect();

    let mut changed = false;
    for receipt in in_memory.into_iter().flat_map(|m| m.into_values()) {
        changed |= apply_receipt(&mut merged, receipt);
    }
    (merged, changed)
}
