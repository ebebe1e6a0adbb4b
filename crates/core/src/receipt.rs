//! Read receipts

use crate::types::{EventId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A read receipt: `user_id` has read up to `event_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Reader
    pub user_id: UserId,
    /// Last read event
    pub event_id: EventId,
    /// Receipt timestamp in milliseconds
    pub origin_server_ts: u64,
}

impl ReceiptRecord {
    /// Create a receipt.
    pub fn new(user_id: impl Into<UserId>, event_id: impl Into<EventId>, ts: u64) -> Self {
        ReceiptRecord {
            user_id: user_id.into(),
            event_id: event_id.into(),
            origin_server_ts: ts,
        }
    }

    /// Whether this receipt should replace `current`.
    ///
    /// A receipt only moves forward in time; an identical receipt is not a
    /// change.
    pub fn supersedes(&self, current: &ReceiptRecord) -> bool {
        self.origin_server_ts > current.origin_server_ts
            || (self.origin_server_ts == current.origin_server_ts
                && self.event_id != current.event_id)
    }
}

/// Receipts of one room keyed by reader
pub type ReceiptMap = HashMap<UserId, ReceiptRecord>;
