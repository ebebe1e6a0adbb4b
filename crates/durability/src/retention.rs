//! Message history retention
//!
//! A room's history is never persisted whole once it grows past
//! [`MAX_STORED_MESSAGES`]. The persisted suffix always starts at an event
//! that carries a backward pagination token (or at the very first event),
//! so after a restart the client can page back from exactly where the
//! stored history begins.
//!
//! # Algorithm
//!
//! With `N` events and `MAX` = `max_stored`:
//!
//! - `N <= MAX`: keep everything
//! - otherwise start at `N - MAX` and walk backward to the nearest event
//!   with a token (or index 0)
//! - if that still keeps more than `2 * MAX` events, restart the walk from
//!   `N - aggressive_tail`
//!
//! The cursor persisted with the suffix is the oldest retained event's own
//! token when it has one: the previously tracked cursor may point before
//! the cut.

use chatvault_core::Event;
use serde::{Deserialize, Serialize};

/// Events kept per room before trimming starts
pub const MAX_STORED_MESSAGES: usize = 50;

/// Rescan start (from the end) for pathological histories
pub const AGGRESSIVE_TAIL: usize = 10;

/// Retention policy errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetentionPolicyError {
    /// `max_stored` must be positive
    #[error("max_stored must be greater than zero")]
    ZeroMaxStored,

    /// Aggressive tail must be in `1..=max_stored`
    #[error("aggressive_tail {tail} must be between 1 and max_stored ({max})")]
    InvalidAggressiveTail {
        /// Configured tail
        tail: usize,
        /// Configured max
        max: usize,
    },
}

/// Bounds how much of a room's history is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Target number of persisted events
    pub max_stored: usize,
    /// Distance from the end where the aggressive rescan starts
    pub aggressive_tail: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            max_stored: MAX_STORED_MESSAGES,
            aggressive_tail: AGGRESSIVE_TAIL,
        }
    }
}

/// The part of a history that gets persisted
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedHistory<'a> {
    /// Index of the first retained event
    pub offset: usize,
    /// Retained suffix, in chronological order
    pub events: &'a [Event],
    /// Cursor to persist with the suffix
    pub cursor: Option<&'a str>,
    /// Whether the aggressive rescan ran
    pub aggressive: bool,
}

impl RetainedHistory<'_> {
    /// Whether anything was trimmed.
    pub fn is_trimmed(&self) -> bool {
        self.offset > 0
    }
}

impl RetentionPolicy {
    /// Validate the policy.
    pub fn validate(&self) -> Result<(), RetentionPolicyError> {
        if self.max_stored == 0 {
            return Err(RetentionPolicyError::ZeroMaxStored);
        }
        if self.aggressive_tail == 0 || self.aggressive_tail > self.max_stored {
            return Err(RetentionPolicyError::InvalidAggressiveTail {
                tail: self.aggressive_tail,
                max: self.max_stored,
            });
        }
        Ok(())
    }

    /// Select the persisted suffix of `events` and its cursor.
    pub fn apply<'a>(&self, events: &'a [Event], tracked_cursor: Option<&'a str>) -> RetainedHistory<'a> {
        let (offset, aggressive) = self.retained_offset(events);
        let retained = &events[offset..];
        let cursor = retained
            .first()
            .and_then(|event| event.token.as_deref())
            .or(tracked_cursor);

        RetainedHistory {
            offset,
            events: retained,
            cursor,
            aggressive,
        }
    }

    /// Index of the first persisted event, and whether the aggressive
    /// rescan was needed.
    pub fn retained_offset(&self, events: &[Event]) -> (usize, bool) {
        let n = events.len();
        if n <= self.max_stored {
            return (0, false);
        }

        let offset = scan_back_to_token(events, n - self.max_stored);
        if n - offset <= 2 * self.max_stored {
            return (offset, false);
        }

        let start = n.saturating_sub(self.aggressive_tail);
        (scan_back_to_token(events, start), true)
    }
}

fn scan_back_to_token(events: &[Event], mut offset: usize) -> usize {
    while offset > 0 && !events[offset].has_token() {
        offset -= 1;
    }
    offset
}
