//! Room timeline events

use crate::types::{EventId, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// Delivery state of an event
///
/// Only events echoed back by the server are `Sent`. Every other state
/// describes a local echo that never reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SentState {
    /// Confirmed by the server
    #[default]
    Sent,
    /// Queued locally, not yet attempted
    Unsent,
    /// Request in flight
    Sending,
    /// Failed, retry scheduled
    WaitingRetry,
    /// Being encrypted before send
    Encrypting,
    /// Gave up sending
    Undeliverable,
}

impl SentState {
    /// True for local echoes whose send did not complete.
    ///
    /// Such events cannot survive a restart in a pending state: the send
    /// queue that owned them is gone.
    pub fn is_pending_local_echo(&self) -> bool {
        !matches!(self, SentState::Sent)
    }
}

/// Direction of a timeline fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Live events / forward pagination
    Forwards,
    /// Backward pagination into history
    Backwards,
}

/// A room timeline event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id within the room
    pub event_id: EventId,
    /// Owning room
    pub room_id: RoomId,
    /// Sender
    pub sender: UserId,
    /// Event type (`m.room.message`, ...)
    pub kind: String,
    /// Event content, kept opaque
    #[serde(default)]
    pub content: serde_json::Value,
    /// Server timestamp in milliseconds
    pub origin_server_ts: u64,
    /// Local delivery state
    #[serde(default)]
    pub sent_state: SentState,
    /// Backward pagination token that resumes history before this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Event {
    /// Create a sent event with empty content.
    pub fn new(
        event_id: impl Into<EventId>,
        room_id: impl Into<RoomId>,
        sender: impl Into<UserId>,
        kind: impl Into<String>,
        origin_server_ts: u64,
    ) -> Self {
        Event {
            event_id: event_id.into(),
            room_id: room_id.into(),
            sender: sender.into(),
            kind: kind.into(),
            content: serde_json::Value::Null,
            origin_server_ts,
            sent_state: SentState::Sent,
            token: None,
        }
    }

    /// Create a local echo for a message about to be sent, stamped now.
    pub fn local_echo(
        event_id: impl Into<EventId>,
        room_id: impl Into<RoomId>,
        sender: impl Into<UserId>,
        kind: impl Into<String>,
    ) -> Self {
        Event::new(event_id, room_id, sender, kind, crate::types::now_millis())
            .with_sent_state(SentState::Unsent)
    }

    /// Attach content.
    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    /// Attach a backward pagination token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the delivery state.
    pub fn with_sent_state(mut self, state: SentState) -> Self {
        self.sent_state = state;
        self
    }

    /// Whether this event carries a pagination token.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_local_echo() {
        assert!(!SentState::Sent.is_pending_local_echo());
        assert!(SentState::Sending.is_pending_local_echo());
        assert!(SentState::Unsent.is_pending_local_echo());
        assert!(SentState::WaitingRetry.is_pending_local_echo());
        assert!(SentState::Encrypting.is_pending_local_echo());
        assert!(SentState::Undeliverable.is_pending_local_echo());
    }

    #[test]
    fn test_event_builder() {
        let event = Event::new("$1", "!r:hs", "@a:hs", "m.room.message", 10)
            .with_token("t1")
            .with_content(serde_json::json!({"body": "hi"}));
        assert!(event.has_token());
        assert_eq!(event.content["body"], "hi");
        assert_eq!(event.sent_state, SentState::Sent);
    }

    #[test]
    fn test_local_echo_is_pending() {
        let echo = Event::local_echo("$local", "!r:hs", "@me:hs", "m.room.message");
        assert_eq!(echo.sent_state, SentState::Unsent);
        assert!(echo.origin_server_ts > 0);
    }

    #[test]
    fn test_event_roundtrip_msgpack() {
        let event = Event::new("$1", "!r:hs", "@a:hs", "m.room.message", 10)
            .with_content(serde_json::json!({"body": "hi", "n": 3}));
        let bytes = rmp_serde::to_vec_named(&event).unwrap();
        let back: Event = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, event);
    }
}
