//! Per-room records: state snapshot, summary, account data

use crate::event::Event;
use crate::types::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Membership of a user in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Membership {
    /// Invited, not yet joined
    Invite,
    /// Joined
    Join,
    /// Left or kicked
    Leave,
    /// Banned
    Ban,
}

/// A member entry of a room state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    /// Member's user id
    pub user_id: UserId,
    /// Membership
    pub membership: Membership,
    /// Room-specific display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Room-specific avatar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl RoomMember {
    /// Create a member without profile fields.
    pub fn new(user_id: impl Into<UserId>, membership: Membership) -> Self {
        RoomMember {
            user_id: user_id.into(),
            membership,
            display_name: None,
            avatar_url: None,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Live state of a room
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    /// Room name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Room topic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Members keyed by user id
    #[serde(default)]
    pub members: BTreeMap<UserId, RoomMember>,
    /// Other state events keyed by `type|state_key`, content kept opaque
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RoomState {
    /// Insert or replace a member.
    pub fn set_member(&mut self, member: RoomMember) {
        self.members.insert(member.user_id.clone(), member);
    }

    /// Iterate members.
    pub fn members(&self) -> impl Iterator<Item = &RoomMember> {
        self.members.values()
    }
}

/// Room list summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room the summary belongs to
    pub room_id: RoomId,
    /// Latest event received in the room
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_event: Option<Event>,
    /// Unread notification count
    #[serde(default)]
    pub unread_count: u32,
    /// Highlight count
    #[serde(default)]
    pub highlight_count: u32,
    /// Display name computed for the room list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl RoomSummary {
    /// Create an empty summary.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        RoomSummary {
            room_id: room_id.into(),
            latest_event: None,
            unread_count: 0,
            highlight_count: 0,
            display_name: None,
        }
    }
}

/// Per-room account data (tags and private events)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomAccountData {
    /// Tag name to order
    #[serde(default)]
    pub tags: BTreeMap<String, f64>,
    /// Other account data events by type
    #[serde(default)]
    pub events: BTreeMap<String, serde_json::Value>,
}
