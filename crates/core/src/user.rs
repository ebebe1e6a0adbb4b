//! User profiles and their storage shards

use crate::room::RoomMember;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Number of user shard files
pub const USER_SHARD_COUNT: u32 = 100;

/// Presence of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Presence {
    /// Online
    Online,
    /// Idle
    Unavailable,
    /// Offline or unknown
    #[default]
    Offline,
}

/// A user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Profile owner
    pub user_id: UserId,
    /// Global display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Global avatar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Last known presence
    #[serde(default)]
    pub presence: Presence,
    /// Timestamp (ms) of the latest presence update seen for this user
    #[serde(default)]
    pub latest_presence_ts: u64,
    /// Synthesized from room membership rather than fetched
    #[serde(default)]
    pub is_placeholder: bool,
}

impl UserProfile {
    /// Create an authoritative, empty profile.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        UserProfile {
            user_id: user_id.into(),
            display_name: None,
            avatar_url: None,
            presence: Presence::Offline,
            latest_presence_ts: 0,
            is_placeholder: false,
        }
    }

    /// Build a placeholder profile from a room member.
    pub fn placeholder_from_member(member: &RoomMember) -> Self {
        UserProfile {
            user_id: member.user_id.clone(),
            display_name: member.display_name.clone(),
            avatar_url: member.avatar_url.clone(),
            presence: Presence::Offline,
            latest_presence_ts: 0,
            is_placeholder: true,
        }
    }

    /// Set the presence timestamp.
    pub fn with_presence_ts(mut self, ts: u64) -> Self {
        self.latest_presence_ts = ts;
        self
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Shard this profile is stored in.
    pub fn storage_shard(&self) -> u32 {
        storage_shard(&self.user_id)
    }
}

/// Shard of a user id.
///
/// Pure function of the id bytes: xxh3 is seedless and platform independent,
/// so the shard computed at save time is the one found at load time.
pub fn storage_shard(user_id: &UserId) -> u32 {
    (xxh3_64(user_id.as_str().as_bytes()) % USER_SHARD_COUNT as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Membership;
    use proptest::prelude::*;

    #[test]
    fn test_placeholder_from_member() {
        let member = RoomMember::new("@a:hs", Membership::Join).with_display_name("Alice");
        let user = UserProfile::placeholder_from_member(&member);
        assert!(user.is_placeholder);
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert_eq!(user.latest_presence_ts, 0);
    }

    #[test]
    fn test_shard_is_stable_for_known_id() {
        let id = UserId::from("@alice:example.org");
        let first = storage_shard(&id);
        for _ in 0..10 {
            assert_eq!(storage_shard(&id), first);
        }
        assert!(first < USER_SHARD_COUNT);
    }

    proptest! {
        #[test]
        fn prop_shard_in_range_and_deterministic(id in "@[a-z0-9]{1,16}:[a-z]{1,8}") {
            let user = UserProfile::new(id.as_str());
            let shard = user.storage_shard();
            prop_assert!(shard < USER_SHARD_COUNT);
            prop_assert_eq!(shard, storage_shard(&UserId::from(id.as_str())));
        }
    }
}
