//! User profile reconciliation and shard grouping
//!
//! Profiles reach the cache from two sources: placeholders synthesized from
//! room membership while the store opens, and authoritative records loaded
//! later from the user shards. [`persisted_wins`] decides which one stays.

use chatvault_core::{RoomMember, UserId, UserProfile};
use std::collections::{BTreeMap, HashMap};

/// Whether a persisted profile replaces the in-memory one.
///
/// It does when nothing is in memory, when the in-memory profile is only a
/// placeholder, or when the persisted presence timestamp is strictly newer.
pub fn persisted_wins(existing: Option<&UserProfile>, persisted: &UserProfile) -> bool {
    match existing {
        None => true,
        Some(current) => {
            current.is_placeholder || current.latest_presence_ts < persisted.latest_presence_ts
        }
    }
}

/// Merge loaded profiles into `table`. Returns how many were taken.
pub fn merge_loaded(table: &mut HashMap<UserId, UserProfile>, loaded: Vec<UserProfile>) -> usize {
    let mut taken = 0;
    for profile in loaded {
        if persisted_wins(table.get(&profile.user_id), &profile) {
            table.insert(profile.user_id.clone(), profile);
            taken += 1;
        }
    }
    taken
}

/// Record a room member as a placeholder profile.
///
/// Authoritative profiles are left alone; an existing placeholder is
/// refreshed from the member.
pub fn apply_member(table: &mut HashMap<UserId, UserProfile>, member: &RoomMember) -> bool {
    match table.get(&member.user_id) {
        Some(current) if !current.is_placeholder => false,
        _ => {
            table.insert(member.user_id.clone(), UserProfile::placeholder_from_member(member));
            true
        }
    }
}

/// Group the shards touched by `dirty` with every known profile they hold.
///
/// A shard file holds all profiles that hash to it, so rewriting one needs
/// the full group, not only the changed users. Ids unknown to `table` touch
/// no shard.
pub fn dirty_shards(
    dirty: &[UserId],
    table: &HashMap<UserId, UserProfile>,
) -> BTreeMap<u32, Vec<UserProfile>> {
    let mut groups: BTreeMap<u32, Vec<UserProfile>> = dirty
        .iter()
        .filter_map(|id| table.get(id))
        .map(|profile| (profile.storage_shard(), Vec::new()))
        .collect();

    for profile in table.values() {
        if let Some(group) = groups.get_mut(&profile.storage_shard()) {
            group.push(profile.clone());
        }
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    }
    groups
}
