//! Session metadata holder
//!
//! Keeps the store's [`StoreMetadata`] and a dirty flag. Setters mark the
//! record dirty; [`MetadataManager::take_snapshot`] clears the flag and hands
//! out a deep copy for the worker to persist, so later setters never race
//! with the write.

use chatvault_core::{Credentials, RoomId, StoreMetadata, ThirdPartyIdentifier, UserId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug)]
struct MetadataSlot {
    record: Option<StoreMetadata>,
    dirty: bool,
}

/// Versioned session identity record with dirty-flag gated flush
#[derive(Debug)]
pub struct MetadataManager {
    slot: Mutex<MetadataSlot>,
}

impl MetadataManager {
    /// Holder for a record loaded from disk (or `None`).
    pub fn new(record: Option<StoreMetadata>) -> Self {
        MetadataManager {
            slot: Mutex::new(MetadataSlot {
                record,
                dirty: false,
            }),
        }
    }

    /// Install fresh metadata for `credentials` and mark it dirty.
    pub fn install_fresh(&self, credentials: &Credentials) {
        let mut slot = self.slot.lock();
        slot.record = Some(StoreMetadata::new(credentials));
        slot.dirty = true;
    }

    /// Replace the record, marking it dirty.
    pub fn replace(&self, record: StoreMetadata) {
        let mut slot = self.slot.lock();
        slot.record = Some(record);
        slot.dirty = true;
    }

    /// Drop the record; nothing is flushed until one is installed again.
    pub fn discard(&self) {
        let mut slot = self.slot.lock();
        slot.record = None;
        slot.dirty = false;
    }

    /// Whether a record is held.
    pub fn is_present(&self) -> bool {
        self.slot.lock().record.is_some()
    }

    /// Whether the record changed since the last snapshot.
    pub fn is_dirty(&self) -> bool {
        self.slot.lock().dirty
    }

    /// Copy of the current record.
    pub fn current(&self) -> Option<StoreMetadata> {
        self.slot.lock().record.clone()
    }

    /// Apply `f` to the record and mark it dirty.
    ///
    /// No-op without a record.
    pub fn update(&self, f: impl FnOnce(&mut StoreMetadata)) {
        let mut slot = self.slot.lock();
        if let Some(record) = slot.record.as_mut() {
            f(record);
            slot.dirty = true;
        }
    }

    /// Clear the dirty flag and return a deep copy to persist.
    ///
    /// `None` when clean or when no record is held.
    pub fn take_snapshot(&self) -> Option<StoreMetadata> {
        let mut slot = self.slot.lock();
        if !slot.dirty {
            return None;
        }
        let snapshot = slot.record.clone()?;
        slot.dirty = false;
        Some(snapshot)
    }

    /// Mark dirty again after a snapshot could not be persisted.
    pub fn mark_dirty(&self) {
        let mut slot = self.slot.lock();
        if slot.record.is_some() {
            slot.dirty = true;
        }
    }

    /// Set the sync cursor.
    pub fn set_sync_cursor(&self, cursor: Option<String>) {
        self.update(|m| m.sync_cursor = cursor);
    }

    /// Set the own display name.
    pub fn set_display_name(&self, name: Option<String>) {
        self.update(|m| m.display_name = name);
    }

    /// Set the own avatar.
    pub fn set_avatar_url(&self, url: Option<String>) {
        self.update(|m| m.avatar_url = url);
    }

    /// Set the bound third-party identifiers.
    pub fn set_third_party_ids(&self, ids: Vec<ThirdPartyIdentifier>) {
        self.update(|m| m.third_party_ids = ids);
    }

    /// Set the ignored users.
    pub fn set_ignored_user_ids(&self, users: Vec<UserId>) {
        self.update(|m| m.ignored_user_ids = users);
    }

    /// Set the direct chat map.
    pub fn set_direct_chat_map(&self, map: BTreeMap<UserId, Vec<RoomId>>) {
        self.update(|m| m.direct_chat_map = map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> MetadataManager {
        let manager = MetadataManager::new(None);
        manager.install_fresh(&Credentials::new("@me:hs", "token"));
        manager
    }

    #[test]
    fn test_fresh_record_is_dirty_once() {
        let manager = manager();
        assert!(manager.is_dirty());
        let snapshot = manager.take_snapshot().unwrap();
        assert_eq!(snapshot.user_id, UserId::from("@me:hs"));
        assert!(manager.take_snapshot().is_none());
    }

    #[test]
    fn test_setter_marks_dirty() {
        let manager = manager();
        manager.take_snapshot();

        manager.set_sync_cursor(Some("s42".into()));
        assert!(manager.is_dirty());
        assert_eq!(
            manager.take_snapshot().unwrap().sync_cursor.as_deref(),
            Some("s42")
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let manager = manager();
        let snapshot = manager.take_snapshot().unwrap();
        manager.set_display_name(Some("Me".into()));
        assert_eq!(snapshot.display_name, None);
        assert_eq!(manager.current().unwrap().display_name.as_deref(), Some("Me"));
    }

    #[test]
    fn test_no_record_never_flushes() {
        let manager = MetadataManager::new(None);
        manager.set_sync_cursor(Some("s1".into()));
        manager.mark_dirty();
        assert!(!manager.is_dirty());
        assert!(manager.take_snapshot().is_none());
    }

    #[test]
    fn test_discard() {
        let manager = manager();
        manager.discard();
        assert!(!manager.is_present());
        assert!(manager.take_snapshot().is_none());
    }
}
