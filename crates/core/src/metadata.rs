//! Session metadata record
//!
//! One record per store. Its `format_version` and identity fields gate every
//! other file in the store: when they do not match what the running build
//! and credentials expect, the whole store is discarded.

use crate::error::{Error, Result};
use crate::types::{Credentials, RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// On-disk format version written by this build
pub const FORMAT_VERSION: u32 = 4;

/// A third-party identifier bound to the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdPartyIdentifier {
    /// `email` or `msisdn`
    pub medium: String,
    /// The address itself
    pub address: String,
}

/// Versioned session identity and account-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Format version of the store
    pub format_version: u32,
    /// Session owner
    pub user_id: UserId,
    /// Session access token
    pub access_token: String,
    /// Sync stream position to resume from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_cursor: Option<String>,
    /// Own display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Own avatar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Bound third-party identifiers
    #[serde(default)]
    pub third_party_ids: Vec<ThirdPartyIdentifier>,
    /// Ignored users
    #[serde(default)]
    pub ignored_user_ids: Vec<UserId>,
    /// Direct chats: peer user to rooms
    #[serde(default)]
    pub direct_chat_map: BTreeMap<UserId, Vec<RoomId>>,
}

impl StoreMetadata {
    /// Fresh metadata for a session.
    pub fn new(credentials: &Credentials) -> Self {
        StoreMetadata {
            format_version: FORMAT_VERSION,
            user_id: credentials.user_id.clone(),
            access_token: credentials.access_token.clone(),
            sync_cursor: None,
            display_name: None,
            avatar_url: None,
            third_party_ids: Vec::new(),
            ignored_user_ids: Vec::new(),
            direct_chat_map: BTreeMap::new(),
        }
    }

    /// Check this record against the running build and credentials.
    pub fn validate(&self, credentials: &Credentials) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(Error::VersionMismatch {
                expected: FORMAT_VERSION,
                actual: self.format_version,
            });
        }
        if self.user_id != credentials.user_id || self.access_token != credentials.access_token {
            return Err(Error::IdentityMismatch {
                user_id: credentials.user_id.to_string(),
            });
        }
        Ok(())
    }

    /// Reset everything but identity, as after a corrupted open.
    pub fn reset_session_data(&mut self) {
        self.sync_cursor = None;
    }

    /// Normalize fields read back from disk.
    pub fn normalize(&mut self) {
        if let Some(name) = self.display_name.as_mut() {
            let trimmed = name.trim();
            if trimmed.len() != name.len() {
                *name = trimmed.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("@me:hs", "secret")
    }

    #[test]
    fn test_new_metadata_validates() {
        let meta = StoreMetadata::new(&creds());
        assert_eq!(meta.format_version, FORMAT_VERSION);
        assert!(meta.validate(&creds()).is_ok());
    }

    #[test]
    fn test_version_mismatch() {
        let mut meta = StoreMetadata::new(&creds());
        meta.format_version = FORMAT_VERSION - 1;
        assert!(matches!(
            meta.validate(&creds()),
            Err(Error::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_identity_mismatch() {
        let meta = StoreMetadata::new(&creds());
        let other_token = Credentials::new("@me:hs", "rotated");
        let other_user = Credentials::new("@you:hs", "secret");
        assert!(matches!(
            meta.validate(&other_token),
            Err(Error::IdentityMismatch { .. })
        ));
        assert!(matches!(
            meta.validate(&other_user),
            Err(Error::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_normalize_trims_display_name() {
        let mut meta = StoreMetadata::new(&creds());
        meta.display_name = Some("Alice\n".into());
        meta.normalize();
        assert_eq!(meta.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_reset_session_data_keeps_identity() {
        let mut meta = StoreMetadata::new(&creds());
        meta.sync_cursor = Some("s72594".into());
        meta.reset_session_data();
        assert!(meta.sync_cursor.is_none());
        assert_eq!(meta.user_id, creds().user_id);
    }
}
