//! Store directory structure
//!
//! A store is one directory per session identity:
//!
//! ```text
//! <base>/<user_id>/
//! ├── METADATA          # Session metadata (format version, identity)
//! ├── messages/<room>   # Retained message history
//! ├── tokens/<room>     # Pagination cursor
//! ├── state/<room>      # Room state snapshot
//! ├── summary/<room>    # Room summary
//! ├── receipts/<room>   # Read receipts
//! ├── account_data/<room>
//! └── users/<shard>     # User profiles grouped by shard
//! ```
//!
//! Room and user ids become file names through [`encode_entry_name`], which
//! escapes the path separator and dots.

use std::io;
use std::path::{Path, PathBuf};

use chatvault_core::{RoomId, UserId};

/// Metadata file name
pub const METADATA_FILE: &str = "METADATA";

/// Per-room record categories, one directory each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomCategory {
    /// Message history
    Messages,
    /// Pagination cursor
    Tokens,
    /// State snapshot
    State,
    /// Summary
    Summary,
    /// Read receipts
    Receipts,
    /// Account data
    AccountData,
}

impl RoomCategory {
    /// All categories.
    pub const ALL: [RoomCategory; 6] = [
        RoomCategory::Messages,
        RoomCategory::Tokens,
        RoomCategory::State,
        RoomCategory::Summary,
        RoomCategory::Receipts,
        RoomCategory::AccountData,
    ];

    /// Directory name of the category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            RoomCategory::Messages => "messages",
            RoomCategory::Tokens => "tokens",
            RoomCategory::State => "state",
            RoomCategory::Summary => "summary",
            RoomCategory::Receipts => "receipts",
            RoomCategory::AccountData => "account_data",
        }
    }
}

/// Escape an id for use as a file name.
///
/// `.` is escaped so no encoded name ends in the temp suffix.
pub fn encode_entry_name(id: &str) -> String {
    id.replace('%', "%25").replace('/', "%2F").replace('.', "%2E")
}

/// Reverse [`encode_entry_name`].
pub fn decode_entry_name(name: &str) -> String {
    name.replace("%2E", ".").replace("%2F", "/").replace("%25", "%")
}

/// Paths of one session's store
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// Session directory
    root: PathBuf,
}

impl StorePaths {
    /// Paths for `user_id` under the caller-provided base directory.
    pub fn for_user(base: impl AsRef<Path>, user_id: &UserId) -> Self {
        StorePaths {
            root: base.as_ref().join(encode_entry_name(user_id.as_str())),
        }
    }

    /// Paths rooted directly at `root`.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        StorePaths {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Session directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Metadata file.
    pub fn metadata(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Directory of a room category.
    pub fn category_dir(&self, category: RoomCategory) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// File of `room` in `category`.
    pub fn room_file(&self, category: RoomCategory, room: &RoomId) -> PathBuf {
        self.category_dir(category)
            .join(encode_entry_name(room.as_str()))
    }

    /// Directory of user shards.
    pub fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    /// File of a user shard.
    pub fn user_shard_file(&self, shard: u32) -> PathBuf {
        self.users_dir().join(shard.to_string())
    }

    /// Whether a store exists (metadata file or its temp sibling present).
    pub fn exists(&self) -> bool {
        self.metadata().exists() || crate::blob::temp_sibling(&self.metadata()).exists()
    }

    /// Create the full directory structure.
    pub fn create_directories(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        for category in RoomCategory::ALL {
            std::fs::create_dir_all(self.category_dir(category))?;
        }
        std::fs::create_dir_all(self.users_dir())?;
        Ok(())
    }

    /// Delete the session directory and everything in it.
    pub fn remove_all(&self) -> io::Result<()> {
        match std::fs::remove_dir_all(&self.root) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Recursive byte size of the session directory.
    pub fn disk_usage(&self) -> u64 {
        directory_size(&self.root)
    }
}

/// Recursive size in bytes of the files under `dir`; 0 if missing.
pub fn directory_size(dir: &Path) -> u64 {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| match entry.file_type() {
            Ok(ft) if ft.is_dir() => directory_size(&entry.path()),
            Ok(_) => entry.metadata().map(|m| m.len()).unwrap_or(0),
            Err(_) => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_for_user() {
        let paths = StorePaths::for_user("/tmp/base", &UserId::from("@me:hs"));

        assert_eq!(paths.root(), Path::new("/tmp/base/@me:hs"));
        assert_eq!(paths.metadata(), PathBuf::from("/tmp/base/@me:hs/METADATA"));
        assert_eq!(
            paths.room_file(RoomCategory::Messages, &RoomId::from("!r:hs")),
            PathBuf::from("/tmp/base/@me:hs/messages/!r:hs")
        );
        assert_eq!(
            paths.user_shard_file(42),
            PathBuf::from("/tmp/base/@me:hs/users/42")
        );
    }

    #[test]
    fn test_entry_name_escaping() {
        let id = "!odd/room%id:hs";
        let encoded = encode_entry_name(id);
        assert!(!encoded.contains('/'));
        assert_eq!(decode_entry_name(&encoded), id);
        assert_eq!(encode_entry_name("!plain:hs"), "!plain:hs");
    }

    #[test]
    fn test_encoded_name_never_ends_in_temp_suffix() {
        for id in ["!a:host.tmp", "!a:host.tmp.tmp", ".tmp", "!a%2E:host", "!a%252E:x.org"] {
            let encoded = encode_entry_name(id);
            assert!(!encoded.ends_with(crate::blob::TEMP_SUFFIX), "{}", encoded);
            assert!(!encoded.contains('.'));
            assert_eq!(decode_entry_name(&encoded), id);
        }
    }

    #[test]
    fn test_create_and_remove() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::from_root(dir.path().join("store"));

        assert!(!paths.exists());
        paths.create_directories().unwrap();
        for category in RoomCategory::ALL {
            assert!(paths.category_dir(category).is_dir());
        }
        assert!(paths.users_dir().is_dir());

        std::fs::write(paths.metadata(), b"meta").unwrap();
        assert!(paths.exists());

        paths.remove_all().unwrap();
        assert!(!paths.root().exists());
        // Removing twice is fine
        paths.remove_all().unwrap();
    }

    #[test]
    fn test_disk_usage_is_recursive() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::from_root(dir.path().join("store"));
        paths.create_directories().unwrap();

        std::fs::write(paths.metadata(), vec![0u8; 10]).unwrap();
        std::fs::write(
            paths.room_file(RoomCategory::State, &RoomId::from("!r:hs")),
            vec![0u8; 32],
        )
        .unwrap();
        std::fs::write(paths.user_shard_file(7), vec![0u8; 100]).unwrap();

        assert_eq!(paths.disk_usage(), 142);
    }

    #[test]
    fn test_disk_usage_missing_dir() {
        assert_eq!(directory_size(Path::new("/nonexistent/chatvault")), 0);
    }
}
