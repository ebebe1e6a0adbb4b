//! Crash-atomic record files
//!
//! Each logical record lives in one file holding
//! `codec(msgpack_named(record))`. Updates use a two-phase rename so that at
//! any crash point one of `{target, target.tmp}` holds a complete prior
//! version:
//!
//! 1. Remove a stale `target.tmp`
//! 2. Rename `target` to `target.tmp` (last known good)
//! 3. Encode and write the new `target`, fsync
//! 4. Success: delete `target.tmp`. Failure: rename `target.tmp` back
//!
//! Readers prefer `target.tmp` when it exists: its presence means a write
//! was interrupted between steps 2 and 4, so `target` may be partial.
//!
//! This needs nothing from the filesystem beyond atomic rename.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::codec::{CodecError, StorageCodec, ZstdCodec};
use crate::config::{ConfigError, StoreConfig};
use crate::testing::CrashPoint;

/// Suffix of the temp sibling holding the last known good version
pub const TEMP_SUFFIX: &str = ".tmp";

/// Default cap on the decoded size of one record (64 MiB)
pub const DEFAULT_MAX_RECORD_BYTES: usize = 64 * 1024 * 1024;

/// Errors from a single blob operation
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// Neither the target nor its temp sibling exists
    #[error("No record at {path}")]
    NotFound {
        /// Target path
        path: PathBuf,
    },

    /// Filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Record could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Stored bytes could not be decompressed or deserialized
    #[error("Decode error on {path}: {detail}")]
    Decode {
        /// Path that was read
        path: PathBuf,
        /// Description
        detail: String,
    },

    /// Record larger than the store may hold in memory
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Write stopped at an injected crash point
    #[error("Simulated crash at {0:?}")]
    SimulatedCrash(CrashPoint),
}

impl BlobError {
    /// True when the failure should raise the exhaustion notification.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, BlobError::ResourceExhausted(_))
    }

    /// True when the record simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }

    fn io(path: &Path, source: io::Error) -> Self {
        BlobError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn from_codec(path: &Path, err: CodecError) -> Self {
        match err {
            CodecError::LimitExceeded { limit } => BlobError::ResourceExhausted(format!(
                "{} decodes to more than {} bytes",
                path.display(),
                limit
            )),
            other => BlobError::Decode {
                path: path.to_path_buf(),
                detail: other.to_string(),
            },
        }
    }
}

impl From<BlobError> for chatvault_core::Error {
    fn from(e: BlobError) -> Self {
        use chatvault_core::Error;
        match e {
            BlobError::NotFound { path } => Error::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                path.display().to_string(),
            )),
            BlobError::Io { source, .. } => Error::IoError(source),
            BlobError::Encode(detail) => Error::SerializationError(detail),
            BlobError::Decode { path, detail } => {
                Error::Corruption(format!("{}: {}", path.display(), detail))
            }
            BlobError::ResourceExhausted(detail) => Error::ResourceExhausted(detail),
            BlobError::SimulatedCrash(point) => {
                Error::InvalidOperation(format!("simulated crash at {:?}", point))
            }
        }
    }
}

/// Path of the temp sibling of `path`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Reads and writes single-record files with the two-phase rename protocol
pub struct BlobStore {
    codec: Box<dyn StorageCodec>,
    max_record_bytes: usize,
    crash_point: parking_lot::Mutex<Option<CrashPoint>>,
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("codec", &self.codec.codec_id())
            .field("max_record_bytes", &self.max_record_bytes)
            .finish()
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        BlobStore::new(Box::new(ZstdCodec::default()), DEFAULT_MAX_RECORD_BYTES)
    }
}

impl BlobStore {
    /// Create a blob store with an explicit codec and record size cap.
    pub fn new(codec: Box<dyn StorageCodec>, max_record_bytes: usize) -> Self {
        BlobStore {
            codec,
            max_record_bytes,
            crash_point: parking_lot::Mutex::new(None),
        }
    }

    /// Create a blob store from validated configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = crate::codec::get_codec(&config.codec_id, config.compression_level)
            .map_err(|e| ConfigError::InvalidCodec(e.to_string()))?;
        Ok(BlobStore::new(codec, config.max_record_bytes))
    }

    /// Codec id in use.
    pub fn codec_id(&self) -> &str {
        self.codec.codec_id()
    }

    /// Make subsequent writes stop at `point` (or never, with `None`).
    pub fn set_crash_point(&self, point: Option<CrashPoint>) {
        *self.crash_point.lock() = point;
    }

    fn crash_at(&self, point: CrashPoint) -> Result<(), BlobError> {
        if *self.crash_point.lock() == Some(point) {
            return Err(BlobError::SimulatedCrash(point));
        }
        Ok(())
    }

    /// Serialize and encode a record without touching disk.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, BlobError> {
        let raw = rmp_serde::to_vec_named(value).map_err(|e| BlobError::Encode(e.to_string()))?;
        if raw.len() > self.max_record_bytes {
            return Err(BlobError::ResourceExhausted(format!(
                "record of {} bytes exceeds limit of {} bytes",
                raw.len(),
                self.max_record_bytes
            )));
        }
        self.codec.encode(&raw).map_err(|e| BlobError::Encode(e.to_string()))
    }

    /// Decode and deserialize bytes produced by [`encode`](Self::encode).
    pub fn decode<T: DeserializeOwned>(&self, path: &Path, bytes: &[u8]) -> Result<T, BlobError> {
        let raw = self
            .codec
            .decode(bytes, self.max_record_bytes)
            .map_err(|e| BlobError::from_codec(path, e))?;
        rmp_serde::from_slice(&raw).map_err(|e| BlobError::Decode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Atomically replace the record at `path`.
    ///
    /// On failure the previous version (if any) is back in place.
    pub fn write<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), BlobError> {
        let temp = temp_sibling(path);

        if temp.exists() {
            fs::remove_file(&temp).map_err(|e| BlobError::io(&temp, e))?;
        }

        let had_previous = path.exists();
        if had_previous {
            fs::rename(path, &temp).map_err(|e| BlobError::io(path, e))?;
        }

        self.crash_at(CrashPoint::AfterRenameToTemp)?;

        match self.write_target(path, value) {
            Ok(()) => {}
            Err(BlobError::SimulatedCrash(point)) => return Err(BlobError::SimulatedCrash(point)),
            Err(err) => {
                self.restore_previous(path, &temp, had_previous);
                if err.is_resource_exhaustion() {
                    error!(path = %path.display(), error = %err, "Record write abandoned");
                } else {
                    warn!(path = %path.display(), error = %err, "Record write failed, previous version restored");
                }
                return Err(err);
            }
        }

        self.crash_at(CrashPoint::BeforeTempCleanup)?;

        if had_previous {
            if let Err(e) = fs::remove_file(&temp) {
                // The new target is complete; a leftover temp is only
                // preferred by readers until the next write removes it.
                warn!(path = %temp.display(), error = %e, "Failed to remove temp sibling");
            }
        }
        Ok(())
    }

    fn write_target<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), BlobError> {
        let bytes = self.encode(value)?;
        let mut file = File::create(path).map_err(|e| BlobError::io(path, e))?;

        if *self.crash_point.lock() == Some(CrashPoint::MidWrite) {
            file.write_all(&bytes[..bytes.len() / 2])
                .map_err(|e| BlobError::io(path, e))?;
            return Err(BlobError::SimulatedCrash(CrashPoint::MidWrite));
        }

        file.write_all(&bytes).map_err(|e| BlobError::io(path, e))?;
        file.sync_all().map_err(|e| BlobError::io(path, e))?;
        Ok(())
    }

    fn restore_previous(&self, path: &Path, temp: &Path, had_previous: bool) {
        let result = if had_previous {
            fs::rename(temp, path)
        } else {
            match fs::remove_file(path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };
        if let Err(e) = result {
            error!(path = %path.display(), error = %e, "Failed to restore previous record version");
        }
    }

    /// Read the record at `path`, rescuing from the temp sibling if present.
    pub fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T, BlobError> {
        let temp = temp_sibling(path);
        let source = if temp.exists() {
            warn!(path = %temp.display(), "Rescuing record from temp file");
            temp
        } else {
            path.to_path_buf()
        };

        let bytes = match fs::read(&source) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(BlobError::io(&source, e)),
        };

        let value = self.decode(&source, &bytes);
        if let Err(err) = &value {
            debug!(path = %source.display(), error = %err, "Record read failed");
        }
        value
    }

    /// Delete the record at `path` and any temp sibling.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, path: &Path) -> Result<bool, BlobError> {
        let mut removed = false;
        for candidate in [path.to_path_buf(), temp_sibling(path)] {
            match fs::remove_file(&candidate) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(BlobError::io(&candidate, e)),
            }
        }
        Ok(removed)
    }
}

/// Record names stored in `dir`.
///
/// Returns every committed name plus the name of any record whose only
/// trace is an orphaned temp sibling (a write crashed before the target was
/// recreated; the temp still holds the previous version). Temp-suffixed
/// names themselves are never returned. A missing directory lists as empty.
pub fn list_entries(dir: &Path) -> io::Result<Vec<String>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut committed = Vec::new();
    let mut orphans = Vec::new();

    for entry in read_dir {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        match name.strip_suffix(TEMP_SUFFIX) {
            Some(stem) => orphans.push(stem.to_string()),
            None => committed.push(name),
        }
    }

    for stem in orphans {
        if !committed.contains(&stem) {
            warn!(dir = %dir.display(), name = %stem, "Record only survives as a temp file");
            committed.push(stem);
        }
    }

    committed.sort();
    Ok(committed)
}
