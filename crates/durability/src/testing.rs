//! Crash injection for the atomic blob protocol
//!
//! A [`CrashPoint`] installed on a [`BlobStore`](crate::BlobStore) makes the
//! next writes stop at that point and return
//! [`BlobError::SimulatedCrash`](crate::BlobError::SimulatedCrash) without
//! running any cleanup, leaving the directory exactly as a process killed at
//! that instant would.

/// Where a write is interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// After the previous target was renamed to the temp sibling, before
    /// the new target file is created
    AfterRenameToTemp,
    /// After roughly half of the new encoded bytes were written to the
    /// target
    MidWrite,
    /// After the new target is fully written and synced, before the temp
    /// sibling is deleted
    BeforeTempCleanup,
}
