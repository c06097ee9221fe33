//! Storage lifecycle DTOs.

use serde::Serialize;

use crate::domain::entities::{OperationId, SlideId};
use crate::domain::errors::{MigrationRecordError, ReplayError};

/// User-facing notice about degraded storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageNotice {
    /// Restricted session detected; uploads will not persist.
    PrivateMode,
    /// The storage quota is exhausted.
    QuotaExceeded,
    /// Durable storage cannot be used at all.
    Unavailable,
    /// Stored data was corrupted and had to be discarded.
    DataLoss,
}

impl StorageNotice {
    /// Banner text shown to the user.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::PrivateMode => {
                "Private browsing detected: uploaded images are kept for this session only and publishing may be limited."
            }
            Self::QuotaExceeded => {
                "Storage is full: remove unused images or publish and clear local copies to free space."
            }
            Self::Unavailable => {
                "Local storage is unavailable: images are kept in memory and will be lost when you close the app."
            }
            Self::DataLoss => {
                "Local image storage was damaged and has been reset. Previously saved images were lost."
            }
        }
    }
}

impl std::fmt::Display for StorageNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of copying legacy records into the image store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Records and configs written to the store.
    pub migrated: usize,
    /// Entries already present in the store.
    pub skipped: usize,
    /// Per-record failures; never abort the batch.
    pub errors: Vec<MigrationRecordError>,
}

impl std::fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} migrated, {} skipped, {} failed",
            self.migrated,
            self.skipped,
            self.errors.len()
        )
    }
}

/// Result of renaming slide configs to the current identifier scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMigrationReport {
    /// Configs moved from an old key to a new key.
    pub renamed: Vec<(SlideId, SlideId)>,
    /// Old keys dropped because the new key already had a config.
    pub discarded: Vec<SlideId>,
}

impl IdentifierMigrationReport {
    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty() && self.discarded.is_empty()
    }
}

/// Result of one offline queue flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Operations replayed and removed.
    pub succeeded: usize,
    /// Operations removed for outliving the retention window.
    pub dropped_expired: usize,
    /// Operations removed because no handler knows their type.
    pub dropped_unknown: usize,
    /// Operations that failed and stay queued.
    pub failed: Vec<(OperationId, ReplayError)>,
    /// Operations left in the queue afterwards.
    pub remaining: usize,
}

impl std::fmt::Display for FlushReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} replayed, {} expired, {} unknown, {} failed, {} remaining",
            self.succeeded,
            self.dropped_expired,
            self.dropped_unknown,
            self.failed.len(),
            self.remaining
        )
    }
}
