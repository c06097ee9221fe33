//! Storage error types.

use thiserror::Error;

use crate::domain::entities::ImageId;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage error variants.
///
/// Cloneable so a single failure can be shared by deduplicated callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The environment cannot provide durable storage.
    #[error("failed to initialize storage: {reason}")]
    InitFailed {
        /// Underlying cause.
        reason: String,
    },

    /// Durable storage disappeared mid-session.
    #[error("durable storage unavailable: {0}")]
    Unavailable(String),

    /// The write does not fit in the remaining quota.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Persisted data does not match the expected schema.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The referenced image record does not exist.
    #[error("image {0} not found")]
    ImageNotFound(ImageId),

    /// Other I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// Encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Creates init failure error.
    #[must_use]
    pub fn init_failed(reason: impl Into<String>) -> Self {
        Self::InitFailed {
            reason: reason.into(),
        }
    }

    /// Maps an I/O error onto the storage taxonomy.
    #[must_use]
    pub fn from_io(context: &str, err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::StorageFull => Self::QuotaExceeded(format!("{context}: {err}")),
            ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
                Self::Unavailable(format!("{context}: {err}"))
            }
            _ => Self::Io(format!("{context}: {err}")),
        }
    }

    /// Returns whether the error changes the application's storage mode.
    #[must_use]
    pub const fn is_mode_changing(&self) -> bool {
        matches!(
            self,
            Self::InitFailed { .. } | Self::Unavailable(_) | Self::Corrupted(_)
        )
    }

    /// Returns whether the error is a quota failure.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_mapping() {
        let full = StorageError::from_io("write", &Error::from(ErrorKind::StorageFull));
        assert!(full.is_quota_exceeded());

        let gone = StorageError::from_io("read", &Error::from(ErrorKind::NotFound));
        assert!(matches!(gone, StorageError::Unavailable(_)));
        assert!(gone.is_mode_changing());

        let other = StorageError::from_io("read", &Error::from(ErrorKind::Interrupted));
        assert!(matches!(other, StorageError::Io(_)));
        assert!(!other.is_mode_changing());
    }
}
