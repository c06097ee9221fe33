//! Per-record and per-operation failures collected by batch jobs.

use thiserror::Error;

/// Failure replaying one queued operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ReplayError {
    #[error("handler failed: {0}")]
    Handler(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("no handler for operation type '{0}'")]
    UnknownKind(String),
}

/// Failure migrating one legacy record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key}: {reason}")]
pub struct MigrationRecordError {
    /// Legacy key or slide identifier of the failed record.
    pub key: String,
    /// What went wrong.
    pub reason: String,
}

impl MigrationRecordError {
    /// Creates a record error.
    #[must_use]
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
