//! Publish endpoint error types.

use thiserror::Error;

/// Errors talking to the remote publish endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum PublishError {
    #[error("publish endpoint not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(String),

    #[error("publish rejected: {message}")]
    Rejected { message: String },

    #[error("invalid response from publish endpoint: {0}")]
    InvalidResponse(String),
}

impl PublishError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates rejected error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
