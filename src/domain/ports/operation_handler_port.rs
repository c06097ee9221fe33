//! Port for replaying queued operations.

use async_trait::async_trait;

use crate::domain::entities::{OperationKind, PendingOperation};
use crate::domain::errors::ReplayError;

/// Performs the side effect behind one kind of queued operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Operation kind this handler accepts.
    fn kind(&self) -> OperationKind;

    /// Replays an operation. Errors leave it queued for the next flush.
    async fn replay(&self, operation: &PendingOperation) -> Result<(), ReplayError>;
}
