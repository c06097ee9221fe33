//! Port for durable offline queue persistence.

use async_trait::async_trait;

use crate::domain::entities::PendingOperation;
use crate::domain::errors::StorageResult;

/// Durable backing for the offline operation queue.
#[async_trait]
pub trait QueueStoragePort: Send + Sync {
    /// Loads every persisted operation in enqueue order.
    async fn load(&self) -> StorageResult<Vec<PendingOperation>>;

    /// Replaces the persisted queue.
    async fn save(&self, operations: &[PendingOperation]) -> StorageResult<()>;
}
