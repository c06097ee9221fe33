//! Persistence for the offline operation queue.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::entities::PendingOperation;
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::ports::QueueStoragePort;

/// Queue persisted as a JSON array file.
pub struct JsonQueueStore {
    path: PathBuf,
}

impl JsonQueueStore {
    /// Creates a store writing to `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl QueueStoragePort for JsonQueueStore {
    async fn load(&self) -> StorageResult<Vec<PendingOperation>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from_io("failed to read queue", &e)),
        };

        match serde_json::from_str(&content) {
            Ok(operations) => Ok(operations),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to parse queue file. Resetting queue.");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, operations: &[PendingOperation]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io("failed to create queue dir", &e))?;
        }

        let content = serde_json::to_vec(operations)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| StorageError::from_io("failed to write queue", &e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::from_io("failed to replace queue", &e))?;

        debug!(count = operations.len(), "Persisted offline queue");
        Ok(())
    }
}

/// Queue storage that lives only as long as the process.
#[derive(Default)]
pub struct MemoryQueueStore {
    operations: Mutex<Vec<PendingOperation>>,
}

impl MemoryQueueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStoragePort for MemoryQueueStore {
    async fn load(&self) -> StorageResult<Vec<PendingOperation>> {
        Ok(self.operations.lock().clone())
    }

    async fn save(&self, operations: &[PendingOperation]) -> StorageResult<()> {
        *self.operations.lock() = operations.to_vec();
        Ok(())
    }
}
