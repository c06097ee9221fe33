//! Session-wide storage mode and active image store.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, warn};

use crate::application::dto::StorageNotice;
use crate::domain::StorageMode;
use crate::domain::errors::StorageError;
use crate::domain::ports::ImageStorePort;
use crate::infrastructure::storage::MemoryImageStore;

struct ContextState {
    store: Arc<dyn ImageStorePort>,
    notice: Option<StorageNotice>,
}

/// Storage mode chosen once at startup and passed explicitly to services.
///
/// The only later transition is [`StorageContext::degrade`], on a
/// mid-session loss of durable storage.
pub struct StorageContext {
    state: RwLock<ContextState>,
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("mode", &self.mode())
            .field("notice", &self.notice())
            .finish()
    }
}

impl StorageContext {
    /// Creates a context around an initialized store.
    #[must_use]
    pub fn new(store: Arc<dyn ImageStorePort>, notice: Option<StorageNotice>) -> Self {
        Self {
            state: RwLock::new(ContextState { store, notice }),
        }
    }

    /// Creates a memory-only context enforcing `quota_bytes` (zero disables the check).
    #[must_use]
    pub fn memory(quota_bytes: u64, notice: Option<StorageNotice>) -> Self {
        Self::new(Arc::new(MemoryImageStore::with_quota(quota_bytes)), notice)
    }

    /// Current storage mode.
    #[must_use]
    pub fn mode(&self) -> StorageMode {
        self.state.read().store.mode()
    }

    /// Active image store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn ImageStorePort> {
        self.state.read().store.clone()
    }

    /// Notice to show the user, if storage is degraded.
    #[must_use]
    pub fn notice(&self) -> Option<StorageNotice> {
        self.state.read().notice
    }

    /// Records a notice without changing mode.
    pub fn set_notice(&self, notice: StorageNotice) {
        self.state.write().notice = Some(notice);
    }

    /// Switches to memory mode for the rest of the session.
    ///
    /// Returns false if the context was already memory-only.
    pub fn degrade(&self, cause: &StorageError) -> bool {
        let mut state = self.state.write();
        if !state.store.mode().is_durable() {
            warn!(error = %cause, "Storage fault while already in memory mode");
            return false;
        }

        error!(error = %cause, "Durable storage lost, continuing in memory-only mode");
        state.store = Arc::new(MemoryImageStore::with_quota(state.store.quota_bytes()));
        state.notice = Some(StorageNotice::Unavailable);
        true
    }

    /// Runs `op` against the active store.
    ///
    /// If durable storage turns out to be gone, the context degrades and `op`
    /// runs once more against the memory store.
    ///
    /// # Errors
    /// Returns the error of the last attempt.
    pub async fn with_store<T, F, Fut>(&self, op: F) -> Result<T, StorageError>
    where
        F: Fn(Arc<dyn ImageStorePort>) -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        match op(self.store()).await {
            Err(e @ StorageError::Unavailable(_)) if self.degrade(&e) => op(self.store()).await,
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::DiskImageStore;
    use tempfile::TempDir;

    #[test]
    fn test_degrade_happens_once() {
        let temp = TempDir::new().unwrap();
        let context = StorageContext::new(
            Arc::new(DiskImageStore::new(temp.path().to_path_buf(), 0)),
            None,
        );
        assert_eq!(context.mode(), StorageMode::Durable);

        let cause = StorageError::Unavailable("directory removed".to_string());
        assert!(context.degrade(&cause));
        assert_eq!(context.mode(), StorageMode::Memory);
        assert_eq!(context.notice(), Some(StorageNotice::Unavailable));

        assert!(!context.degrade(&cause));
    }

    #[test]
    fn test_degrade_keeps_quota() {
        let temp = TempDir::new().unwrap();
        let context = StorageContext::new(
            Arc::new(DiskImageStore::new(temp.path().to_path_buf(), 4096)),
            None,
        );

        context.degrade(&StorageError::Unavailable("gone".to_string()));

        assert_eq!(context.store().quota_bytes(), 4096);
    }

    #[tokio::test]
    async fn test_with_store_retries_in_memory_after_loss() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("images");
        let disk = Arc::new(DiskImageStore::new(root.clone(), 0));
        disk.initialize().await.unwrap();
        std::fs::remove_dir_all(&root).unwrap();
        let context = StorageContext::new(disk, None);

        let record = crate::domain::entities::ImageRecord::local(
            "cover",
            crate::domain::entities::ImagePayload::Inline(b"png".to_vec()),
            chrono::Utc::now(),
        );
        let stored = context
            .with_store(|store| {
                let record = record.clone();
                async move { store.put(record).await }
            })
            .await
            .unwrap();

        assert_eq!(context.mode(), StorageMode::Memory);
        assert!(context.store().get(&stored.id).await.unwrap().is_some());
    }
}
