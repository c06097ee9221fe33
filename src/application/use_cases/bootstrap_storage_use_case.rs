//! Storage startup: probe, open, recover and migrate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::application::dto::{IdentifierMigrationReport, MigrationReport, StorageNotice};
use crate::application::services::StorageContext;
use crate::domain::entities::IdentifierMap;
use crate::domain::errors::StorageError;
use crate::domain::ports::{ImageStorePort, KeyValueStore};
use crate::infrastructure::storage::{
    DiskImageStore, PROBE_TIMEOUT, StorageAvailability, StorageAvailabilityDetector,
    UnavailableReason, detect_private_mode,
};

use super::{BackendMigrationUseCase, IdentifierMigrationUseCase};

/// Where and how to open durable storage.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Store root directory.
    pub root: PathBuf,
    /// Quota in bytes; zero means unknown.
    pub quota_bytes: u64,
    /// Skip durable storage entirely.
    pub memory_only: bool,
    /// Upper bound for the availability probe.
    pub probe_timeout: Duration,
}

impl BootstrapOptions {
    /// Options for a durable store at `root`.
    #[must_use]
    pub const fn new(root: PathBuf, quota_bytes: u64) -> Self {
        Self {
            root,
            quota_bytes,
            memory_only: false,
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}

/// Everything startup decided.
#[derive(Debug)]
pub struct BootstrapOutcome {
    /// Active storage for the session.
    pub context: Arc<StorageContext>,
    /// Probe result, absent when durable storage was not attempted.
    pub availability: Option<StorageAvailability>,
    /// Legacy import result, absent if the import could not start.
    pub migration: Option<MigrationReport>,
    /// Identifier rename result, absent if it failed.
    pub identifiers: Option<IdentifierMigrationReport>,
}

/// Creates the session's [`StorageContext`].
///
/// Never fails: anything that prevents durable storage falls back to memory
/// mode with a user-facing notice.
pub struct BootstrapStorageUseCase {
    options: BootstrapOptions,
    legacy: Arc<dyn KeyValueStore>,
    renames: Arc<IdentifierMap>,
}

impl BootstrapStorageUseCase {
    /// Creates the use case.
    #[must_use]
    pub const fn new(
        options: BootstrapOptions,
        legacy: Arc<dyn KeyValueStore>,
        renames: Arc<IdentifierMap>,
    ) -> Self {
        Self {
            options,
            legacy,
            renames,
        }
    }

    /// Opens storage and runs both migrations.
    pub async fn execute(&self) -> BootstrapOutcome {
        let (context, availability) = self.open_context().await;

        if detect_private_mode(self.legacy.as_ref()) && context.notice().is_none() {
            context.set_notice(StorageNotice::PrivateMode);
        }

        let store = context.store();
        let migration = match BackendMigrationUseCase::new(
            Arc::clone(&self.legacy),
            Arc::clone(&store),
        )
        .execute()
        .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Legacy migration could not run");
                None
            }
        };

        let identifiers = match IdentifierMigrationUseCase::new(store, Arc::clone(&self.renames))
            .execute()
            .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Identifier migration failed");
                None
            }
        };

        info!(
            mode = %context.mode(),
            notice = ?context.notice(),
            "Storage ready"
        );

        BootstrapOutcome {
            context: Arc::new(context),
            availability,
            migration,
            identifiers,
        }
    }

    fn memory_context(&self, notice: Option<StorageNotice>) -> StorageContext {
        StorageContext::memory(self.options.quota_bytes, notice)
    }

    async fn open_context(&self) -> (StorageContext, Option<StorageAvailability>) {
        if self.options.memory_only {
            info!("Durable storage disabled by configuration");
            return (self.memory_context(None), None);
        }

        let availability = StorageAvailabilityDetector::new(self.options.root.clone())
            .with_timeout(self.options.probe_timeout)
            .probe()
            .await;

        if !availability.available {
            let notice = match availability.reason {
                Some(UnavailableReason::QuotaExceeded) => StorageNotice::QuotaExceeded,
                _ => StorageNotice::Unavailable,
            };
            return (self.memory_context(Some(notice)), Some(availability));
        }

        let store = Arc::new(DiskImageStore::new(
            self.options.root.clone(),
            self.options.quota_bytes,
        ));

        let initialized = store.initialize().await;
        let context = match initialized {
            Ok(()) => StorageContext::new(store, None),
            Err(StorageError::Corrupted(reason)) => {
                error!(reason = %reason, "Image store corrupted, resetting");
                match store.reset().await {
                    Ok(()) => StorageContext::new(store, Some(StorageNotice::DataLoss)),
                    Err(e) => {
                        error!(error = %e, "Image store reset failed, using memory");
                        self.memory_context(Some(StorageNotice::Unavailable))
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Image store failed to open, using memory");
                self.memory_context(Some(StorageNotice::Unavailable))
            }
        };

        (context, Some(availability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StorageMode;
    use crate::domain::entities::{ImageId, SlideId};
    use crate::domain::errors::StorageResult;
    use crate::infrastructure::storage::MemoryKeyValueStore;
    use serde_json::json;
    use tempfile::TempDir;

    struct LockedStore;

    impl KeyValueStore for LockedStore {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::QuotaExceeded("quota 0".to_string()))
        }

        fn remove(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn legacy() -> Arc<dyn KeyValueStore> {
        Arc::new(
            [
                (
                    "slideImageConfig".to_string(),
                    json!({"workout-session": {"imageId": "img-1"}}).to_string(),
                ),
                (
                    "image:img-1".to_string(),
                    json!({"url": "https://cdn.example.com/1.png"}).to_string(),
                ),
            ]
            .into_iter()
            .collect::<MemoryKeyValueStore>(),
        )
    }

    fn renames() -> Arc<IdentifierMap> {
        Arc::new([("workout-session", "sales-strategy")].into_iter().collect())
    }

    #[tokio::test]
    async fn test_durable_bootstrap_runs_both_migrations() {
        let dir = TempDir::new().unwrap();
        let use_case = BootstrapStorageUseCase::new(
            BootstrapOptions::new(dir.path().join("images"), 0),
            legacy(),
            renames(),
        );

        let outcome = use_case.execute().await;

        assert_eq!(outcome.context.mode(), StorageMode::Durable);
        assert!(outcome.context.notice().is_none());
        assert_eq!(outcome.migration.unwrap().migrated, 2);
        assert_eq!(outcome.identifiers.unwrap().renamed.len(), 1);

        let store = outcome.context.store();
        assert!(store.get(&ImageId::new("img-1")).await.unwrap().is_some());
        assert!(
            store
                .get_slide_config(&SlideId::new("sales-strategy"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_corrupted_store_is_reset_with_notice() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("images");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("index.json"), "{ definitely not json").unwrap();

        let use_case = BootstrapStorageUseCase::new(
            BootstrapOptions::new(root, 0),
            Arc::new(MemoryKeyValueStore::new()),
            renames(),
        );
        let outcome = use_case.execute().await;

        assert_eq!(outcome.context.mode(), StorageMode::Durable);
        assert_eq!(outcome.context.notice(), Some(StorageNotice::DataLoss));
        assert!(outcome.context.store().get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_root_falls_back_to_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        let use_case = BootstrapStorageUseCase::new(
            BootstrapOptions::new(blocker.join("images"), 0),
            Arc::new(MemoryKeyValueStore::new()),
            renames(),
        );
        let outcome = use_case.execute().await;

        assert_eq!(outcome.context.mode(), StorageMode::Memory);
        assert_eq!(outcome.context.notice(), Some(StorageNotice::Unavailable));
        assert!(!outcome.availability.unwrap().available);
    }

    #[tokio::test]
    async fn test_memory_only_still_migrates() {
        let mut options = BootstrapOptions::new(PathBuf::from("/unused"), 0);
        options.memory_only = true;

        let outcome = BootstrapStorageUseCase::new(options, legacy(), renames())
            .execute()
            .await;

        assert_eq!(outcome.context.mode(), StorageMode::Memory);
        assert!(outcome.availability.is_none());
        assert_eq!(outcome.migration.unwrap().migrated, 2);
    }

    #[tokio::test]
    async fn test_rejected_fallback_writes_flag_private_mode() {
        let dir = TempDir::new().unwrap();
        let use_case = BootstrapStorageUseCase::new(
            BootstrapOptions::new(dir.path().join("images"), 0),
            Arc::new(LockedStore),
            renames(),
        );

        let outcome = use_case.execute().await;

        assert_eq!(outcome.context.notice(), Some(StorageNotice::PrivateMode));
    }
}
