//! Periodic storage usage polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, warn};

use crate::domain::entities::{StorageUsageSnapshot, UsageLevel};

use super::image_storage_service::ImageStorageService;
use super::recurring_task::RecurringTask;

/// Publishes a fresh usage snapshot on every tick.
pub struct UsageMonitor {
    snapshots: watch::Receiver<Option<StorageUsageSnapshot>>,
    task: RecurringTask,
}

impl UsageMonitor {
    /// Starts polling `service` every `period`.
    #[must_use]
    pub fn start(service: Arc<ImageStorageService>, period: Duration) -> Self {
        let (tx, snapshots) = watch::channel(None);
        let tx = Arc::new(tx);

        let task = RecurringTask::every("usage-monitor", period, move || {
            let service = Arc::clone(&service);
            let tx = Arc::clone(&tx);
            async move {
                match service.usage_snapshot().await {
                    Ok(snapshot) => {
                        match snapshot.level() {
                            UsageLevel::Critical => error!(usage = %snapshot, "Storage nearly full"),
                            UsageLevel::Warning => warn!(usage = %snapshot, "Storage usage high"),
                            UsageLevel::Normal => {}
                        }
                        tx.send_replace(Some(snapshot));
                    }
                    Err(e) => warn!(error = %e, "Failed to read storage usage"),
                }
            }
        });

        Self { snapshots, task }
    }

    /// Receiver for snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<StorageUsageSnapshot>> {
        self.snapshots.clone()
    }

    /// Most recent snapshot, if any tick has completed.
    #[must_use]
    pub fn latest(&self) -> Option<StorageUsageSnapshot> {
        *self.snapshots.borrow()
    }

    /// Stops polling.
    pub async fn shutdown(self) {
        self.task.shutdown().await;
    }
}
