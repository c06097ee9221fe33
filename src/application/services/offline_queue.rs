//! Durable queue of side effects replayed when connectivity returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::application::dto::FlushReport;
use crate::domain::entities::{OperationId, OperationKind, PendingOperation};
use crate::domain::errors::{ReplayError, StorageResult};
use crate::domain::ports::{OperationHandler, QueueStoragePort};

use super::recurring_task::RecurringTask;

/// Operations older than this are dropped instead of replayed.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Offline operation queue.
///
/// Any caller may enqueue; only [`OfflineQueue::flush`] drains. Flushes are
/// serialized so an operation is never replayed twice concurrently.
pub struct OfflineQueue {
    storage: Arc<dyn QueueStoragePort>,
    handlers: HashMap<OperationKind, Arc<dyn OperationHandler>>,
    operations: Mutex<Vec<PendingOperation>>,
    flush_lock: Mutex<()>,
    online: watch::Receiver<bool>,
    retention: TimeDelta,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl OfflineQueue {
    /// Loads persisted operations and builds the queue.
    ///
    /// # Errors
    /// Returns error if the persisted queue cannot be read.
    pub async fn load(
        storage: Arc<dyn QueueStoragePort>,
        handlers: Vec<Arc<dyn OperationHandler>>,
        online: watch::Receiver<bool>,
    ) -> StorageResult<Self> {
        let operations = storage.load().await?;
        info!(pending = operations.len(), "Offline queue loaded");

        Ok(Self {
            storage,
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.kind(), handler))
                .collect(),
            operations: Mutex::new(operations),
            flush_lock: Mutex::new(()),
            online,
            retention: TimeDelta::hours(DEFAULT_RETENTION_HOURS),
        })
    }

    /// Overrides the retention window.
    #[must_use]
    pub const fn with_retention(mut self, retention: TimeDelta) -> Self {
        self.retention = retention;
        self
    }

    /// Returns the last connectivity value seen.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Number of queued operations.
    pub async fn len(&self) -> usize {
        self.operations.lock().await.len()
    }

    /// Returns true if nothing is queued.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of queued operations in enqueue order.
    pub async fn pending(&self) -> Vec<PendingOperation> {
        self.operations.lock().await.clone()
    }

    /// Queues an operation and persists the queue before returning.
    ///
    /// # Errors
    /// Returns error if the queue cannot be persisted; the operation is not queued.
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        payload: serde_json::Value,
    ) -> StorageResult<OperationId> {
        self.enqueue_at(kind, payload, Utc::now()).await
    }

    async fn enqueue_at(
        &self,
        kind: OperationKind,
        payload: serde_json::Value,
        enqueued_at: DateTime<Utc>,
    ) -> StorageResult<OperationId> {
        let operation = PendingOperation::new(kind, payload, enqueued_at);
        let id = operation.id.clone();

        let mut operations = self.operations.lock().await;
        operations.push(operation);
        if let Err(e) = self.storage.save(&operations).await {
            operations.pop();
            return Err(e);
        }

        debug!(id = %id, pending = operations.len(), "Queued offline operation");
        Ok(id)
    }

    /// Replays queued operations.
    ///
    /// # Errors
    /// Returns error only if the queue cannot be persisted afterwards.
    pub async fn flush(&self) -> StorageResult<FlushReport> {
        self.flush_at(Utc::now()).await
    }

    /// Replays queued operations as of `now`.
    ///
    /// Expired operations are dropped even while offline. Replay happens only
    /// while online. Successful and unknown-type operations are removed; failed
    /// ones stay queued.
    ///
    /// # Errors
    /// Returns error only if the queue cannot be persisted afterwards.
    pub async fn flush_at(&self, now: DateTime<Utc>) -> StorageResult<FlushReport> {
        let _flush_guard = self.flush_lock.lock().await;
        let mut report = FlushReport::default();

        let snapshot = {
            let mut operations = self.operations.lock().await;
            let before = operations.len();
            operations.retain(|op| {
                let expired = op.is_expired(now, self.retention);
                if expired {
                    warn!(id = %op.id, kind = %op.kind, "Dropping expired offline operation");
                }
                !expired
            });
            report.dropped_expired = before - operations.len();
            if report.dropped_expired > 0 {
                self.storage.save(&operations).await?;
            }
            operations.clone()
        };

        if snapshot.is_empty() || !self.is_online() {
            report.remaining = snapshot.len();
            return Ok(report);
        }

        let mut finished: HashSet<OperationId> = HashSet::new();
        for operation in &snapshot {
            let Some(handler) = self.handlers.get(&operation.kind) else {
                warn!(id = %operation.id, kind = %operation.kind, "No handler for offline operation, dropping");
                report.dropped_unknown += 1;
                finished.insert(operation.id.clone());
                continue;
            };

            match handler.replay(operation).await {
                Ok(()) => {
                    debug!(id = %operation.id, kind = %operation.kind, "Replayed offline operation");
                    report.succeeded += 1;
                    finished.insert(operation.id.clone());
                }
                Err(e) => {
                    warn!(id = %operation.id, kind = %operation.kind, error = %e, "Offline operation replay failed");
                    report.failed.push((operation.id.clone(), e));
                }
            }
        }

        let mut operations = self.operations.lock().await;
        operations.retain(|op| !finished.contains(&op.id));
        self.storage.save(&operations).await?;
        report.remaining = operations.len();

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            remaining = report.remaining,
            "Offline queue flushed"
        );
        Ok(report)
    }

    /// Starts flushing on every offline-to-online transition and on a fixed
    /// interval while online.
    #[must_use]
    pub fn start_background_flush(self: &Arc<Self>, interval: Duration) -> Vec<RecurringTask> {
        let on_online = {
            let queue = Arc::clone(self);
            RecurringTask::on_change("queue-connectivity", self.online.clone(), move |online| {
                let queue = Arc::clone(&queue);
                async move {
                    if online {
                        info!("Connectivity restored, flushing offline queue");
                        queue.flush_logged().await;
                    }
                }
            })
        };

        let periodic = {
            let queue = Arc::clone(self);
            RecurringTask::every("queue-interval", interval, move || {
                let queue = Arc::clone(&queue);
                async move {
                    if queue.is_online() {
                        queue.flush_logged().await;
                    }
                }
            })
        };

        vec![on_online, periodic]
    }

    async fn flush_logged(&self) {
        if let Err(e) = self.flush().await {
            warn!(error = %e, "Failed to persist offline queue after flush");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockOperationHandler;
    use crate::infrastructure::storage::MemoryQueueStore;
    use serde_json::json;

    fn handler(
        kind: OperationKind,
        outcome: Result<(), ReplayError>,
        times: usize,
    ) -> Arc<dyn OperationHandler> {
        let mut mock = MockOperationHandler::new();
        mock.expect_kind().return_const(kind);
        mock.expect_replay()
            .times(times)
            .returning(move |_| outcome.clone());
        Arc::new(mock)
    }

    async fn queue_with(
        storage: Arc<MemoryQueueStore>,
        handlers: Vec<Arc<dyn OperationHandler>>,
        online: bool,
    ) -> (OfflineQueue, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(online);
        let queue = OfflineQueue::load(storage, handlers, rx).await.unwrap();
        (queue, tx)
    }

    #[tokio::test]
    async fn test_enqueue_persists_immediately() {
        let storage = Arc::new(MemoryQueueStore::new());
        let (queue, _tx) = queue_with(storage.clone(), Vec::new(), false).await;

        queue
            .enqueue(OperationKind::AnalyticsEvent, json!({"event": "open"}))
            .await
            .unwrap();

        let persisted = storage.load().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].kind, OperationKind::AnalyticsEvent);

        let (reloaded, _tx) = queue_with(storage, Vec::new(), false).await;
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_flush_offline_is_noop() {
        let storage = Arc::new(MemoryQueueStore::new());
        let (queue, _tx) = queue_with(
            storage,
            vec![handler(OperationKind::AnalyticsEvent, Ok(()), 0)],
            false,
        )
        .await;
        queue
            .enqueue(OperationKind::AnalyticsEvent, json!({}))
            .await
            .unwrap();

        let report = queue.flush().await.unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_expired_operations_drop_even_when_offline() {
        let storage = Arc::new(MemoryQueueStore::new());
        let (queue, _tx) = queue_with(storage.clone(), Vec::new(), false).await;
        let now = Utc::now();
        queue
            .enqueue_at(OperationKind::AnalyticsEvent, json!({}), now - TimeDelta::hours(25))
            .await
            .unwrap();
        queue
            .enqueue_at(OperationKind::AnalyticsEvent, json!({}), now - TimeDelta::hours(1))
            .await
            .unwrap();

        let report = queue.flush_at(now).await.unwrap();

        assert_eq!(report.dropped_expired, 1);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.remaining, 1);
        assert_eq!(storage.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_stay_queued_and_unknown_kinds_drop() {
        let storage = Arc::new(MemoryQueueStore::new());
        let (queue, _tx) = queue_with(
            storage,
            vec![
                handler(OperationKind::AnalyticsEvent, Ok(()), 1),
                handler(
                    OperationKind::ImageUpload,
                    Err(ReplayError::Handler("HTTP 503".to_string())),
                    1,
                ),
            ],
            true,
        )
        .await;

        queue
            .enqueue(OperationKind::AnalyticsEvent, json!({"event": "open"}))
            .await
            .unwrap();
        let upload = queue
            .enqueue(OperationKind::ImageUpload, json!({"slideId": "intro"}))
            .await
            .unwrap();
        queue
            .enqueue(OperationKind::Unknown("legacy_sync".to_string()), json!(null))
            .await
            .unwrap();

        let report = queue.flush().await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.dropped_unknown, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, upload);
        assert_eq!(report.remaining, 1);
        assert_eq!(queue.pending().await[0].id, upload);
    }

    #[tokio::test]
    async fn test_going_online_triggers_flush() {
        let storage = Arc::new(MemoryQueueStore::new());
        let (queue, tx) = queue_with(
            storage,
            vec![handler(OperationKind::AnalyticsEvent, Ok(()), 1)],
            false,
        )
        .await;
        let queue = Arc::new(queue);
        queue
            .enqueue(OperationKind::AnalyticsEvent, json!({"event": "open"}))
            .await
            .unwrap();

        let tasks = queue.start_background_flush(Duration::from_secs(3600));
        tx.send(true).unwrap();

        for _ in 0..50 {
            if queue.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(queue.is_empty().await);
        for task in tasks {
            task.shutdown().await;
        }
    }
}
