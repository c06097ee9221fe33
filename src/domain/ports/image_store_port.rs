//! Port definition for persistent image storage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::StorageMode;
use crate::domain::entities::{
    ImageId, ImageRecord, ImageSummary, SlideId, SlideImageConfig, StorageUsage,
};
use crate::domain::errors::StorageResult;
use crate::domain::services::{CleanupOptions, CleanupPlanner};

/// Keyed store of image records and slide configs.
///
/// Implementations must be thread-safe. A `put` followed by a `get` from the
/// same caller observes the write.
#[async_trait::async_trait]
pub trait ImageStorePort: Send + Sync {
    /// Storage mode this store provides.
    fn mode(&self) -> StorageMode;

    /// Configured quota in bytes; zero means unknown.
    fn quota_bytes(&self) -> u64;

    /// Prepares the store. Idempotent and safe to call concurrently.
    async fn initialize(&self) -> StorageResult<()>;

    /// Inserts or overwrites a record by id, updating usage accounting.
    async fn put(&self, record: ImageRecord) -> StorageResult<ImageRecord>;

    /// Fetches a record.
    async fn get(&self, id: &ImageId) -> StorageResult<Option<ImageRecord>>;

    /// Returns a snapshot of all records.
    async fn get_all(&self) -> StorageResult<Vec<ImageRecord>>;

    /// Lists record metadata without loading payloads.
    async fn summaries(&self) -> StorageResult<Vec<ImageSummary>>;

    /// Deletes a record. Returns false if it did not exist.
    async fn remove(&self, id: &ImageId) -> StorageResult<bool>;

    /// Returns current usage figures.
    async fn storage_usage(&self) -> StorageResult<StorageUsage>;

    /// Fetches the config of a slide.
    async fn get_slide_config(&self, slide: &SlideId) -> StorageResult<Option<SlideImageConfig>>;

    /// Inserts or overwrites the config of a slide.
    async fn put_slide_config(&self, slide: SlideId, config: SlideImageConfig)
    -> StorageResult<()>;

    /// Deletes the config of a slide. Returns false if it did not exist.
    async fn remove_slide_config(&self, slide: &SlideId) -> StorageResult<bool>;

    /// Returns a snapshot of every slide config.
    async fn slide_configs(&self) -> StorageResult<BTreeMap<SlideId, SlideImageConfig>>;

    /// Deletes every record and config.
    async fn clear(&self) -> StorageResult<()>;

    /// Evicts records per `options`. Returns the number deleted.
    async fn cleanup(&self, options: &CleanupOptions, now: DateTime<Utc>) -> StorageResult<usize> {
        let records = self.summaries().await?;
        let plan = CleanupPlanner::plan(&records, options, now);

        let mut removed = 0;
        for id in &plan {
            if self.remove(id).await? {
                removed += 1;
            }
        }

        debug!(
            candidates = records.len(),
            removed = removed,
            "Image store cleanup complete"
        );
        Ok(removed)
    }
}
