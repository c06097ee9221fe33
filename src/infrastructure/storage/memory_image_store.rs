//! In-memory image store used when durable storage is unavailable.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::StorageMode;
use crate::domain::entities::{
    ImageId, ImageRecord, ImageSummary, SlideId, SlideImageConfig, StorageUsage,
};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::ports::ImageStorePort;

#[derive(Default)]
struct MemoryState {
    records: HashMap<ImageId, ImageRecord>,
    slide_configs: BTreeMap<SlideId, SlideImageConfig>,
    used_size: u64,
}

/// Process-local image store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryImageStore {
    quota_bytes: u64,
    state: Mutex<MemoryState>,
}

impl MemoryImageStore {
    /// Creates an empty store without a quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store enforcing `quota_bytes` (zero disables the check).
    #[must_use]
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes,
            state: Mutex::new(MemoryState::default()),
        }
    }
}

#[async_trait::async_trait]
impl ImageStorePort for MemoryImageStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Memory
    }

    fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn put(&self, record: ImageRecord) -> StorageResult<ImageRecord> {
        let mut state = self.state.lock();
        let previous_size = state.records.get(&record.id).map_or(0, |r| r.size_bytes);
        let projected = state.used_size.saturating_sub(previous_size) + record.size_bytes;
        if self.quota_bytes > 0 && projected > self.quota_bytes {
            return Err(StorageError::QuotaExceeded(format!(
                "{} bytes needed, {} of {} in use",
                record.size_bytes, state.used_size, self.quota_bytes
            )));
        }

        state.records.insert(record.id.clone(), record.clone());
        state.used_size = projected;
        debug!(id = %record.id, used = projected, "Stored image in memory");
        Ok(record)
    }

    async fn get(&self, id: &ImageId) -> StorageResult<Option<ImageRecord>> {
        let record = self.state.lock().records.get(id).cloned();
        trace!(id = %id, hit = record.is_some(), "Memory store lookup");
        Ok(record)
    }

    async fn get_all(&self) -> StorageResult<Vec<ImageRecord>> {
        Ok(self.state.lock().records.values().cloned().collect())
    }

    async fn summaries(&self) -> StorageResult<Vec<ImageSummary>> {
        Ok(self.state.lock().records.values().map(ImageRecord::summary).collect())
    }

    async fn remove(&self, id: &ImageId) -> StorageResult<bool> {
        let mut state = self.state.lock();
        let Some(removed) = state.records.remove(id) else {
            return Ok(false);
        };
        state.used_size = state.used_size.saturating_sub(removed.size_bytes);
        Ok(true)
    }

    async fn storage_usage(&self) -> StorageResult<StorageUsage> {
        let state = self.state.lock();
        Ok(StorageUsage {
            used_size: state.used_size,
            estimated_quota: self.quota_bytes,
            image_count: state.records.len(),
        })
    }

    async fn get_slide_config(&self, slide: &SlideId) -> StorageResult<Option<SlideImageConfig>> {
        Ok(self.state.lock().slide_configs.get(slide).cloned())
    }

    async fn put_slide_config(
        &self,
        slide: SlideId,
        config: SlideImageConfig,
    ) -> StorageResult<()> {
        self.state.lock().slide_configs.insert(slide, config);
        Ok(())
    }

    async fn remove_slide_config(&self, slide: &SlideId) -> StorageResult<bool> {
        Ok(self.state.lock().slide_configs.remove(slide).is_some())
    }

    async fn slide_configs(&self) -> StorageResult<BTreeMap<SlideId, SlideImageConfig>> {
        Ok(self.state.lock().slide_configs.clone())
    }

    async fn clear(&self) -> StorageResult<()> {
        *self.state.lock() = MemoryState::default();
        debug!("Cleared memory image store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ImagePayload;
    use crate::domain::services::CleanupOptions;
    use chrono::{TimeDelta, Utc};

    fn record(id: &str, size: usize, age_days: i64) -> ImageRecord {
        ImageRecord::with_id(
            ImageId::new(id),
            id,
            ImagePayload::Inline(vec![0; size]),
            Utc::now() - TimeDelta::days(age_days),
        )
    }

    #[tokio::test]
    async fn test_put_overwrites_by_id() {
        let store = MemoryImageStore::new();
        store.put(record("a", 10, 0)).await.unwrap();
        store.put(record("a", 4, 0)).await.unwrap();

        let usage = store.storage_usage().await.unwrap();
        assert_eq!(usage.image_count, 1);
        assert_eq!(usage.used_size, 4);
    }

    #[tokio::test]
    async fn test_quota_is_enforced() {
        let store = MemoryImageStore::with_quota(10);
        store.put(record("a", 6, 0)).await.unwrap();
        let err = store.put(record("b", 6, 0)).await.unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_retention_floor() {
        let store = MemoryImageStore::new();
        for i in 0..5 {
            store.put(record(&format!("r{i}"), 100, 60 - i)).await.unwrap();
        }

        let removed = store
            .cleanup(
                &CleanupOptions {
                    max_age_days: Some(7),
                    max_total_size_bytes: Some(0),
                    keep_recent_count: 3,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.storage_usage().await.unwrap().image_count, 3);
        assert!(store.get(&ImageId::new("r4")).await.unwrap().is_some());
    }
}
