//! Write path for local images with quota recovery.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::application::dto::StorageNotice;
use crate::domain::entities::{
    Dimensions, ImageId, ImagePayload, ImageRecord, SlideId, SlideImageConfig,
    StorageUsageSnapshot,
};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::ports::ImageStorePort;
use crate::domain::services::CleanupOptions;

use super::storage_context::StorageContext;

/// Stores images and slide assignments through the active store.
///
/// A quota failure triggers one cleanup-and-retry cycle before escalating. A
/// mid-session loss of durable storage degrades the context to memory mode
/// and the write is retried there.
pub struct ImageStorageService {
    context: Arc<StorageContext>,
    cleanup_policy: CleanupOptions,
}

impl ImageStorageService {
    /// Creates the service.
    #[must_use]
    pub const fn new(context: Arc<StorageContext>, cleanup_policy: CleanupOptions) -> Self {
        Self {
            context,
            cleanup_policy,
        }
    }

    /// Stores a new local image with a fresh id.
    ///
    /// # Errors
    /// Returns error if the image cannot be stored even after recovery.
    pub async fn add_image(
        &self,
        name: impl Into<String>,
        payload: ImagePayload,
        dimensions: Option<Dimensions>,
    ) -> StorageResult<ImageRecord> {
        let mut record = ImageRecord::local(name, payload, Utc::now());
        record.dimensions = dimensions;
        self.save_image(record).await
    }

    /// Stores a record, recovering once from quota exhaustion.
    ///
    /// # Errors
    /// Returns `QuotaExceeded` if cleanup did not free enough space, or any
    /// other store error.
    pub async fn save_image(&self, record: ImageRecord) -> StorageResult<ImageRecord> {
        let policy = self.cleanup_policy;
        let result = self
            .context
            .with_store(|store| {
                let record = record.clone();
                async move { Self::put_with_cleanup(store.as_ref(), record, &policy).await }
            })
            .await;

        if result.as_ref().is_err_and(StorageError::is_quota_exceeded) {
            self.context.set_notice(StorageNotice::QuotaExceeded);
        }
        result
    }

    async fn put_with_cleanup(
        store: &dyn ImageStorePort,
        record: ImageRecord,
        policy: &CleanupOptions,
    ) -> StorageResult<ImageRecord> {
        match store.put(record.clone()).await {
            Err(StorageError::QuotaExceeded(reason)) => {
                warn!(id = %record.id, reason = %reason, "Quota exceeded, cleaning up before retry");
                let removed = store.cleanup(policy, Utc::now()).await?;
                info!(removed = removed, "Cleanup freed space for retry");
                store.put(record).await
            }
            result => result,
        }
    }

    /// Associates a slide with a stored image.
    ///
    /// # Errors
    /// Returns `ImageNotFound` if the image does not exist, or any store error.
    pub async fn assign_to_slide(
        &self,
        slide: SlideId,
        image_id: ImageId,
        alt: Option<String>,
    ) -> StorageResult<()> {
        debug!(slide = %slide, image = %image_id, "Assigning image to slide");
        let config = SlideImageConfig { image_id, alt };
        self.context
            .with_store(|store| {
                let slide = slide.clone();
                let config = config.clone();
                async move {
                    if store.get(&config.image_id).await?.is_none() {
                        return Err(StorageError::ImageNotFound(config.image_id));
                    }
                    store.put_slide_config(slide, config).await
                }
            })
            .await
    }

    /// Deletes an image and every slide config pointing at it.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub async fn remove_image(&self, image_id: &ImageId) -> StorageResult<bool> {
        self.context
            .with_store(|store| async move {
                for (slide, config) in store.slide_configs().await? {
                    if config.image_id == *image_id {
                        store.remove_slide_config(&slide).await?;
                    }
                }
                store.remove(image_id).await
            })
            .await
    }

    /// Lists every slide whose assigned image is still stored, in slide order.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub async fn slide_images(
        &self,
    ) -> StorageResult<Vec<(SlideId, SlideImageConfig, ImageRecord)>> {
        self.context
            .with_store(|store| async move {
                let mut slides = Vec::new();
                for (slide, config) in store.slide_configs().await? {
                    match store.get(&config.image_id).await? {
                        Some(record) => slides.push((slide, config, record)),
                        None => {
                            warn!(slide = %slide, image = %config.image_id, "Slide image missing");
                        }
                    }
                }
                Ok(slides)
            })
            .await
    }

    /// Runs cleanup with explicit thresholds.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub async fn cleanup(&self, options: &CleanupOptions) -> StorageResult<usize> {
        self.context
            .with_store(|store| async move { store.cleanup(options, Utc::now()).await })
            .await
    }

    /// Recomputes the usage snapshot.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub async fn usage_snapshot(&self) -> StorageResult<StorageUsageSnapshot> {
        let usage = self
            .context
            .with_store(|store| async move { store.storage_usage().await })
            .await?;
        Ok(StorageUsageSnapshot::from_usage(usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StorageMode;
    use crate::infrastructure::storage::{DiskImageStore, MemoryImageStore};
    use chrono::TimeDelta;
    use tempfile::TempDir;

    fn service_with_store(
        store: Arc<dyn ImageStorePort>,
        policy: CleanupOptions,
    ) -> ImageStorageService {
        ImageStorageService::new(Arc::new(StorageContext::new(store, None)), policy)
    }

    fn aged(id: &str, size: usize, age_days: i64) -> ImageRecord {
        ImageRecord::with_id(
            ImageId::new(id),
            id,
            ImagePayload::Inline(vec![1; size]),
            Utc::now() - TimeDelta::days(age_days),
        )
    }

    #[tokio::test]
    async fn test_quota_exceeded_cleans_up_and_retries_once() {
        let store: Arc<dyn ImageStorePort> = Arc::new(MemoryImageStore::with_quota(100));
        store.put(aged("stale", 80, 45)).await.unwrap();
        let service = service_with_store(
            store.clone(),
            CleanupOptions {
                max_age_days: Some(30),
                ..CleanupOptions::default()
            },
        );

        let stored = service.save_image(aged("fresh", 50, 0)).await.unwrap();

        assert_eq!(stored.id, ImageId::new("fresh"));
        assert!(store.get(&ImageId::new("stale")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quota_exceeded_escalates_when_cleanup_is_not_enough() {
        let store: Arc<dyn ImageStorePort> = Arc::new(MemoryImageStore::with_quota(100));
        store.put(aged("recent", 80, 1)).await.unwrap();
        let context = Arc::new(StorageContext::new(store, None));
        let service = ImageStorageService::new(
            context.clone(),
            CleanupOptions {
                max_age_days: Some(30),
                ..CleanupOptions::default()
            },
        );

        let err = service.save_image(aged("big", 50, 0)).await.unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(context.notice(), Some(StorageNotice::QuotaExceeded));
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_memory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("images");
        let disk = Arc::new(DiskImageStore::new(root.clone(), 0));
        disk.initialize().await.unwrap();
        std::fs::remove_dir_all(&root).unwrap();

        let context = Arc::new(StorageContext::new(disk, None));
        let service = ImageStorageService::new(context.clone(), CleanupOptions::default());

        let stored = service
            .add_image("cover", ImagePayload::Inline(b"png".to_vec()), None)
            .await
            .unwrap();

        assert_eq!(context.mode(), StorageMode::Memory);
        assert!(context.store().get(&stored.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_image_drops_slide_configs() {
        let service =
            service_with_store(Arc::new(MemoryImageStore::new()), CleanupOptions::default());
        let record = service
            .add_image("cover", ImagePayload::Inline(b"png".to_vec()), None)
            .await
            .unwrap();
        service
            .assign_to_slide(SlideId::new("intro"), record.id.clone(), None)
            .await
            .unwrap();

        assert!(service.remove_image(&record.id).await.unwrap());
        let snapshot = service.usage_snapshot().await.unwrap();
        assert_eq!(snapshot.image_count, 0);
    }

    #[tokio::test]
    async fn test_slide_images_skips_dangling_configs() {
        let store: Arc<dyn ImageStorePort> = Arc::new(MemoryImageStore::new());
        let service = service_with_store(store.clone(), CleanupOptions::default());
        let record = service
            .add_image("cover", ImagePayload::Inline(b"png".to_vec()), None)
            .await
            .unwrap();
        service
            .assign_to_slide(SlideId::new("intro"), record.id.clone(), Some("Cover".into()))
            .await
            .unwrap();
        store
            .put_slide_config(
                SlideId::new("outro"),
                SlideImageConfig::new(ImageId::new("gone")),
            )
            .await
            .unwrap();

        let slides = service.slide_images().await.unwrap();

        assert_eq!(slides.len(), 1);
        let (slide, config, image) = &slides[0];
        assert_eq!(slide, &SlideId::new("intro"));
        assert_eq!(config.alt.as_deref(), Some("Cover"));
        assert_eq!(image.id, record.id);
    }

    #[tokio::test]
    async fn test_assign_rejects_missing_image() {
        let service =
            service_with_store(Arc::new(MemoryImageStore::new()), CleanupOptions::default());
        let result = service
            .assign_to_slide(SlideId::new("intro"), ImageId::new("ghost"), None)
            .await;
        assert_eq!(result, Err(StorageError::ImageNotFound(ImageId::new("ghost"))));
    }

    #[tokio::test]
    async fn test_quota_retry_survives_record_with_missing_blob() {
        let temp = TempDir::new().unwrap();
        let disk = Arc::new(DiskImageStore::new(temp.path().join("images"), 100));
        disk.put(aged("stale", 60, 45)).await.unwrap();
        disk.put(aged("gone", 10, 0)).await.unwrap();
        let gone_blob = std::fs::read_dir(temp.path().join("images").join("blobs"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|path| std::fs::read(path).unwrap().len() == 10)
            .unwrap();
        std::fs::remove_file(gone_blob).unwrap();

        let context = Arc::new(StorageContext::new(disk.clone(), None));
        let service = ImageStorageService::new(
            context.clone(),
            CleanupOptions {
                max_age_days: Some(30),
                ..CleanupOptions::default()
            },
        );

        service.save_image(aged("fresh", 50, 0)).await.unwrap();

        assert_eq!(context.mode(), StorageMode::Durable);
        assert!(disk.get(&ImageId::new("stale")).await.unwrap().is_none());
        assert!(disk.get(&ImageId::new("fresh")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_path_like_id_keeps_durable_mode() {
        let temp = TempDir::new().unwrap();
        let disk = Arc::new(DiskImageStore::new(temp.path().join("images"), 0));
        let context = Arc::new(StorageContext::new(disk, None));
        let service = ImageStorageService::new(context.clone(), CleanupOptions::default());

        service.save_image(aged("slides/cover", 4, 0)).await.unwrap();

        assert_eq!(context.mode(), StorageMode::Durable);
        assert!(context.notice().is_none());
    }

    #[tokio::test]
    async fn test_reads_degrade_when_store_vanishes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("images");
        let disk = Arc::new(DiskImageStore::new(root.clone(), 0));
        disk.put(aged("cover", 4, 0)).await.unwrap();
        let context = Arc::new(StorageContext::new(disk, None));
        let service = ImageStorageService::new(context.clone(), CleanupOptions::default());
        std::fs::remove_dir_all(&root).unwrap();

        let removed = service.remove_image(&ImageId::new("cover")).await.unwrap();

        assert!(!removed);
        assert_eq!(context.mode(), StorageMode::Memory);
        assert_eq!(context.notice(), Some(StorageNotice::Unavailable));
    }
}
