//! Resolves the image shown for a slide.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::domain::entities::{IdentifierMap, PublishingStatus, ResolvedSlideImage, SlideId};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::ports::PublishedImagePort;
use crate::domain::services::PublishingStatusCalculator;

use super::request_deduplicator::RequestDeduplicator;
use super::storage_context::StorageContext;

/// Default grace period for finished lookups.
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(5);

type Resolution = Result<Option<ResolvedSlideImage>, StorageError>;

/// Picks the image for a slide: published first, then local, then the local
/// config stored under the slide's legacy identifier.
pub struct SlideImageResolver {
    context: Arc<StorageContext>,
    published: Arc<dyn PublishedImagePort>,
    legacy_ids: Arc<IdentifierMap>,
    dedup: RequestDeduplicator<Resolution>,
    dedup_ttl: Duration,
}

impl SlideImageResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        context: Arc<StorageContext>,
        published: Arc<dyn PublishedImagePort>,
        legacy_ids: Arc<IdentifierMap>,
    ) -> Self {
        Self {
            context,
            published,
            legacy_ids,
            dedup: RequestDeduplicator::new(),
            dedup_ttl: DEFAULT_DEDUP_TTL,
        }
    }

    /// Overrides how long a finished lookup keeps answering repeat calls.
    #[must_use]
    pub const fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }

    /// Resolves the image for `slide`.
    ///
    /// A failing published source is logged and treated as "nothing
    /// published". Concurrent calls for the same slide share one lookup.
    ///
    /// # Errors
    /// Returns error if the local store cannot be read.
    pub async fn resolve(&self, slide: &SlideId) -> StorageResult<Option<ResolvedSlideImage>> {
        let key = format!("slide:{slide}");
        let context = Arc::clone(&self.context);
        let published = Arc::clone(&self.published);
        let legacy_ids = Arc::clone(&self.legacy_ids);
        let slide = slide.clone();

        self.dedup
            .run(
                &key,
                move || Self::lookup(context, published, legacy_ids, slide),
                self.dedup_ttl,
            )
            .await
    }

    /// Resolves several slides concurrently, in input order.
    pub async fn prefetch(
        &self,
        slides: &[SlideId],
    ) -> Vec<StorageResult<Option<ResolvedSlideImage>>> {
        join_all(slides.iter().map(|slide| self.resolve(slide))).await
    }

    /// Compares the local slide mapping with what has been published.
    ///
    /// # Errors
    /// Returns error if the local store cannot be read.
    pub async fn publishing_status(&self) -> StorageResult<PublishingStatus> {
        let local = self
            .context
            .with_store(|store| async move { store.slide_configs().await })
            .await?;
        let published = self
            .published
            .published_slide_ids()
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Published slide list unavailable");
                Default::default()
            });

        Ok(PublishingStatusCalculator::compute(&local, &published))
    }

    async fn lookup(
        context: Arc<StorageContext>,
        published: Arc<dyn PublishedImagePort>,
        legacy_ids: Arc<IdentifierMap>,
        slide: SlideId,
    ) -> Resolution {
        match published.published_image(&slide).await {
            Ok(Some(image)) => {
                debug!(slide = %slide, "Resolved published image");
                return Ok(Some(ResolvedSlideImage::from_published(&image)));
            }
            Ok(None) => {}
            Err(e) => warn!(slide = %slide, error = %e, "Published lookup failed, using local copy"),
        }

        let slide = &slide;
        let legacy_ids = legacy_ids.as_ref();
        context
            .with_store(|store| async move {
                let mut config = store.get_slide_config(slide).await?;
                if config.is_none()
                    && let Some(legacy) = legacy_ids.rename_of(slide)
                {
                    config = store.get_slide_config(legacy).await?;
                    if config.is_some() {
                        debug!(slide = %slide, legacy = %legacy, "Resolved through legacy identifier");
                    }
                }

                let Some(config) = config.filter(|config| !config.is_empty()) else {
                    return Ok(None);
                };

                let record = store.get(&config.image_id).await?;
                if record.is_none() {
                    debug!(slide = %slide, image = %config.image_id, "Slide config points at a missing image");
                }
                Ok(record.map(|record| ResolvedSlideImage::from_local(&record, &config)))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        ImageId, ImageOrigin, ImagePayload, ImageRecord, PublishedImage, SlideImageConfig,
    };
    use crate::domain::ports::mocks::MockPublishedImages;
    use crate::domain::ImageStorePort;
    use crate::infrastructure::storage::MemoryImageStore;
    use chrono::Utc;

    struct Fixture {
        context: Arc<StorageContext>,
        published: Arc<MockPublishedImages>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                context: Arc::new(StorageContext::new(Arc::new(MemoryImageStore::new()), None)),
                published: Arc::new(MockPublishedImages::new()),
            }
        }

        fn resolver(&self) -> SlideImageResolver {
            let legacy: IdentifierMap = [
                ("workout-session", "sales-strategy"),
                ("expert-panel", "expert-panel"),
            ]
            .into_iter()
            .collect();
            SlideImageResolver::new(self.context.clone(), self.published.clone(), Arc::new(legacy))
        }

        async fn local_image(&self, slide: &str, image: &str) {
            let store = self.context.store();
            store
                .put(ImageRecord::with_id(
                    ImageId::new(image),
                    format!("{image}.png"),
                    ImagePayload::Url(format!("https://cdn.example.com/{image}.png")),
                    Utc::now(),
                ))
                .await
                .unwrap();
            store
                .put_slide_config(
                    SlideId::new(slide),
                    SlideImageConfig::new(ImageId::new(image)).with_alt("local"),
                )
                .await
                .unwrap();
        }
    }

    fn published(id: &str) -> PublishedImage {
        PublishedImage {
            id: ImageId::new(id),
            name: format!("{id}.png"),
            url: format!("https://published.example.com/{id}.png"),
            alt: Some("published".to_string()),
            dimensions: None,
            size_bytes: 2048,
        }
    }

    #[tokio::test]
    async fn test_published_image_wins_over_local() {
        let fixture = Fixture::new();
        fixture.local_image("intro", "local-1").await;
        fixture.published.publish("intro", published("remote-1"));

        let resolved = fixture
            .resolver()
            .resolve(&SlideId::new("intro"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, ImageId::new("remote-1"));
        assert!(resolved.is_published);
        assert_eq!(resolved.source, ImageOrigin::Published);
    }

    #[tokio::test]
    async fn test_falls_back_to_legacy_identifier() {
        let fixture = Fixture::new();
        fixture.local_image("sales-strategy", "legacy-img").await;

        let resolved = fixture
            .resolver()
            .resolve(&SlideId::new("workout-session"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, ImageId::new("legacy-img"));
        assert_eq!(resolved.source, ImageOrigin::Local);
        assert!(!resolved.is_published);
        assert_eq!(resolved.alt.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_no_image_anywhere_resolves_to_none() {
        let fixture = Fixture::new();

        let resolved = fixture
            .resolver()
            .resolve(&SlideId::new("closing"))
            .await
            .unwrap();

        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_config_pointing_at_missing_image_resolves_to_none() {
        let fixture = Fixture::new();
        fixture
            .context
            .store()
            .put_slide_config(SlideId::new("intro"), SlideImageConfig::new(ImageId::new("gone")))
            .await
            .unwrap();

        let resolved = fixture
            .resolver()
            .resolve(&SlideId::new("intro"))
            .await
            .unwrap();

        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_published_failure_falls_back_to_local() {
        let fixture = Fixture::new();
        fixture.local_image("intro", "local-1").await;
        fixture.published.set_failing(true);

        let resolved = fixture
            .resolver()
            .resolve(&SlideId::new("intro"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, ImageId::new("local-1"));
        assert_eq!(resolved.source, ImageOrigin::Local);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_lookup() {
        let fixture = Fixture::new();
        fixture.published.publish("intro", published("remote-1"));
        let resolver = fixture.resolver();
        let slide = SlideId::new("intro");

        let (a, b) = tokio::join!(resolver.resolve(&slide), resolver.resolve(&slide));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(fixture.published.lookups(), 1);
    }

    #[tokio::test]
    async fn test_prefetch_preserves_order() {
        let fixture = Fixture::new();
        fixture.local_image("intro", "local-1").await;
        fixture.published.publish("closing", published("remote-2"));

        let results = fixture
            .resolver()
            .prefetch(&[SlideId::new("intro"), SlideId::new("closing")])
            .await;

        let ids: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().map(|image| image.id))
            .collect();
        assert_eq!(
            ids,
            vec![Some(ImageId::new("local-1")), Some(ImageId::new("remote-2"))]
        );
    }

    #[tokio::test]
    async fn test_publishing_status_counts_local_entries() {
        let fixture = Fixture::new();
        fixture.local_image("intro", "local-1").await;
        fixture.local_image("closing", "local-2").await;
        fixture.published.publish("intro", published("remote-1"));

        let status = fixture.resolver().publishing_status().await.unwrap();

        assert_eq!(status.total_count, 2);
        assert_eq!(status.published_count, 1);
        assert!(!status.is_fully_published);
        assert!(status.has_unpublished_changes);
    }

    #[tokio::test]
    async fn test_store_lost_mid_session_falls_back_to_memory() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("images");
        let disk = Arc::new(crate::infrastructure::storage::DiskImageStore::new(root.clone(), 0));
        disk.put(ImageRecord::with_id(
            ImageId::new("local-1"),
            "local-1.png",
            ImagePayload::Inline(b"png".to_vec()),
            Utc::now(),
        ))
        .await
        .unwrap();
        disk.put_slide_config(SlideId::new("intro"), SlideImageConfig::new(ImageId::new("local-1")))
            .await
            .unwrap();

        let fixture = Fixture {
            context: Arc::new(StorageContext::new(disk, None)),
            published: Arc::new(MockPublishedImages::new()),
        };
        std::fs::remove_dir_all(&root).unwrap();

        let resolved = fixture
            .resolver()
            .resolve(&SlideId::new("intro"))
            .await
            .unwrap();

        assert!(resolved.is_none());
        assert_eq!(fixture.context.mode(), crate::domain::StorageMode::Memory);
        assert_eq!(
            fixture.context.notice(),
            Some(crate::application::dto::StorageNotice::Unavailable)
        );
    }
}
