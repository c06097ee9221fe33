//! Port for querying remotely published slide images.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::entities::{PublishedImage, SlideId};
use crate::domain::errors::PublishError;

/// Authoritative source of published slide images.
#[async_trait]
pub trait PublishedImagePort: Send + Sync {
    /// Returns the image published for a slide, if any.
    async fn published_image(
        &self,
        slide: &SlideId,
    ) -> Result<Option<PublishedImage>, PublishError>;

    /// Returns every slide with a published image.
    async fn published_slide_ids(&self) -> Result<BTreeSet<SlideId>, PublishError>;
}
