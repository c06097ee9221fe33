//! Slide-to-image associations and resolved views.

use serde::{Deserialize, Serialize};

use super::image::{Dimensions, ImageId, ImageOrigin, ImageRecord};

/// Stable logical identifier of a slide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideId(String);

impl SlideId {
    /// Creates a new `SlideId`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SlideId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SlideId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SlideId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Local association between a slide and a stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideImageConfig {
    /// Image shown on the slide.
    pub image_id: ImageId,
    /// Alt text for the slide image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl SlideImageConfig {
    /// Creates a config pointing at an image.
    #[must_use]
    pub fn new(image_id: ImageId) -> Self {
        Self {
            image_id,
            alt: None,
        }
    }

    /// Sets the alt text.
    #[must_use]
    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    /// A config with a blank image id carries no image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_id.is_blank()
    }
}

/// Image published for a slide, as reported by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedImage {
    /// Remote image identifier.
    pub id: ImageId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Public URL of the image.
    pub url: String,
    /// Alt text.
    #[serde(default)]
    pub alt: Option<String>,
    /// Pixel dimensions.
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    /// Size in bytes.
    #[serde(default)]
    pub size_bytes: u64,
}

/// Read-only view of the image chosen for a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSlideImage {
    /// Image identifier.
    pub id: ImageId,
    /// Display name.
    pub name: String,
    /// URL to render.
    pub url: String,
    /// Alt text.
    pub alt: Option<String>,
    /// Pixel dimensions.
    pub dimensions: Option<Dimensions>,
    /// Size in bytes.
    pub size_bytes: u64,
    /// True when the image comes from the remote published copy.
    pub is_published: bool,
    /// Where the image was resolved from.
    pub source: ImageOrigin,
}

impl ResolvedSlideImage {
    /// Builds the view for a published image.
    #[must_use]
    pub fn from_published(image: &PublishedImage) -> Self {
        Self {
            id: image.id.clone(),
            name: image.name.clone(),
            url: image.url.clone(),
            alt: image.alt.clone(),
            dimensions: image.dimensions,
            size_bytes: image.size_bytes,
            is_published: true,
            source: ImageOrigin::Published,
        }
    }

    /// Builds the view for a locally stored image.
    #[must_use]
    pub fn from_local(record: &ImageRecord, config: &SlideImageConfig) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            url: record.payload.display_url(),
            alt: config.alt.clone(),
            dimensions: record.dimensions,
            size_bytes: record.size_bytes,
            is_published: false,
            source: ImageOrigin::Local,
        }
    }
}

/// Summary of how much of the local slide mapping is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingStatus {
    /// Distinct published slide identifiers.
    pub published_count: usize,
    /// Local slide identifiers with a non-empty config.
    pub total_count: usize,
    /// Every local entry has a published counterpart.
    pub is_fully_published: bool,
    /// At least one local entry lacks a published counterpart.
    pub has_unpublished_changes: bool,
}

impl std::fmt::Display for PublishingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} slides published{}",
            self.published_count,
            self.total_count,
            if self.has_unpublished_changes {
                " (unpublished changes)"
            } else {
                ""
            }
        )
    }
}
