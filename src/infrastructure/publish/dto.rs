use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    Dimensions, ImageId, ImageRecord, PublishedImage, SlideId, SlideImageConfig,
};

/// Envelope of every publish endpoint call.
#[derive(Debug, Serialize)]
pub struct ActionRequest<'a, T> {
    /// Endpoint action name.
    pub action: &'a str,
    /// Action body.
    pub data: T,
}

/// Image body sent when publishing a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImage {
    /// Local image id.
    pub id: ImageId,
    /// Display name.
    pub name: String,
    /// Remote URL or inline `data:` URL.
    pub url: String,
    /// Alt text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Pixel dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl UploadImage {
    /// Builds the upload body for a slide's local image.
    #[must_use]
    pub fn from_local(record: &ImageRecord, config: &SlideImageConfig) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            url: record.payload.display_url(),
            alt: config.alt.clone(),
            dimensions: record.dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSlideData<'a> {
    pub slide_id: &'a SlideId,
    pub image: &'a UploadImage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAllData<'a> {
    pub slide_config: &'a BTreeMap<SlideId, UploadImage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideQuery<'a> {
    pub slide_id: &'a SlideId,
}

#[derive(Debug, Serialize)]
pub struct EmptyData {}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSlideResponse {
    pub success: bool,
    #[serde(default)]
    pub slide_id: Option<SlideId>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of publishing every slide at once.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAllSummary {
    /// Whether the endpoint accepted the batch.
    pub success: bool,
    /// Slides published.
    #[serde(default)]
    pub success_count: usize,
    /// Slides submitted.
    #[serde(default)]
    pub total_count: usize,
    /// Per-slide failures reported by the endpoint.
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishedSlideResponse {
    pub success: bool,
    #[serde(default)]
    pub image: Option<PublishedImage>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedListResponse {
    pub success: bool,
    #[serde(default)]
    pub slide_ids: Vec<SlideId>,
    #[serde(default)]
    pub error: Option<String>,
}
