//! Publish endpoint HTTP client.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::dto::{
    ActionRequest, EmptyData, ErrorResponse, PublishAllData, PublishAllSummary,
    PublishSlideData, PublishSlideResponse, PublishedListResponse, PublishedSlideResponse,
    SlideQuery, UploadImage,
};
use crate::domain::entities::{PublishedImage, SlideId};
use crate::domain::errors::PublishError;
use crate::domain::ports::PublishedImagePort;

const USER_AGENT: &str = concat!("slidecache/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the remote publish endpoint.
///
/// Failed calls are returned to the caller and never retried here.
#[derive(Debug, Clone)]
pub struct HttpPublishClient {
    client: Client,
    endpoint: String,
}

impl HttpPublishClient {
    /// Creates a client posting to `endpoint`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Publishes one slide's image.
    ///
    /// # Errors
    /// Returns error if the request fails or the endpoint rejects it.
    pub async fn publish_slide(
        &self,
        slide: &SlideId,
        image: &UploadImage,
    ) -> Result<SlideId, PublishError> {
        let response: PublishSlideResponse = self
            .call(
                "publishSlide",
                PublishSlideData {
                    slide_id: slide,
                    image,
                },
            )
            .await?;

        if !response.success {
            return Err(PublishError::rejected(
                response.error.unwrap_or_else(|| format!("slide {slide} not published")),
            ));
        }

        info!(slide = %slide, image = %image.id, "Slide published");
        Ok(response.slide_id.unwrap_or_else(|| slide.clone()))
    }

    /// Publishes every slide in one batch.
    ///
    /// A partially successful batch is returned as `Ok` with its per-slide errors.
    ///
    /// # Errors
    /// Returns error if the request fails or the endpoint rejects the whole batch.
    pub async fn publish_all_slides(
        &self,
        slides: &BTreeMap<SlideId, UploadImage>,
    ) -> Result<PublishAllSummary, PublishError> {
        let summary: PublishAllSummary = self
            .call(
                "publishAllSlides",
                PublishAllData {
                    slide_config: slides,
                },
            )
            .await?;

        if !summary.success && summary.success_count == 0 {
            return Err(PublishError::rejected(
                summary
                    .errors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "batch rejected".to_string()),
            ));
        }

        if !summary.errors.is_empty() {
            warn!(
                published = summary.success_count,
                total = summary.total_count,
                failed = summary.errors.len(),
                "Some slides failed to publish"
            );
        }
        Ok(summary)
    }

    async fn call<T, R>(&self, action: &str, data: T) -> Result<R, PublishError>
    where
        T: Serialize + Send,
        R: DeserializeOwned,
    {
        debug!(action = action, endpoint = %self.endpoint, "Calling publish endpoint");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ActionRequest { action, data })
            .send()
            .await
            .map_err(|e| {
                warn!(action = action, error = %e, "Publish endpoint unreachable");
                map_transport_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(ErrorResponse { error: Some(error) }) => error,
                _ => format!("HTTP {status}"),
            };
            return Err(map_status(status, message));
        }

        response.json().await.map_err(|e| {
            warn!(action = action, error = %e, "Failed to parse publish response");
            PublishError::InvalidResponse(e.to_string())
        })
    }
}

fn map_transport_error(e: &reqwest::Error) -> PublishError {
    if e.is_timeout() {
        PublishError::network("request timed out")
    } else if e.is_connect() {
        PublishError::network("failed to connect to publish endpoint")
    } else {
        PublishError::network(e.to_string())
    }
}

fn map_status(status: StatusCode, message: String) -> PublishError {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
        | StatusCode::BAD_GATEWAY => PublishError::network(message),
        s if s.is_client_error() => PublishError::rejected(message),
        _ => PublishError::InvalidResponse(format!("{status}: {message}")),
    }
}

#[async_trait]
impl PublishedImagePort for HttpPublishClient {
    async fn published_image(
        &self,
        slide: &SlideId,
    ) -> Result<Option<PublishedImage>, PublishError> {
        let response: PublishedSlideResponse = self
            .call("getPublishedSlide", SlideQuery { slide_id: slide })
            .await?;

        if !response.success {
            return Err(PublishError::rejected(
                response.error.unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }
        Ok(response.image)
    }

    async fn published_slide_ids(&self) -> Result<BTreeSet<SlideId>, PublishError> {
        let response: PublishedListResponse =
            self.call("listPublishedSlides", EmptyData {}).await?;

        if !response.success {
            return Err(PublishError::rejected(
                response.error.unwrap_or_else(|| "listing failed".to_string()),
            ));
        }
        Ok(response.slide_ids.into_iter().collect())
    }
}

/// Published source used when no endpoint is configured: nothing is published.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnlyPublishedSource;

#[async_trait]
impl PublishedImagePort for LocalOnlyPublishedSource {
    async fn published_image(
        &self,
        _slide: &SlideId,
    ) -> Result<Option<PublishedImage>, PublishError> {
        Ok(None)
    }

    async fn published_slide_ids(&self) -> Result<BTreeSet<SlideId>, PublishError> {
        Ok(BTreeSet::new())
    }
}
