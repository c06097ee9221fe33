//! Replay handlers for queued side effects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::HttpPublishClient;
use super::dto::UploadImage;
use crate::domain::entities::{OperationKind, PendingOperation, SlideId};
use crate::domain::errors::ReplayError;
use crate::domain::ports::OperationHandler;

/// Body of a queued `image_upload` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadPayload {
    /// Target slide.
    pub slide_id: SlideId,
    /// Image to publish.
    pub image: UploadImage,
}

/// Replays image uploads through the publish endpoint.
pub struct ImageUploadHandler {
    client: Arc<HttpPublishClient>,
}

impl ImageUploadHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new(client: Arc<HttpPublishClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OperationHandler for ImageUploadHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::ImageUpload
    }

    async fn replay(&self, operation: &PendingOperation) -> Result<(), ReplayError> {
        let payload: ImageUploadPayload = serde_json::from_value(operation.payload.clone())
            .map_err(|e| ReplayError::MalformedPayload(e.to_string()))?;

        self.client
            .publish_slide(&payload.slide_id, &payload.image)
            .await
            .map_err(|e| ReplayError::Handler(e.to_string()))?;
        Ok(())
    }
}

/// Forwards queued analytics events to a collector URL.
pub struct AnalyticsEventHandler {
    client: Client,
    url: String,
}

impl AnalyticsEventHandler {
    /// Creates the handler.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ReplayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplayError::Handler(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl OperationHandler for AnalyticsEventHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::AnalyticsEvent
    }

    async fn replay(&self, operation: &PendingOperation) -> Result<(), ReplayError> {
        if !operation.payload.is_object() {
            return Err(ReplayError::MalformedPayload(
                "analytics event must be a JSON object".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.url)
            .json(&operation.payload)
            .send()
            .await
            .map_err(|e| ReplayError::Handler(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplayError::Handler(format!("HTTP {status}")));
        }

        debug!(id = %operation.id, "Analytics event delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_upload_with_malformed_payload_is_rejected() {
        let client = Arc::new(
            HttpPublishClient::new("http://127.0.0.1:9/publish", Duration::from_secs(1)).unwrap(),
        );
        let handler = ImageUploadHandler::new(client);
        let operation =
            PendingOperation::new(OperationKind::ImageUpload, json!({"slide": 3}), Utc::now());

        let result = handler.replay(&operation).await;

        assert!(matches!(result, Err(ReplayError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_analytics_requires_object_payload() {
        let timeout = Duration::from_secs(1);
        let handler = AnalyticsEventHandler::new("http://127.0.0.1:9/events", timeout).unwrap();
        let operation =
            PendingOperation::new(OperationKind::AnalyticsEvent, json!("open"), Utc::now());

        let result = handler.replay(&operation).await;

        assert!(matches!(result, Err(ReplayError::MalformedPayload(_))));
        assert_eq!(handler.kind(), OperationKind::AnalyticsEvent);
    }

    #[test]
    fn test_upload_payload_uses_camel_case() {
        let payload: ImageUploadPayload = serde_json::from_value(json!({
            "slideId": "intro",
            "image": {"id": "img-1", "name": "a.png", "url": "https://cdn.example.com/a.png"}
        }))
        .unwrap();

        assert_eq!(payload.slide_id, SlideId::new("intro"));
        assert_eq!(payload.image.alt, None);
    }
}
