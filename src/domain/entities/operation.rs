//! Operations buffered while offline.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a queued operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of side effects that can be queued.
///
/// Tags written by other versions deserialize as `Unknown` and are dropped at replay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// Analytics event write.
    AnalyticsEvent,
    /// Image upload to the publish endpoint.
    ImageUpload,
    /// Unrecognized tag.
    Unknown(String),
}

impl OperationKind {
    /// Wire tag of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AnalyticsEvent => "analytics_event",
            Self::ImageUpload => "image_upload",
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<String> for OperationKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "analytics_event" => Self::AnalyticsEvent,
            "image_upload" => Self::ImageUpload,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued side effect awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Identifier stamped at enqueue time.
    pub id: OperationId,
    /// Handler tag.
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Handler-specific body.
    pub payload: serde_json::Value,
    /// When the operation was queued.
    pub enqueued_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Creates an operation stamped with a fresh id.
    #[must_use]
    pub fn new(
        kind: OperationKind,
        payload: serde_json::Value,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OperationId::generate(),
            kind,
            payload,
            enqueued_at,
        }
    }

    /// Returns true once the operation has outlived the retention window.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, retention: TimeDelta) -> bool {
        now - self.enqueued_at > retention
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_tag() {
        let op = PendingOperation::new(
            OperationKind::AnalyticsEvent,
            serde_json::json!({"event": "slide_view"}),
            Utc::now(),
        );
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "analytics_event");
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let json = serde_json::json!({
            "id": "op-1",
            "type": "legacy_sync",
            "payload": null,
            "enqueuedAt": "2024-05-01T10:00:00Z"
        });
        let op: PendingOperation = serde_json::from_value(json).unwrap();
        assert_eq!(op.kind, OperationKind::Unknown("legacy_sync".to_string()));
    }

    #[test]
    fn test_expiry_uses_retention_window() {
        let now = Utc::now();
        let op = PendingOperation::new(
            OperationKind::ImageUpload,
            serde_json::Value::Null,
            now - TimeDelta::hours(25),
        );
        assert!(op.is_expired(now, TimeDelta::hours(24)));
        assert!(!op.is_expired(now, TimeDelta::hours(26)));
    }
}
