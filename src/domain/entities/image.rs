//! Stored image records.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a stored image record.
///
/// Assigned once at insertion and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Creates a new `ImageId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Creates new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Image content: inline bytes or a reference URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ImagePayload {
    /// Raw image bytes held by the store.
    Inline(#[serde(with = "crate::domain::serde_utils::base64_bytes")] Vec<u8>),
    /// Reference to an image hosted elsewhere.
    Url(String),
}

impl ImagePayload {
    /// Parses a legacy payload string.
    ///
    /// Accepts `data:` URLs, plain `http(s)` URLs and bare base64.
    #[must_use]
    pub fn from_legacy(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Some(rest) = value.strip_prefix("data:") {
            let (_, encoded) = rest.split_once(";base64,")?;
            return STANDARD.decode(encoded).ok().map(Self::Inline);
        }
        if value.starts_with("http://") || value.starts_with("https://") || value.starts_with('/')
        {
            return Some(Self::Url(value.to_string()));
        }
        STANDARD.decode(value).ok().map(Self::Inline)
    }

    /// Number of bytes charged against the storage quota.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        match self {
            Self::Inline(bytes) => bytes.len() as u64,
            Self::Url(url) => url.len() as u64,
        }
    }

    /// Returns a URL suitable for display.
    ///
    /// Inline payloads are rendered as `data:` URLs.
    #[must_use]
    pub fn display_url(&self) -> String {
        match self {
            Self::Inline(bytes) => format!(
                "data:{};base64,{}",
                sniff_mime(bytes),
                STANDARD.encode(bytes)
            ),
            Self::Url(url) => url.clone(),
        }
    }

    /// Returns true for inline payloads.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Provenance of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    /// Created on this device.
    #[default]
    Local,
    /// Mirrors a remotely published image.
    Published,
}

impl std::fmt::Display for ImageOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Published => write!(f, "published"),
        }
    }
}

/// One stored image asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Unique identifier.
    pub id: ImageId,
    /// Display name.
    pub name: String,
    /// Inline bytes or reference URL.
    pub payload: ImagePayload,
    /// Remote copy of the same asset, if synchronized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_path: Option<String>,
    /// Pixel dimensions, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Size used for quota accounting.
    pub size_bytes: u64,
    /// Provenance tag.
    #[serde(default)]
    pub source: ImageOrigin,
    /// Creation time, used for age-based eviction.
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Creates a local record with a freshly generated id.
    #[must_use]
    pub fn local(
        name: impl Into<String>,
        payload: ImagePayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::with_id(ImageId::generate(), name, payload, created_at)
    }

    /// Creates a local record with an explicit id.
    #[must_use]
    pub fn with_id(
        id: ImageId,
        name: impl Into<String>,
        payload: ImagePayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        let size_bytes = payload.byte_len();
        Self {
            id,
            name: name.into(),
            payload,
            cloud_path: None,
            dimensions: None,
            size_bytes,
            source: ImageOrigin::Local,
            created_at,
        }
    }

    /// Sets the pixel dimensions.
    #[must_use]
    pub const fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Sets the remote copy path.
    #[must_use]
    pub fn with_cloud_path(mut self, path: impl Into<String>) -> Self {
        self.cloud_path = Some(path.into());
        self
    }

    /// Returns true if the record has a remote counterpart.
    #[must_use]
    pub const fn is_synchronized(&self) -> bool {
        self.cloud_path.is_some()
    }

    /// Metadata used by cleanup planning.
    #[must_use]
    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            id: self.id.clone(),
            size_bytes: self.size_bytes,
            created_at: self.created_at,
        }
    }
}

/// Payload-free view of a record: enough to plan eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Record identifier.
    pub id: ImageId,
    /// Size used for quota accounting.
    pub size_bytes: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
