//! Remote publish endpoint adapters.

mod client;
mod dto;
mod handlers;

pub use client::{DEFAULT_TIMEOUT, HttpPublishClient, LocalOnlyPublishedSource};
pub use dto::{PublishAllSummary, UploadImage};
pub use handlers::{AnalyticsEventHandler, ImageUploadHandler, ImageUploadPayload};
