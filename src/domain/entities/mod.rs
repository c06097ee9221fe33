//! Domain entity definitions.

mod identifiers;
mod image;
mod operation;
mod slide;
mod usage;

pub use identifiers::IdentifierMap;
pub use image::{Dimensions, ImageId, ImageOrigin, ImagePayload, ImageRecord, ImageSummary};
pub use operation::{OperationId, OperationKind, PendingOperation};
pub use slide::{
    PublishedImage, PublishingStatus, ResolvedSlideImage, SlideId, SlideImageConfig,
};
pub use usage::{
    CRITICAL_THRESHOLD_PERCENT, StorageUsage, StorageUsageSnapshot, UsageLevel,
    WARNING_THRESHOLD_PERCENT,
};
