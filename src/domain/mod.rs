//! Domain layer with core entities, services and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Serde utilities.
pub mod serde_utils;
/// Pure domain services.
pub mod services;
/// Storage mode definitions.
pub mod storage_mode;

pub use entities::{ImageId, ImageRecord, SlideId};
pub use errors::{StorageError, StorageResult};
pub use ports::{ImageStorePort, PublishedImagePort};
pub use storage_mode::StorageMode;
