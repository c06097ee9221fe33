//! Storage adapters.

pub mod availability;
pub mod disk_image_store;
pub mod legacy_store;
pub mod memory_image_store;
pub mod queue_store;

pub use availability::{
    PROBE_TIMEOUT, StorageAvailability, StorageAvailabilityDetector, UnavailableReason,
    detect_private_mode,
};
pub use disk_image_store::DiskImageStore;
pub use legacy_store::{JsonFileKeyValueStore, MemoryKeyValueStore};
pub use memory_image_store::MemoryImageStore;
pub use queue_store::{JsonQueueStore, MemoryQueueStore};
