//! Infrastructure layer with adapters for the file system and the network.

/// Application configuration.
pub mod config;
/// Remote publish endpoint client and replay handlers.
pub mod publish;
/// Image store, legacy store and queue persistence adapters.
pub mod storage;

pub use config::{AppConfig, CliArgs, LogLevel, StorageManager};
pub use publish::{HttpPublishClient, LocalOnlyPublishedSource};
pub use storage::{
    DiskImageStore, JsonFileKeyValueStore, JsonQueueStore, MemoryImageStore,
    StorageAvailabilityDetector,
};
