//! Port for simple synchronous string-keyed storage.

use crate::domain::errors::StorageResult;

/// Flat string key-value area, read by the legacy migration and used by
/// the private-mode probe.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes a value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Deletes a value.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Lists every key.
    fn keys(&self) -> StorageResult<Vec<String>>;
}
