//! Flat string key-value stores.

use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::ports::KeyValueStore;

/// Key-value area persisted as a single JSON object file.
///
/// Writes rewrite the whole file through a temporary file in the same directory.
pub struct JsonFileKeyValueStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileKeyValueStore {
    /// Opens the store, reading existing entries if the file exists.
    ///
    /// A malformed file is treated as empty.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn open(path: PathBuf) -> StorageResult<Self> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Malformed key-value file, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::from_io("failed to read key-value file", &e)),
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened key-value store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        use std::io::Write;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| StorageError::Io("key-value path has no parent".to_string()))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| StorageError::from_io("failed to create key-value dir", &e))?;

        let content = serde_json::to_string_pretty(entries)?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| StorageError::from_io("failed to create temp file", &e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| StorageError::from_io("failed to write key-value file", &e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| StorageError::from_io("failed to persist key-value file", &e.error))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock();
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(key);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

/// Process-local key-value area.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryKeyValueStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: Mutex::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");

        let store = JsonFileKeyValueStore::open(path.clone()).unwrap();
        store.set("slideImageConfig", "{}").unwrap();
        store.set("image:a", "{\"name\":\"a\"}").unwrap();
        store.remove("image:a").unwrap();

        let reopened = JsonFileKeyValueStore::open(path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["slideImageConfig".to_string()]);
        assert_eq!(
            reopened.get("slideImageConfig").unwrap().as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn test_malformed_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileKeyValueStore::open(path).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
