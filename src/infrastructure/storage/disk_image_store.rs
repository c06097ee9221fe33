//! Directory-backed durable image store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, trace, warn};

use crate::domain::StorageMode;
use crate::domain::entities::{
    Dimensions, ImageId, ImageOrigin, ImagePayload, ImageRecord, ImageSummary, SlideId,
    SlideImageConfig, StorageUsage,
};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::ports::ImageStorePort;

/// Version of the on-disk index layout.
pub const SCHEMA_VERSION: u32 = 3;

const INDEX_FILE: &str = "index.json";
const BLOB_DIR: &str = "blobs";

/// Record metadata as persisted in the index. Inline payloads live in blob files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cloud_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimensions: Option<Dimensions>,
    size_bytes: u64,
    source: ImageOrigin,
    created_at: DateTime<Utc>,
}

impl StoredRecord {
    fn from_record(record: &ImageRecord) -> Self {
        Self {
            name: record.name.clone(),
            url: match &record.payload {
                ImagePayload::Url(url) => Some(url.clone()),
                ImagePayload::Inline(_) => None,
            },
            cloud_path: record.cloud_path.clone(),
            dimensions: record.dimensions,
            size_bytes: record.size_bytes,
            source: record.source,
            created_at: record.created_at,
        }
    }

    const fn has_blob(&self) -> bool {
        self.url.is_none()
    }

    fn summary(&self, id: &ImageId) -> ImageSummary {
        ImageSummary {
            id: id.clone(),
            size_bytes: self.size_bytes,
            created_at: self.created_at,
        }
    }

    fn into_record(self, id: ImageId, blob: Option<Vec<u8>>) -> ImageRecord {
        let payload = match (self.url, blob) {
            (Some(url), _) => ImagePayload::Url(url),
            (None, bytes) => ImagePayload::Inline(bytes.unwrap_or_default()),
        };
        ImageRecord {
            id,
            name: self.name,
            payload,
            cloud_path: self.cloud_path,
            dimensions: self.dimensions,
            size_bytes: self.size_bytes,
            source: self.source,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreIndex {
    schema_version: u32,
    #[serde(default)]
    records: BTreeMap<ImageId, StoredRecord>,
    #[serde(default)]
    slide_configs: BTreeMap<SlideId, SlideImageConfig>,
}

impl StoreIndex {
    fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ..Self::default()
        }
    }

    fn used_size(&self) -> u64 {
        self.records.values().map(|r| r.size_bytes).sum()
    }
}

struct StoreState {
    index: StoreIndex,
    used_size: u64,
}

/// Durable image store persisting an index file plus one blob per inline image.
///
/// The index is rewritten atomically on every mutation while the state lock is
/// held, so usage accounting never lags a completed write.
pub struct DiskImageStore {
    root: PathBuf,
    quota_bytes: u64,
    state: OnceCell<Mutex<StoreState>>,
}

impl std::fmt::Debug for DiskImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskImageStore")
            .field("root", &self.root)
            .field("quota_bytes", &self.quota_bytes)
            .finish_non_exhaustive()
    }
}

impl DiskImageStore {
    /// Creates a store rooted at `root`. Nothing touches disk until [`ImageStorePort::initialize`].
    ///
    /// A `quota_bytes` of zero means the quota is unknown and never enforced.
    #[must_use]
    pub fn new(root: PathBuf, quota_bytes: u64) -> Self {
        Self {
            root,
            quota_bytes,
            state: OnceCell::new(),
        }
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn blob_dir(&self) -> PathBuf {
        self.root.join(BLOB_DIR)
    }

    /// Blob files are named by digest so arbitrary ids stay inside `blobs/`.
    fn blob_path(&self, id: &ImageId) -> PathBuf {
        let digest = Sha256::digest(id.as_str().as_bytes());
        self.blob_dir().join(format!("{}.img", hex::encode(digest)))
    }

    /// Deletes all persisted data and initializes an empty store.
    ///
    /// Used to recover from [`StorageError::Corrupted`]; existing records are lost.
    ///
    /// # Errors
    /// Returns error if the directory cannot be wiped or recreated.
    pub async fn reset(&self) -> StorageResult<()> {
        error!(root = %self.root.display(), "Wiping image store, existing records are lost");

        if let Some(state) = self.state.get() {
            let mut state = state.lock().await;
            self.wipe_files().await?;
            state.index = StoreIndex::empty();
            state.used_size = 0;
            return self.persist_index(&state.index).await;
        }

        self.wipe_files().await?;
        self.initialize().await
    }

    async fn wipe_files(&self) -> StorageResult<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io("failed to wipe store", &e)),
        }?;
        fs::create_dir_all(self.blob_dir())
            .await
            .map_err(|e| StorageError::from_io("failed to recreate store", &e))
    }

    async fn load_state(&self) -> StorageResult<Mutex<StoreState>> {
        fs::create_dir_all(self.blob_dir())
            .await
            .map_err(|e| StorageError::init_failed(format!("cannot create store dir: {e}")))?;

        let index_path = self.index_path();
        let index = match fs::read_to_string(&index_path).await {
            Ok(content) => {
                let index: StoreIndex = serde_json::from_str(&content)
                    .map_err(|e| StorageError::Corrupted(format!("unreadable index: {e}")))?;
                if index.schema_version != SCHEMA_VERSION {
                    return Err(StorageError::Corrupted(format!(
                        "schema version {} does not match {}",
                        index.schema_version, SCHEMA_VERSION
                    )));
                }
                index
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let index = StoreIndex::empty();
                self.persist_index(&index)
                    .await
                    .map_err(|e| StorageError::init_failed(e.to_string()))?;
                index
            }
            Err(e) => {
                return Err(StorageError::init_failed(format!("cannot read index: {e}")));
            }
        };

        let used_size = index.used_size();
        info!(
            root = %self.root.display(),
            records = index.records.len(),
            used_size = used_size,
            "Image store ready"
        );

        Ok(Mutex::new(StoreState { index, used_size }))
    }

    async fn state(&self) -> StorageResult<&Mutex<StoreState>> {
        self.state.get_or_try_init(|| self.load_state()).await
    }

    async fn persist_index(&self, index: &StoreIndex) -> StorageResult<()> {
        let content = serde_json::to_vec_pretty(index)?;
        let path = self.index_path();
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, &content)
            .await
            .map_err(|e| StorageError::from_io("failed to write index", &e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::from_io("failed to replace index", &e))
    }

    /// Reads an inline payload. `None` means the blob is gone but the store
    /// itself is still there.
    async fn read_blob(&self, id: &ImageId) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.ensure_root().await?;
                error!(id = %id, "Image blob missing, skipping record");
                Ok(None)
            }
            Err(e) => Err(StorageError::from_io("failed to read blob", &e)),
        }
    }

    async fn ensure_root(&self) -> StorageResult<()> {
        match fs::try_exists(self.blob_dir()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(StorageError::Unavailable(format!(
                "store directory {} vanished",
                self.root.display()
            ))),
            Err(e) => Err(StorageError::from_io("failed to stat store", &e)),
        }
    }

    async fn load_record(
        &self,
        id: &ImageId,
        stored: StoredRecord,
    ) -> StorageResult<Option<ImageRecord>> {
        if !stored.has_blob() {
            return Ok(Some(stored.into_record(id.clone(), None)));
        }
        Ok(self
            .read_blob(id)
            .await?
            .map(|bytes| stored.into_record(id.clone(), Some(bytes))))
    }

    async fn remove_blob(&self, id: &ImageId) {
        if let Err(e) = fs::remove_file(self.blob_path(id)).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(id = %id, error = %e, "Failed to remove image blob");
        }
    }
}

#[async_trait::async_trait]
impl ImageStorePort for DiskImageStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Durable
    }

    fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    async fn initialize(&self) -> StorageResult<()> {
        self.state().await.map(|_| ())
    }

    async fn put(&self, record: ImageRecord) -> StorageResult<ImageRecord> {
        let mut state = self.state().await?.lock().await;

        let previous = state.index.records.get(&record.id).cloned();
        let previous_size = previous.as_ref().map_or(0, |r| r.size_bytes);
        let projected = state.used_size.saturating_sub(previous_size) + record.size_bytes;
        if self.quota_bytes > 0 && projected > self.quota_bytes {
            return Err(StorageError::QuotaExceeded(format!(
                "{} bytes needed, {} of {} in use",
                record.size_bytes, state.used_size, self.quota_bytes
            )));
        }

        if let ImagePayload::Inline(bytes) = &record.payload {
            fs::write(self.blob_path(&record.id), bytes)
                .await
                .map_err(|e| StorageError::from_io("failed to write blob", &e))?;
        }

        let mut index = state.index.clone();
        index
            .records
            .insert(record.id.clone(), StoredRecord::from_record(&record));
        self.persist_index(&index).await?;

        if previous.as_ref().is_some_and(StoredRecord::has_blob) && !record.payload.is_inline() {
            self.remove_blob(&record.id).await;
        }

        state.index = index;
        state.used_size = projected;
        debug!(id = %record.id, size = record.size_bytes, used = projected, "Stored image");

        Ok(record)
    }

    async fn get(&self, id: &ImageId) -> StorageResult<Option<ImageRecord>> {
        let state = self.state().await?.lock().await;
        let Some(stored) = state.index.records.get(id).cloned() else {
            trace!(id = %id, "Image store miss");
            return Ok(None);
        };
        let record = self.load_record(id, stored).await?;
        trace!(id = %id, hit = record.is_some(), "Image store lookup");
        Ok(record)
    }

    async fn get_all(&self) -> StorageResult<Vec<ImageRecord>> {
        let state = self.state().await?.lock().await;
        let mut records = Vec::with_capacity(state.index.records.len());
        for (id, stored) in &state.index.records {
            if let Some(record) = self.load_record(id, stored.clone()).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn summaries(&self) -> StorageResult<Vec<ImageSummary>> {
        let state = self.state().await?.lock().await;
        Ok(state
            .index
            .records
            .iter()
            .map(|(id, stored)| stored.summary(id))
            .collect())
    }

    async fn remove(&self, id: &ImageId) -> StorageResult<bool> {
        let mut state = self.state().await?.lock().await;
        if !state.index.records.contains_key(id) {
            return Ok(false);
        }

        let mut index = state.index.clone();
        let removed = index.records.remove(id);
        self.persist_index(&index).await?;

        if let Some(stored) = removed {
            if stored.has_blob() {
                self.remove_blob(id).await;
            }
            state.used_size = state.used_size.saturating_sub(stored.size_bytes);
        }
        state.index = index;
        debug!(id = %id, used = state.used_size, "Removed image");

        Ok(true)
    }

    async fn storage_usage(&self) -> StorageResult<StorageUsage> {
        let state = self.state().await?.lock().await;
        Ok(StorageUsage {
            used_size: state.used_size,
            estimated_quota: self.quota_bytes,
            image_count: state.index.records.len(),
        })
    }

    async fn get_slide_config(&self, slide: &SlideId) -> StorageResult<Option<SlideImageConfig>> {
        let state = self.state().await?.lock().await;
        Ok(state.index.slide_configs.get(slide).cloned())
    }

    async fn put_slide_config(
        &self,
        slide: SlideId,
        config: SlideImageConfig,
    ) -> StorageResult<()> {
        let mut state = self.state().await?.lock().await;
        let mut index = state.index.clone();
        debug!(slide = %slide, image = %config.image_id, "Storing slide config");
        index.slide_configs.insert(slide, config);
        self.persist_index(&index).await?;
        state.index = index;
        Ok(())
    }

    async fn remove_slide_config(&self, slide: &SlideId) -> StorageResult<bool> {
        let mut state = self.state().await?.lock().await;
        if !state.index.slide_configs.contains_key(slide) {
            return Ok(false);
        }
        let mut index = state.index.clone();
        index.slide_configs.remove(slide);
        self.persist_index(&index).await?;
        state.index = index;
        Ok(true)
    }

    async fn slide_configs(&self) -> StorageResult<BTreeMap<SlideId, SlideImageConfig>> {
        let state = self.state().await?.lock().await;
        Ok(state.index.slide_configs.clone())
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut state = self.state().await?.lock().await;
        self.wipe_files().await?;
        let index = StoreIndex::empty();
        self.persist_index(&index).await?;
        state.index = index;
        state.used_size = 0;
        debug!(root = %self.root.display(), "Cleared image store");
        Ok(())
    }
}
