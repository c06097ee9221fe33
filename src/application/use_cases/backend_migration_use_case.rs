//! Copies records from the legacy key-value area into the image store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::application::dto::MigrationReport;
use crate::domain::entities::{
    Dimensions, ImageId, ImageOrigin, ImagePayload, ImageRecord, SlideId, SlideImageConfig,
};
use crate::domain::errors::{MigrationRecordError, StorageResult};
use crate::domain::ports::{ImageStorePort, KeyValueStore};

/// Legacy key holding the slide → image mapping.
pub const LEGACY_CONFIG_KEY: &str = "slideImageConfig";
/// Prefix of legacy keys holding one image each.
pub const LEGACY_IMAGE_PREFIX: &str = "image:";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyImageEntry {
    #[serde(default)]
    id: Option<ImageId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    cloud_path: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl LegacyImageEntry {
    fn into_record(self, key_id: &str, now: DateTime<Utc>) -> Result<ImageRecord, String> {
        let id = self
            .id
            .filter(|id| !id.is_blank())
            .unwrap_or_else(|| ImageId::new(key_id));
        if id.is_blank() {
            return Err("empty image id".to_string());
        }

        let payload = self
            .data
            .as_deref()
            .and_then(ImagePayload::from_legacy)
            .or_else(|| self.url.map(ImagePayload::Url))
            .ok_or_else(|| "no decodable image data".to_string())?;

        let mut record = ImageRecord::with_id(
            id.clone(),
            self.name.unwrap_or_else(|| id.to_string()),
            payload,
            self.created_at.unwrap_or(now),
        );
        if let (Some(width), Some(height)) = (self.width, self.height) {
            record = record.with_dimensions(Dimensions { width, height });
        }
        if let Some(path) = self.cloud_path {
            record = record.with_cloud_path(path);
        }
        record.source = ImageOrigin::Local;
        Ok(record)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySlideConfig {
    image_id: ImageId,
    #[serde(default)]
    alt: Option<String>,
}

/// Imports legacy images and slide configs.
///
/// Idempotent: anything already present in the store is skipped, never
/// overwritten. One bad record never aborts the rest.
#[derive(Clone)]
pub struct BackendMigrationUseCase {
    legacy: Arc<dyn KeyValueStore>,
    store: Arc<dyn ImageStorePort>,
}

impl BackendMigrationUseCase {
    /// Creates the use case.
    #[must_use]
    pub const fn new(legacy: Arc<dyn KeyValueStore>, store: Arc<dyn ImageStorePort>) -> Self {
        Self { legacy, store }
    }

    /// Runs the migration.
    ///
    /// # Errors
    /// Returns error only if the legacy key listing itself fails.
    pub async fn execute(&self) -> StorageResult<MigrationReport> {
        let mut report = MigrationReport::default();
        let now = Utc::now();

        let mut keys = self.legacy.keys()?;
        keys.sort();

        for key in keys.iter().filter(|k| k.starts_with(LEGACY_IMAGE_PREFIX)) {
            self.migrate_image(key, now, &mut report).await;
        }

        self.migrate_configs(&mut report).await;

        if report.errors.is_empty() {
            info!(migrated = report.migrated, skipped = report.skipped, "Legacy migration complete");
        } else {
            warn!(
                migrated = report.migrated,
                skipped = report.skipped,
                failed = report.errors.len(),
                "Legacy migration finished with errors"
            );
        }
        Ok(report)
    }

    async fn migrate_image(&self, key: &str, now: DateTime<Utc>, report: &mut MigrationReport) {
        match self.import_image(key, now).await {
            Ok(true) => {
                debug!(key = key, "Migrated legacy image");
                report.migrated += 1;
            }
            Ok(false) => report.skipped += 1,
            Err(reason) => {
                warn!(key = key, reason = %reason, "Failed to migrate legacy image");
                report.errors.push(MigrationRecordError::new(key, reason));
            }
        }
    }

    async fn import_image(&self, key: &str, now: DateTime<Utc>) -> Result<bool, String> {
        let key_id = key.strip_prefix(LEGACY_IMAGE_PREFIX).unwrap_or(key);
        let raw = self
            .legacy
            .get(key)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "key vanished during migration".to_string())?;
        let entry: LegacyImageEntry =
            serde_json::from_str(&raw).map_err(|e| format!("malformed entry: {e}"))?;
        let record = entry.into_record(key_id, now)?;

        if self
            .store
            .get(&record.id)
            .await
            .map_err(|e| e.to_string())?
            .is_some()
        {
            return Ok(false);
        }
        self.store.put(record).await.map_err(|e| e.to_string())?;
        Ok(true)
    }

    async fn migrate_configs(&self, report: &mut MigrationReport) {
        let raw = match self.legacy.get(LEGACY_CONFIG_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                report
                    .errors
                    .push(MigrationRecordError::new(LEGACY_CONFIG_KEY, e.to_string()));
                return;
            }
        };

        let configs: BTreeMap<SlideId, LegacySlideConfig> = match serde_json::from_str(&raw) {
            Ok(configs) => configs,
            Err(e) => {
                warn!(error = %e, "Legacy slide config map is malformed");
                report.errors.push(MigrationRecordError::new(
                    LEGACY_CONFIG_KEY,
                    format!("malformed config map: {e}"),
                ));
                return;
            }
        };

        for (slide, legacy) in configs {
            match self.import_config(&slide, legacy).await {
                Ok(true) => report.migrated += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(slide = %slide, error = %e, "Failed to migrate slide config");
                    report
                        .errors
                        .push(MigrationRecordError::new(slide.as_str(), e.to_string()));
                }
            }
        }
    }

    async fn import_config(
        &self,
        slide: &SlideId,
        legacy: LegacySlideConfig,
    ) -> StorageResult<bool> {
        if self.store.get_slide_config(slide).await?.is_some() {
            return Ok(false);
        }
        let mut config = SlideImageConfig::new(legacy.image_id);
        config.alt = legacy.alt;
        self.store.put_slide_config(slide.clone(), config).await?;
        Ok(true)
    }
}
