//! Application configuration.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::entities::IdentifierMap;
use crate::domain::services::CleanupOptions;

pub(crate) const APP_NAME: &str = "slidecache";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "slidecache";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Grace period in milliseconds for deduplicated lookups.
    #[serde(default = "default_dedup_ttl_ms")]
    pub dedup_ttl_ms: u64,

    /// Durable store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cleanup thresholds used on quota pressure and by `cleanup`.
    #[serde(default = "default_cleanup")]
    pub cleanup: CleanupOptions,

    /// Offline queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Publish endpoint settings.
    #[serde(default)]
    pub publish: PublishConfig,

    /// Slide identifier tables.
    #[serde(default)]
    pub identifiers: IdentifiersConfig,
}

/// Durable store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store root; defaults to the platform data directory.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Quota in bytes; zero means unknown.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,

    /// Keep everything in memory.
    #[serde(default)]
    pub memory_only: bool,

    /// Legacy key-value file read by the migration.
    #[serde(default)]
    pub legacy_path: Option<PathBuf>,

    /// Seconds between usage recomputations.
    #[serde(default = "default_usage_interval_secs")]
    pub usage_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            quota_bytes: default_quota_bytes(),
            memory_only: false,
            legacy_path: None,
            usage_interval_secs: default_usage_interval_secs(),
        }
    }
}

/// Offline queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Seconds between flushes while online.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Hours after which a queued operation is dropped.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            retention_hours: default_retention_hours(),
        }
    }
}

/// Publish endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Publish endpoint URL. Without it nothing is considered published.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Analytics collector URL used when replaying analytics events.
    #[serde(default)]
    pub analytics_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            analytics_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Slide identifier tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifiersConfig {
    /// Fallback table consulted when a slide has no config of its own.
    #[serde(default = "default_identifier_table")]
    pub legacy: IdentifierMap,

    /// Renames applied to stored configs at startup.
    #[serde(default = "default_identifier_table")]
    pub migration: IdentifierMap,
}

impl Default for IdentifiersConfig {
    fn default() -> Self {
        Self {
            legacy: default_identifier_table(),
            migration: default_identifier_table(),
        }
    }
}

fn default_identifier_table() -> IdentifierMap {
    [
        ("workout-session", "sales-strategy"),
        ("expert-panel", "expert-panel"),
    ]
    .into_iter()
    .collect()
}

const fn default_quota_bytes() -> u64 {
    500 * 1024 * 1024
}

const fn default_usage_interval_secs() -> u64 {
    60
}

const fn default_flush_interval_secs() -> u64 {
    30
}

const fn default_retention_hours() -> u32 {
    24
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_dedup_ttl_ms() -> u64 {
    5000
}

fn default_cleanup() -> CleanupOptions {
    CleanupOptions {
        max_age_days: Some(30),
        max_total_size_bytes: None,
        keep_recent_count: 10,
    }
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(root) = &args.storage_root {
            self.storage.root_dir = Some(root.clone());
        }
        if let Some(quota) = args.quota_bytes {
            self.storage.quota_bytes = quota;
        }
        if args.memory_only {
            self.storage.memory_only = true;
        }
        if let Some(legacy) = &args.legacy_path {
            self.storage.legacy_path = Some(legacy.clone());
        }
        if let Some(endpoint) = &args.publish_endpoint {
            self.publish.endpoint = Some(endpoint.clone());
        }
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("slidecache.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }

    /// Returns the image store root.
    #[must_use]
    pub fn effective_storage_root(&self) -> Option<PathBuf> {
        self.storage
            .root_dir
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("images")))
    }

    /// Returns the legacy key-value file.
    #[must_use]
    pub fn effective_legacy_path(&self) -> Option<PathBuf> {
        self.storage
            .legacy_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("legacy.json")))
    }

    /// Returns the offline queue file.
    #[must_use]
    pub fn effective_queue_path(&self) -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("queue.json"))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            dedup_ttl_ms: default_dedup_ttl_ms(),
            storage: StorageConfig::default(),
            cleanup: default_cleanup(),
            queue: QueueConfig::default(),
            publish: PublishConfig::default(),
            identifiers: IdentifiersConfig::default(),
        }
    }
}
