use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "slidecache",
    version,
    about = "Offline-first slide image storage",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Image store root directory.
    #[arg(long, value_name = "DIR", global = true)]
    pub storage_root: Option<PathBuf>,

    /// Storage quota in bytes (0 = unknown).
    #[arg(long, global = true)]
    pub quota_bytes: Option<u64>,

    /// Keep images in memory only.
    #[arg(long, global = true)]
    pub memory_only: bool,

    /// Legacy key-value file to migrate from.
    #[arg(long, value_name = "PATH", global = true)]
    pub legacy_path: Option<PathBuf>,

    /// Publish endpoint URL.
    #[arg(long, value_name = "URL", global = true)]
    pub publish_endpoint: Option<String>,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show storage mode, notices, usage and publishing status.
    Status,
    /// Resolve the image shown for one or more slides.
    Resolve {
        /// Slide identifiers.
        #[arg(required = true)]
        slides: Vec<String>,
    },
    /// Run the legacy and identifier migrations.
    Migrate,
    /// Evict old images.
    Cleanup {
        /// Override the configured maximum age in days.
        #[arg(long)]
        max_age_days: Option<u32>,
        /// Override the configured total size budget in bytes.
        #[arg(long)]
        max_total_size: Option<u64>,
        /// Override the configured number of newest images to keep.
        #[arg(long)]
        keep_recent: Option<usize>,
    },
    /// Replay queued offline operations.
    Flush {
        /// Treat the session as offline: only expired operations are dropped.
        #[arg(long)]
        offline: bool,
    },
    /// Publish every locally assigned slide image in one batch.
    Publish,
    /// Probe whether durable storage is usable.
    Probe,
    /// Flush the queue periodically and monitor usage until interrupted.
    Run {
        /// Start offline; queued operations are kept until expiry.
        #[arg(long)]
        offline: bool,
    },
}
