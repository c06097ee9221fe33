//! Probing whether durable storage works in this environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::domain::ports::KeyValueStore;

/// Upper bound for a storage probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const PRIVATE_MODE_PROBE_KEY: &str = "__storage_probe__";

/// Why durable storage was classified as unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum UnavailableReason {
    /// The environment does not support durable storage here.
    Unsupported,
    /// The quota is already exhausted.
    QuotaExceeded,
    /// The probe did not finish within the timeout.
    Timeout,
    /// Any other failure, message passed through.
    Error(String),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported"),
            Self::QuotaExceeded => write!(f, "quota exceeded"),
            Self::Timeout => write!(f, "timeout"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Outcome of a storage probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageAvailability {
    /// True if durable storage can be used.
    pub available: bool,
    /// Failure classification when unavailable.
    pub reason: Option<UnavailableReason>,
}

impl StorageAvailability {
    const fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    const fn unavailable(reason: UnavailableReason) -> Self {
        Self {
            available: false,
            reason: Some(reason),
        }
    }
}

/// Runs a disposable write/read/delete cycle under the storage root.
#[derive(Debug, Clone)]
pub struct StorageAvailabilityDetector {
    root: PathBuf,
    timeout: Duration,
}

impl StorageAvailabilityDetector {
    /// Creates a detector probing under `root` with the default timeout.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self {
            root,
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Overrides the probe timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens a uniquely named test area and classifies the result.
    pub async fn probe(&self) -> StorageAvailability {
        let probe_dir = self
            .root
            .join(format!(".probe-{}", uuid::Uuid::new_v4().simple()));

        let result = tokio::time::timeout(self.timeout, open_test_area(&probe_dir)).await;

        let availability = match result {
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis(), "Storage probe timed out");
                StorageAvailability::unavailable(UnavailableReason::Timeout)
            }
            Ok(Err(e)) => {
                let reason = classify_io_error(&e);
                warn!(error = %e, reason = %reason, "Storage probe failed");
                StorageAvailability::unavailable(reason)
            }
            Ok(Ok(())) => StorageAvailability::available(),
        };

        if let Err(e) = fs::remove_dir_all(&probe_dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %probe_dir.display(), error = %e, "Failed to delete probe area");
        }

        info!(available = availability.available, "Storage probe finished");
        availability
    }
}

async fn open_test_area(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path).await?;
    let file = path.join("probe");
    fs::write(&file, b"probe").await?;
    let read_back = fs::read(&file).await?;
    if read_back != b"probe" {
        return Err(std::io::Error::other("probe read back different bytes"));
    }
    debug!(path = %path.display(), "Probe area usable");
    Ok(())
}

/// Maps a probe I/O failure onto an [`UnavailableReason`].
#[must_use]
pub fn classify_io_error(err: &std::io::Error) -> UnavailableReason {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::Unsupported | ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            UnavailableReason::Unsupported
        }
        ErrorKind::StorageFull => UnavailableReason::QuotaExceeded,
        _ => UnavailableReason::Error(err.to_string()),
    }
}

/// Heuristic for restricted ("private") sessions.
///
/// Any failure writing or deleting a trivial key in the fallback store is
/// read as private mode.
pub fn detect_private_mode(fallback: &dyn KeyValueStore) -> bool {
    let result = fallback
        .set(PRIVATE_MODE_PROBE_KEY, "1")
        .and_then(|()| fallback.remove(PRIVATE_MODE_PROBE_KEY));
    match result {
        Ok(()) => false,
        Err(e) => {
            info!(error = %e, "Fallback storage rejected writes, assuming private mode");
            true
        }
    }
}
