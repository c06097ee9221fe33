//! Storage usage accounting.

use serde::Serialize;

/// Percentage at which usage is reported as a warning.
pub const WARNING_THRESHOLD_PERCENT: f64 = 80.0;
/// Percentage at which usage is reported as critical.
pub const CRITICAL_THRESHOLD_PERCENT: f64 = 95.0;

/// Raw usage figures reported by an image store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageUsage {
    /// Bytes currently charged against the quota.
    pub used_size: u64,
    /// Environment-reported quota; zero means unknown.
    pub estimated_quota: u64,
    /// Number of stored image records.
    pub image_count: usize,
}

/// Usage pressure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    /// Below the warning threshold, or quota unknown.
    Normal,
    /// At or above 80% of quota.
    Warning,
    /// At or above 95% of quota.
    Critical,
}

/// Derived view of store usage; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsageSnapshot {
    /// Bytes used.
    pub used_size: u64,
    /// Quota in bytes; zero means unknown.
    pub estimated_quota: u64,
    /// `used_size` as a percentage of the quota.
    pub usage_percent: f64,
    /// Number of stored image records.
    pub image_count: usize,
}

impl StorageUsageSnapshot {
    /// Derives a snapshot from raw usage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_usage(usage: StorageUsage) -> Self {
        let usage_percent = if usage.estimated_quota == 0 {
            0.0
        } else {
            usage.used_size as f64 * 100.0 / usage.estimated_quota as f64
        };
        Self {
            used_size: usage.used_size,
            estimated_quota: usage.estimated_quota,
            usage_percent,
            image_count: usage.image_count,
        }
    }

    /// Returns true when the quota is unknown.
    #[must_use]
    pub const fn quota_unknown(&self) -> bool {
        self.estimated_quota == 0
    }

    /// Classifies usage pressure.
    #[must_use]
    pub fn level(&self) -> UsageLevel {
        if self.quota_unknown() {
            UsageLevel::Normal
        } else if self.usage_percent >= CRITICAL_THRESHOLD_PERCENT {
            UsageLevel::Critical
        } else if self.usage_percent >= WARNING_THRESHOLD_PERCENT {
            UsageLevel::Warning
        } else {
            UsageLevel::Normal
        }
    }
}

impl std::fmt::Display for StorageUsageSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.quota_unknown() {
            write!(
                f,
                "{} images, {} bytes used (quota unknown)",
                self.image_count, self.used_size
            )
        } else {
            write!(
                f,
                "{} images, {} of {} bytes used ({:.1}%)",
                self.image_count, self.used_size, self.estimated_quota, self.usage_percent
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_ninety_percent_is_warning_not_critical() {
        let snapshot = StorageUsageSnapshot::from_usage(StorageUsage {
            used_size: 450 * MB,
            estimated_quota: 500 * MB,
            image_count: 12,
        });
        assert!((snapshot.usage_percent - 90.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.level(), UsageLevel::Warning);
    }

    #[test_case(0, 0, UsageLevel::Normal ; "unknown_quota")]
    #[test_case(10, 100, UsageLevel::Normal ; "low")]
    #[test_case(80, 100, UsageLevel::Warning ; "warning_boundary")]
    #[test_case(95, 100, UsageLevel::Critical ; "critical_boundary")]
    #[test_case(120, 100, UsageLevel::Critical ; "over_quota")]
    fn test_usage_levels(used: u64, quota: u64, expected: UsageLevel) {
        let snapshot = StorageUsageSnapshot::from_usage(StorageUsage {
            used_size: used,
            estimated_quota: quota,
            image_count: 1,
        });
        assert_eq!(snapshot.level(), expected);
    }
}
