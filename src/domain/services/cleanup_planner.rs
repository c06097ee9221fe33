use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{ImageId, ImageSummary};

/// Thresholds for store cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleanupOptions {
    /// Records older than this many days are evicted first.
    #[serde(default)]
    pub max_age_days: Option<u32>,
    /// Size budget enforced after age eviction, oldest records first.
    #[serde(default)]
    pub max_total_size_bytes: Option<u64>,
    /// Most recently created records that are never evicted.
    #[serde(default)]
    pub keep_recent_count: usize,
}

/// Selects records to evict under age and size pressure.
pub struct CleanupPlanner;

impl CleanupPlanner {
    /// Picks the records to delete, in deletion order.
    ///
    /// Age eviction runs before size eviction. The `keep_recent_count` newest
    /// records are never selected, even if the size budget stays exceeded.
    pub fn plan(
        records: &[ImageSummary],
        options: &CleanupOptions,
        now: DateTime<Utc>,
    ) -> Vec<ImageId> {
        let mut by_age: Vec<&ImageSummary> = records.iter().collect();
        by_age.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let evictable = by_age.len().saturating_sub(options.keep_recent_count);
        let candidates = &by_age[..evictable];

        let cutoff = options
            .max_age_days
            .map(|days| now - TimeDelta::days(i64::from(days)));
        let (stale, fresh): (Vec<&ImageSummary>, Vec<&ImageSummary>) = candidates
            .iter()
            .copied()
            .partition(|record| cutoff.is_some_and(|cutoff| record.created_at < cutoff));

        let mut plan: Vec<ImageId> = stale.iter().map(|record| record.id.clone()).collect();

        if let Some(budget) = options.max_total_size_bytes {
            let stale_size: u64 = stale.iter().map(|record| record.size_bytes).sum();
            let mut total = by_age
                .iter()
                .map(|record| record.size_bytes)
                .sum::<u64>()
                .saturating_sub(stale_size);

            for record in fresh {
                if total <= budget {
                    break;
                }
                plan.push(record.id.clone());
                total = total.saturating_sub(record.size_bytes);
            }
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    fn record(id: &str, age_days: i64, size: u64, now: DateTime<Utc>) -> ImageSummary {
        ImageSummary {
            id: ImageId::new(id),
            size_bytes: size,
            created_at: now - TimeDelta::days(age_days),
        }
    }

    #[test]
    fn test_age_eviction_runs_before_size_eviction() {
        let now = Utc::now();
        let records = vec![record("a", 31, KB, now), record("b", 1, 200 * MB, now)];
        let options = CleanupOptions {
            max_age_days: Some(30),
            max_total_size_bytes: Some(100 * MB),
            keep_recent_count: 0,
        };

        let plan = CleanupPlanner::plan(&records, &options, now);

        assert_eq!(plan, vec![ImageId::new("a"), ImageId::new("b")]);
    }

    #[test]
    fn test_retention_floor_is_never_crossed() {
        let now = Utc::now();
        let records: Vec<_> = (0..6)
            .map(|i| record(&format!("r{i}"), 100 - i, 10 * MB, now))
            .collect();
        let options = CleanupOptions {
            max_age_days: Some(1),
            max_total_size_bytes: Some(0),
            keep_recent_count: 4,
        };

        let plan = CleanupPlanner::plan(&records, &options, now);

        assert_eq!(plan, vec![ImageId::new("r0"), ImageId::new("r1")]);
    }

    #[test]
    fn test_floor_larger_than_store_deletes_nothing() {
        let now = Utc::now();
        let records = vec![record("a", 90, MB, now), record("b", 60, MB, now)];
        let options = CleanupOptions {
            max_age_days: Some(1),
            max_total_size_bytes: Some(0),
            keep_recent_count: 10,
        };

        assert!(CleanupPlanner::plan(&records, &options, now).is_empty());
    }

    #[test]
    fn test_size_eviction_stops_once_under_budget() {
        let now = Utc::now();
        let records = vec![
            record("old", 3, 40 * MB, now),
            record("mid", 2, 40 * MB, now),
            record("new", 1, 40 * MB, now),
        ];
        let options = CleanupOptions {
            max_age_days: None,
            max_total_size_bytes: Some(90 * MB),
            keep_recent_count: 0,
        };

        let plan = CleanupPlanner::plan(&records, &options, now);

        assert_eq!(plan, vec![ImageId::new("old")]);
    }

    #[test]
    fn test_no_thresholds_is_noop() {
        let now = Utc::now();
        let records = vec![record("a", 400, 900 * MB, now)];
        assert!(CleanupPlanner::plan(&records, &CleanupOptions::default(), now).is_empty());
    }
}
