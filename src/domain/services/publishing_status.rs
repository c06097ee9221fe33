use std::collections::{BTreeMap, BTreeSet};

use crate::domain::entities::{PublishingStatus, SlideId, SlideImageConfig};

/// Derives publish progress from local configs and remote state.
pub struct PublishingStatusCalculator;

impl PublishingStatusCalculator {
    /// Compares the local slide mapping with the set of published slides.
    #[must_use]
    pub fn compute(
        local: &BTreeMap<SlideId, SlideImageConfig>,
        published: &BTreeSet<SlideId>,
    ) -> PublishingStatus {
        let local_ids: Vec<&SlideId> = local
            .iter()
            .filter(|(_, config)| !config.is_empty())
            .map(|(slide, _)| slide)
            .collect();

        let total_count = local_ids.len();
        let unpublished = local_ids
            .iter()
            .filter(|slide| !published.contains(*slide))
            .count();

        PublishingStatus {
            published_count: published.len(),
            total_count,
            is_fully_published: total_count > 0 && unpublished == 0,
            has_unpublished_changes: unpublished > 0,
        }
    }
}
