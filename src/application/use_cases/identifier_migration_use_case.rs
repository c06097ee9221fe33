//! Renames slide configs from superseded identifiers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::dto::IdentifierMigrationReport;
use crate::domain::entities::IdentifierMap;
use crate::domain::errors::StorageResult;
use crate::domain::ports::ImageStorePort;

/// Moves slide configs stored under old identifiers to their new keys.
///
/// Chained renames are followed to their last identifier, so one run reaches
/// the final state. Re-entrant: keys already renamed are left alone. When both
/// the old and the new key hold a config, the new one wins and the old one is
/// discarded. Renames that loop back on themselves are ignored.
#[derive(Clone)]
pub struct IdentifierMigrationUseCase {
    store: Arc<dyn ImageStorePort>,
    renames: Arc<IdentifierMap>,
}

impl IdentifierMigrationUseCase {
    /// Creates the use case.
    #[must_use]
    pub const fn new(store: Arc<dyn ImageStorePort>, renames: Arc<IdentifierMap>) -> Self {
        Self { store, renames }
    }

    /// Returns true if any stored config still uses an old identifier.
    ///
    /// # Errors
    /// Returns error if the store cannot be read.
    pub async fn is_migration_needed(&self) -> StorageResult<bool> {
        let configs = self.store.slide_configs().await?;
        Ok(configs
            .keys()
            .any(|slide| self.renames.final_target(slide).is_some()))
    }

    /// Renames every config stored under an old identifier.
    ///
    /// # Errors
    /// Returns error if the store fails; configs renamed before the failure stay renamed.
    pub async fn execute(&self) -> StorageResult<IdentifierMigrationReport> {
        let mut report = IdentifierMigrationReport::default();
        let configs = self.store.slide_configs().await?;

        // Closest to the final identifier first, so newer configs win conflicts.
        let mut pending: Vec<_> = configs
            .keys()
            .filter_map(|old| {
                let target = self.renames.final_target(old);
                if target.is_none() && self.renames.rename_of(old).is_some() {
                    warn!(slide = %old, "Identifier renames form a cycle, leaving config in place");
                }
                target.map(|(new, hops)| (hops, old, new))
            })
            .collect();
        pending.sort();

        for (_, old, new) in pending {
            let Some(config) = self.store.get_slide_config(old).await? else {
                continue;
            };

            if self.store.get_slide_config(new).await?.is_some() {
                warn!(old = %old, new = %new, "Both identifiers hold a config, keeping the new one");
                self.store.remove_slide_config(old).await?;
                report.discarded.push(old.clone());
                continue;
            }

            self.store.put_slide_config(new.clone(), config).await?;
            self.store.remove_slide_config(old).await?;
            debug!(old = %old, new = %new, "Renamed slide config");
            report.renamed.push((old.clone(), new.clone()));
        }

        if report.is_noop() {
            debug!("Identifier migration not needed");
        } else {
            info!(
                renamed = report.renamed.len(),
                discarded = report.discarded.len(),
                "Identifier migration complete"
            );
        }
        Ok(report)
    }
}
