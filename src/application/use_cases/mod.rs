//! Use case implementations.

mod backend_migration_use_case;
mod bootstrap_storage_use_case;
mod identifier_migration_use_case;

pub use backend_migration_use_case::{
    BackendMigrationUseCase, LEGACY_CONFIG_KEY, LEGACY_IMAGE_PREFIX,
};
pub use bootstrap_storage_use_case::{BootstrapOptions, BootstrapOutcome, BootstrapStorageUseCase};
pub use identifier_migration_use_case::IdentifierMigrationUseCase;
