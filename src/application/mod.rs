//! Application layer with services, use cases and DTOs.

/// Data transfer objects.
pub mod dto;
/// Long-lived services shared across use cases.
pub mod services;
/// Use case implementations.
pub mod use_cases;

pub use dto::{FlushReport, IdentifierMigrationReport, MigrationReport, StorageNotice};
pub use services::{ImageStorageService, OfflineQueue, SlideImageResolver, StorageContext};
pub use use_cases::{
    BackendMigrationUseCase, BootstrapStorageUseCase, IdentifierMigrationUseCase,
};
