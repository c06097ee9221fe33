//! Data transfer objects for the application layer.

mod storage_dto;

pub use storage_dto::{FlushReport, IdentifierMigrationReport, MigrationReport, StorageNotice};
