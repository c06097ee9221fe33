//! Domain error types.

mod publish_error;
mod replay_error;
mod storage_error;

pub use publish_error::PublishError;
pub use replay_error::{MigrationRecordError, ReplayError};
pub use storage_error::{StorageError, StorageResult};
