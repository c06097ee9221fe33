mod image_store_port;
mod key_value_port;
mod operation_handler_port;
mod published_image_port;
mod queue_storage_port;

pub use image_store_port::ImageStorePort;
pub use key_value_port::KeyValueStore;
pub use operation_handler_port::OperationHandler;
pub use published_image_port::PublishedImagePort;
pub use queue_storage_port::QueueStoragePort;

#[cfg(test)]
pub mod mocks {
    pub use super::operation_handler_port::MockOperationHandler;
    pub use super::published_image_port::mock::MockPublishedImages;
}
