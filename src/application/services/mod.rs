mod image_storage_service;
mod offline_queue;
mod recurring_task;
mod request_deduplicator;
mod slide_image_resolver;
mod storage_context;
mod usage_monitor;

pub use image_storage_service::ImageStorageService;
pub use offline_queue::{DEFAULT_RETENTION_HOURS, OfflineQueue};
pub use recurring_task::RecurringTask;
pub use request_deduplicator::RequestDeduplicator;
pub use slide_image_resolver::{DEFAULT_DEDUP_TTL, SlideImageResolver};
pub use storage_context::StorageContext;
pub use usage_monitor::UsageMonitor;
