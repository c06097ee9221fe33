//! Pure domain services.

mod cleanup_planner;
mod publishing_status;

pub use cleanup_planner::{CleanupOptions, CleanupPlanner};
pub use publishing_status::PublishingStatusCalculator;
