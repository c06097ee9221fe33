//! Slidecache - offline-first image storage for slide decks.
//!
//! This crate keeps slide images in a durable local store with quota-aware
//! cleanup, migrates data from the legacy key-value area, resolves which image
//! a slide shows (published beats local), and queues side effects while
//! offline for replay once connectivity returns.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing services, use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "slidecache";
