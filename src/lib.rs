//! RTR Price Tracker - category crawler and daily price history
//!
//! Walks the storefront's category listings, normalizes every product tile
//! and records one price per article and day in SQLite.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[doc(hidden)]
pub mod test_utils;

pub use application::CrawlPipeline;
pub use domain::{CrawlStats, PipelineError, Product};
pub use infrastructure::AppConfig;
