//! Domain module - products, store interfaces and the pure pipeline stages
//!
//! Nothing in here performs I/O; fetchers, parsers and stores live in
//! `infrastructure`, orchestration lives in `application`.

pub mod errors;
pub mod product;
pub mod repositories;
pub mod services;
pub mod stats;

pub use errors::{FetchError, PipelineError, ReconcileStep, ReconciliationError, ValidationError};
pub use product::{Article, ArticleUpdate, LastPrice, PriceRecord, Product, RawProduct};
pub use repositories::{CatalogStore, HistoryStore, LatestStore, PriceStores, SnapshotHandle, StagingStore};
pub use stats::{CrawlStats, ReconcileOutcome};
