//! Application layer: the crawl run and its stages
//!
//! Wires the infrastructure transport, parsers and stores to the domain
//! services. Every stage is sequential within a run.

pub mod category_discovery;
pub mod crawl_pipeline;
pub mod ingestion_reconciler;
pub mod page_walker;

pub use category_discovery::CategoryDiscovery;
pub use crawl_pipeline::{CrawlPipeline, FULL_CRAWL_LABEL};
pub use ingestion_reconciler::IngestionReconciler;
pub use page_walker::{ListingPage, PageCursor, PageWalker, WalkEnd};
