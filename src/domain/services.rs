//! Domain services
//!
//! Stateless transformations applied to a crawled batch before it reaches
//! the stores.

pub mod deduplicator;
pub mod product_normalizer;

pub use deduplicator::{Deduplicated, Deduplicator, DuplicateStats};
pub use product_normalizer::{ProductNormalizer, UrlInfo};
