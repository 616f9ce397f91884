//! Store interfaces used by the reconciler and the crawl pipeline
//!
//! Each store is a narrow capability. The reconciler depends on these
//! traits only, so SQLite and in-memory backends are interchangeable.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::product::{Article, ArticleUpdate, LastPrice, PriceRecord, Product};

/// Catalog of known articles, keyed by external ID
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool>;
    async fn insert(&self, article: &Article) -> Result<()>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Article>>;
    async fn update(&self, external_id: &str, update: &ArticleUpdate) -> Result<()>;
}

/// Append-only price history, at most one row per article and day
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn exists_for_date(&self, external_id: &str, observed_on: NaiveDate) -> Result<bool>;
    async fn insert(&self, record: &PriceRecord) -> Result<()>;
}

/// Latest observed price per article
#[async_trait]
pub trait LatestStore: Send + Sync {
    async fn upsert(&self, latest: &LastPrice) -> Result<()>;
    async fn get(&self, external_id: &str) -> Result<Option<LastPrice>>;
}

/// Location of one staged snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHandle {
    pub path: PathBuf,
}

/// Durable staging of a normalized product batch before reconciliation
#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn write_snapshot(&self, label: &str, products: &[Product]) -> Result<SnapshotHandle>;
    async fn read_snapshot(&self, handle: &SnapshotHandle) -> Result<Vec<Product>>;
    async fn delete_snapshot(&self, handle: &SnapshotHandle) -> Result<()>;
}

/// The three persistence collaborators of the reconciler
#[derive(Clone)]
pub struct PriceStores {
    pub catalog: Arc<dyn CatalogStore>,
    pub history: Arc<dyn HistoryStore>,
    pub latest: Arc<dyn LatestStore>,
}
