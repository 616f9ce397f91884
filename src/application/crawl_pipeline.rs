//! Scrape-and-store orchestration
//!
//! One sequential worker per run: categories one after the other, pages in
//! order inside a category. Each run walks and extracts, normalizes,
//! deduplicates the whole batch once, stages it as a snapshot and then
//! reconciles it against the stores.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::category_discovery::CategoryDiscovery;
use crate::application::ingestion_reconciler::IngestionReconciler;
use crate::application::page_walker::PageWalker;
use crate::domain::errors::PipelineError;
use crate::domain::product::Product;
use crate::domain::repositories::{PriceStores, SnapshotHandle, StagingStore};
use crate::domain::services::{Deduplicator, ProductNormalizer};
use crate::domain::stats::CrawlStats;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::PageFetcher;
use crate::infrastructure::parsing::{CategoryLink, CategoryMenuParser, ParseContext, ProductExtractor};
use crate::infrastructure::retry_manager::{RetryPolicy, RetryingRunner};

/// Snapshot label of a full crawl
pub const FULL_CRAWL_LABEL: &str = "all";

pub struct CrawlPipeline {
    discovery: CategoryDiscovery,
    walker: PageWalker,
    extractor: Arc<ProductExtractor>,
    normalizer: ProductNormalizer,
    deduplicator: Deduplicator,
    reconciler: IngestionReconciler,
    staging: Arc<dyn StagingStore>,
    base_url: String,
    keep_snapshot: bool,
}

impl CrawlPipeline {
    /// Wire every stage from the configuration
    pub fn new(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        stores: PriceStores,
        staging: Arc<dyn StagingStore>,
    ) -> Result<Self, PipelineError> {
        let configuration = |e: &dyn std::fmt::Display| PipelineError::Configuration { message: e.to_string() };

        let runner = RetryingRunner::new(RetryPolicy::from(&config.retry));
        let extractor = Arc::new(
            ProductExtractor::with_config(&config.parsing.listing, config.crawling.extraction_strategy)
                .map_err(|e| configuration(&e))?,
        );
        let menu_parser = CategoryMenuParser::with_config(&config.parsing.category_menu).map_err(|e| configuration(&e))?;

        Ok(Self {
            discovery: CategoryDiscovery::new(
                fetcher.clone(),
                runner.clone(),
                menu_parser,
                &config.site.base_url,
                &config.crawling.categories,
            ),
            walker: PageWalker::new(
                fetcher,
                runner,
                extractor.clone(),
                config.crawling.max_pages_per_category,
                &config.crawling.page_query_param,
            ),
            extractor,
            normalizer: ProductNormalizer::new(),
            deduplicator: Deduplicator::new(),
            reconciler: IngestionReconciler::new(stores).with_article_refresh(config.reconcile.refresh_articles),
            staging,
            base_url: config.site.base_url.clone(),
            keep_snapshot: config.staging.keep_snapshot,
        })
    }

    #[must_use]
    pub fn with_keep_snapshot(mut self, keep: bool) -> Self {
        self.keep_snapshot = keep;
        self
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryLink>, PipelineError> {
        self.discovery.try_discover().await
    }

    /// Crawl every category into one batch
    pub async fn run_full_crawl(&self, today: NaiveDate) -> Result<CrawlStats, PipelineError> {
        let categories = self.discovery.discover().await;
        info!("🚀 Full crawl of {} categories for {}", categories.len(), today);

        let mut stats = CrawlStats::default();
        let mut batch = Vec::new();
        for category in &categories {
            let (products, category_stats) = self.collect_category(category, today).await;
            stats.merge(&category_stats);
            batch.extend(products);
        }

        self.finish_run(FULL_CRAWL_LABEL, batch, stats).await
    }

    /// Crawl one category looked up by name
    pub async fn run_category_crawl(&self, name: &str, today: NaiveDate) -> Result<CrawlStats, PipelineError> {
        let category = self.discovery.find(name).await?;
        info!("🚀 Crawl of '{}' for {}", category.name, today);

        let (products, stats) = self.collect_category(&category, today).await;
        self.finish_run(&category.name, products, stats).await
    }

    /// Reconcile a snapshot left behind by an earlier run.
    ///
    /// Observation dates come from the snapshot itself.
    pub async fn recover_from_snapshot(&self, handle: &SnapshotHandle) -> Result<CrawlStats, PipelineError> {
        let products = self
            .staging
            .read_snapshot(handle)
            .await
            .map_err(|e| PipelineError::staging(&e))?;
        info!("♻️ Recovering {} products from {}", products.len(), handle.path.display());

        let stats = self.reconciler.reconcile_batch(&products).await;
        self.release_snapshot(handle, &stats).await;
        Ok(stats)
    }

    /// Walk, extract and normalize one category
    async fn collect_category(&self, category: &CategoryLink, today: NaiveDate) -> (Vec<Product>, CrawlStats) {
        let mut stats = CrawlStats::default();
        let mut products = Vec::new();

        let mut cursor = self.walker.walk(&category.url);
        while let Some(page) = cursor.next().await {
            stats.pages_fetched += 1;
            let context = ParseContext::new(page.index, &category.name, &self.base_url);
            let raws = match self.extractor.extract(&page.body, &context) {
                Ok(raws) => raws,
                Err(e) => {
                    warn!("⚠️ Page {} of '{}' yielded no products: {}", page.index, category.name, e);
                    continue;
                }
            };
            stats.products_extracted += u32::try_from(raws.len()).unwrap_or(u32::MAX);

            let (valid, rejected) = self.normalizer.normalize_all(&raws, today);
            stats.products_rejected += rejected;
            products.extend(valid);
        }

        stats.categories_processed += 1;
        if cursor.aborted() {
            stats.categories_aborted += 1;
            warn!(
                "⚠️ '{}' aborted after {} pages, keeping {} products",
                category.name,
                stats.pages_fetched,
                products.len()
            );
        } else {
            info!(
                "📄 '{}': {} pages, {} products ({:?})",
                category.name,
                stats.pages_fetched,
                products.len(),
                cursor.end()
            );
        }
        (products, stats)
    }

    /// Deduplicate, stage, reconcile
    async fn finish_run(&self, label: &str, batch: Vec<Product>, mut stats: CrawlStats) -> Result<CrawlStats, PipelineError> {
        let overlap = self.deduplicator.duplicate_stats(&batch);
        if overlap.duplicates_count > 0 {
            debug!("🔁 Repeated ids in '{}': {:?}", label, overlap.duplicate_ids);
        }
        let deduplicated = self.deduplicator.deduplicate(batch);
        stats.duplicates_removed += u32::try_from(deduplicated.removed()).unwrap_or(u32::MAX);

        if deduplicated.products.is_empty() {
            warn!("⚠️ Nothing to reconcile for '{}'", label);
            return Ok(stats);
        }

        let handle = self
            .staging
            .write_snapshot(label, &deduplicated.products)
            .await
            .map_err(|e| PipelineError::staging(&e))?;

        let reconciled = self.reconciler.reconcile_batch(&deduplicated.products).await;
        stats.merge(&reconciled);
        self.release_snapshot(&handle, &stats).await;

        info!(
            "🏁 '{}' done: {} created, {} appended, {} skipped",
            label, stats.articles_created, stats.prices_appended, stats.skipped
        );
        Ok(stats)
    }

    async fn release_snapshot(&self, handle: &SnapshotHandle, stats: &CrawlStats) {
        if self.keep_snapshot || stats.rows_written() == 0 {
            info!("💾 Keeping snapshot {}", handle.path.display());
            return;
        }
        if let Err(e) = self.staging.delete_snapshot(handle).await {
            warn!("⚠️ Could not delete snapshot {}: {:#}", handle.path.display(), e);
        }
    }
}
