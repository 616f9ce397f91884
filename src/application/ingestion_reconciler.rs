//! Ingestion reconciler
//!
//! Decides per product whether to create the article, append today's price
//! or leave everything untouched, and performs the matching writes:
//!
//! | catalog | history for the day | writes                               |
//! |---------|---------------------|--------------------------------------|
//! | absent  | -                   | article, price, latest price         |
//! | present | absent              | price, latest price (+ refresh)      |
//! | present | present             | none                                 |
//!
//! Products are independent. A failed write is reported for that product
//! and the batch goes on; nothing already written is rolled back.

use tracing::{debug, error, info};

use crate::domain::errors::{ReconcileStep, ReconciliationError};
use crate::domain::product::{LastPrice, Product};
use crate::domain::repositories::PriceStores;
use crate::domain::stats::{CrawlStats, ReconcileOutcome};

pub struct IngestionReconciler {
    stores: PriceStores,
    refresh_articles: bool,
}

impl IngestionReconciler {
    pub fn new(stores: PriceStores) -> Self {
        Self {
            stores,
            refresh_articles: false,
        }
    }

    /// Also update changed catalog fields on the append path
    #[must_use]
    pub fn with_article_refresh(mut self, enabled: bool) -> Self {
        self.refresh_articles = enabled;
        self
    }

    /// Reconcile one product; the observation date is the product's own
    pub async fn reconcile(&self, product: &Product) -> Result<ReconcileOutcome, ReconciliationError> {
        self.reconcile_inner(product).await.map(|(outcome, _)| outcome)
    }

    /// Reconcile a deduplicated batch in order
    pub async fn reconcile_batch(&self, products: &[Product]) -> CrawlStats {
        let mut stats = CrawlStats::default();
        for product in products {
            match self.reconcile_inner(product).await {
                Ok((outcome, refreshed)) => {
                    stats.record_outcome(outcome);
                    if refreshed {
                        stats.articles_refreshed += 1;
                    }
                }
                Err(e) => {
                    error!("❌ {}", e);
                    stats.record_reconciliation_error();
                }
            }
        }
        info!(
            "📦 Reconciled {} products: {} created, {} appended, {} skipped ({} errors)",
            products.len(),
            stats.articles_created,
            stats.prices_appended,
            stats.skipped,
            stats.reconciliation_errors
        );
        stats
    }

    async fn reconcile_inner(&self, product: &Product) -> Result<(ReconcileOutcome, bool), ReconciliationError> {
        let id = product.external_id.as_str();
        let fail = |step| move |e: anyhow::Error| ReconciliationError::new(id, step, &e);

        let known = self
            .stores
            .catalog
            .exists_by_external_id(id)
            .await
            .map_err(fail(ReconcileStep::CheckCatalog))?;

        if !known {
            self.stores
                .catalog
                .insert(&product.to_article())
                .await
                .map_err(fail(ReconcileStep::InsertArticle))?;
            self.write_price(product).await?;
            debug!("🆕 Created article {} at {}", id, product.price);
            return Ok((ReconcileOutcome::Created, false));
        }

        let priced_today = self
            .stores
            .history
            .exists_for_date(id, product.observed_on)
            .await
            .map_err(fail(ReconcileStep::CheckHistory))?;
        if priced_today {
            debug!("⏭️ Price of {} for {} already recorded", id, product.observed_on);
            return Ok((ReconcileOutcome::Skipped, false));
        }

        self.write_price(product).await?;
        let refreshed = if self.refresh_articles {
            self.refresh_article(product).await?
        } else {
            false
        };
        debug!("📈 Appended price {} for {}", product.price, id);
        Ok((ReconcileOutcome::Appended, refreshed))
    }

    async fn write_price(&self, product: &Product) -> Result<(), ReconciliationError> {
        let id = product.external_id.as_str();
        self.stores
            .history
            .insert(&product.to_price_record())
            .await
            .map_err(|e| ReconciliationError::new(id, ReconcileStep::InsertPrice, &e))?;
        let latest = LastPrice {
            external_id: product.external_id.clone(),
            price: product.price,
            observed_on: product.observed_on,
        };
        self.stores
            .latest
            .upsert(&latest)
            .await
            .map_err(|e| ReconciliationError::new(id, ReconcileStep::UpsertLatest, &e))
    }

    async fn refresh_article(&self, product: &Product) -> Result<bool, ReconciliationError> {
        let id = product.external_id.as_str();
        let fail = |e: anyhow::Error| ReconciliationError::new(id, ReconcileStep::RefreshArticle, &e);

        let Some(article) = self.stores.catalog.get_by_external_id(id).await.map_err(fail)? else {
            return Ok(false);
        };
        let Some(update) = article.changes_from(product) else {
            return Ok(false);
        };
        self.stores.catalog.update(id, &update).await.map_err(fail)?;
        debug!("✏️ Refreshed catalog entry {}", id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Article, ArticleUpdate, PriceRecord};
    use crate::domain::repositories::{CatalogStore, HistoryStore};
    use crate::infrastructure::memory_repository::InMemoryPriceStore;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn product(id: &str, price: Decimal, observed_on: NaiveDate) -> Product {
        Product {
            category: "Coches".to_string(),
            external_id: id.to_string(),
            name: "Amortiguador Delantero".to_string(),
            price,
            ean: None,
            url: format!("https://www.rtrvalladolid.es/coches/{id}-amortiguador-delantero.html"),
            image_url: String::new(),
            observed_on,
        }
    }

    fn reconciler() -> (Arc<InMemoryPriceStore>, IngestionReconciler) {
        let store = Arc::new(InMemoryPriceStore::new());
        let reconciler = IngestionReconciler::new(store.stores());
        (store, reconciler)
    }

    #[tokio::test]
    async fn test_create_append_skip_paths() -> Result<()> {
        let (store, reconciler) = reconciler();

        let first = product("12345", dec!(89.99), day(19));
        assert_eq!(reconciler.reconcile(&first).await?, ReconcileOutcome::Created);
        assert_eq!(reconciler.reconcile(&first).await?, ReconcileOutcome::Skipped);

        let next_day = product("12345", dec!(85.00), day(20));
        assert_eq!(reconciler.reconcile(&next_day).await?, ReconcileOutcome::Appended);

        assert_eq!(store.article_count().await, 1);
        assert_eq!(store.price_count().await, 2);
        let latest = store.stores().latest.get("12345").await?.unwrap();
        assert_eq!((latest.price, latest.observed_on), (dec!(85.00), day(20)));
        Ok(())
    }

    #[tokio::test]
    async fn test_same_batch_twice_writes_nothing_new() {
        let (store, reconciler) = reconciler();
        let batch: Vec<Product> = (1..=4).map(|i| product(&i.to_string(), dec!(10), day(19))).collect();

        let first = reconciler.reconcile_batch(&batch).await;
        assert_eq!(first.articles_created, 4);

        let second = reconciler.reconcile_batch(&batch).await;
        assert_eq!(second.rows_written(), 0);
        assert_eq!(second.skipped, 4);
        assert_eq!(store.article_count().await, 4);
        assert_eq!(store.price_count().await, 4);
    }

    #[tokio::test]
    async fn test_refresh_updates_changed_catalog_fields() -> Result<()> {
        let store = Arc::new(InMemoryPriceStore::new());
        let reconciler = IngestionReconciler::new(store.stores()).with_article_refresh(true);

        reconciler.reconcile(&product("7", dec!(5), day(19))).await?;
        let mut renamed = product("7", dec!(6), day(20));
        renamed.name = "Amortiguador Delantero Izquierdo".to_string();

        let stats = reconciler.reconcile_batch(&[renamed]).await;
        assert_eq!(stats.prices_appended, 1);
        assert_eq!(stats.articles_refreshed, 1);
        let article = store.stores().catalog.get_by_external_id("7").await?.unwrap();
        assert_eq!(article.name, "Amortiguador Delantero Izquierdo");
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_disabled_leaves_catalog_alone() -> Result<()> {
        let (store, reconciler) = reconciler();
        reconciler.reconcile(&product("7", dec!(5), day(19))).await?;
        let mut renamed = product("7", dec!(6), day(20));
        renamed.name = "Otro nombre".to_string();

        reconciler.reconcile(&renamed).await?;
        let article = store.stores().catalog.get_by_external_id("7").await?.unwrap();
        assert_eq!(article.name, "Amortiguador Delantero");
        Ok(())
    }

    /// History store refusing one article
    struct FailingHistory {
        inner: Arc<InMemoryPriceStore>,
        broken_id: &'static str,
    }

    #[async_trait]
    impl HistoryStore for FailingHistory {
        async fn exists_for_date(&self, external_id: &str, observed_on: NaiveDate) -> Result<bool> {
            HistoryStore::exists_for_date(self.inner.as_ref(), external_id, observed_on).await
        }

        async fn insert(&self, record: &PriceRecord) -> Result<()> {
            if record.external_id == self.broken_id {
                bail!("disk I/O error");
            }
            HistoryStore::insert(self.inner.as_ref(), record).await
        }
    }

    #[tokio::test]
    async fn test_failed_write_is_reported_and_batch_continues() {
        let inner = Arc::new(InMemoryPriceStore::new());
        let stores = PriceStores {
            history: Arc::new(FailingHistory {
                inner: inner.clone(),
                broken_id: "2",
            }),
            ..inner.stores()
        };
        let reconciler = IngestionReconciler::new(stores);
        let batch: Vec<Product> = (1..=3).map(|i| product(&i.to_string(), dec!(1), day(19))).collect();

        let err = reconciler.reconcile(&batch[1]).await.unwrap_err();
        assert_eq!(err.step, ReconcileStep::InsertPrice);
        assert_eq!(err.external_id, "2");

        let stats = reconciler.reconcile_batch(&batch).await;
        assert_eq!(stats.articles_created, 2);
        assert_eq!(stats.reconciliation_errors, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(inner.price_count().await, 2);
    }

    /// Catalog whose lookups always fail
    struct UnreachableCatalog;

    #[async_trait]
    impl CatalogStore for UnreachableCatalog {
        async fn exists_by_external_id(&self, _: &str) -> Result<bool> {
            bail!("database is locked")
        }
        async fn insert(&self, _: &Article) -> Result<()> {
            bail!("database is locked")
        }
        async fn get_by_external_id(&self, _: &str) -> Result<Option<Article>> {
            bail!("database is locked")
        }
        async fn update(&self, _: &str, _: &ArticleUpdate) -> Result<()> {
            bail!("database is locked")
        }
    }

    #[tokio::test]
    async fn test_every_product_fails_but_stats_are_returned() {
        let inner = Arc::new(InMemoryPriceStore::new());
        let stores = PriceStores {
            catalog: Arc::new(UnreachableCatalog),
            ..inner.stores()
        };
        let reconciler = IngestionReconciler::new(stores);

        let stats = reconciler.reconcile_batch(&[product("1", dec!(1), day(19))]).await;
        assert_eq!(stats.rows_written(), 0);
        assert_eq!(stats.reconciliation_errors, 1);

        let err = reconciler.reconcile(&product("1", dec!(1), day(19))).await.unwrap_err();
        assert_eq!(err.step, ReconcileStep::CheckCatalog);
        assert!(err.message.contains("database is locked"));
    }
}
