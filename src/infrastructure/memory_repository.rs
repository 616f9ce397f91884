//! In-memory stores for dry runs and tests
//!
//! Enforces the same uniqueness rules as the SQLite schema.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::product::{Article, ArticleUpdate, LastPrice, PriceRecord};
use crate::domain::repositories::{CatalogStore, HistoryStore, LatestStore, PriceStores};

#[derive(Debug, Default)]
struct State {
    articles: HashMap<String, Article>,
    next_id: i64,
    history: BTreeMap<(String, NaiveDate), PriceRecord>,
    latest: HashMap<String, LastPrice>,
}

#[derive(Debug, Default)]
pub struct InMemoryPriceStore {
    state: RwLock<State>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// This store behind all three store interfaces
    pub fn stores(self: &Arc<Self>) -> PriceStores {
        PriceStores {
            catalog: self.clone(),
            history: self.clone(),
            latest: self.clone(),
        }
    }

    pub async fn article_count(&self) -> usize {
        self.state.read().await.articles.len()
    }

    pub async fn price_count(&self) -> usize {
        self.state.read().await.history.len()
    }

    /// History of one article, oldest first
    pub async fn prices_for(&self, external_id: &str) -> Vec<PriceRecord> {
        self.state
            .read()
            .await
            .history
            .values()
            .filter(|r| r.external_id == external_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogStore for InMemoryPriceStore {
    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool> {
        Ok(self.state.read().await.articles.contains_key(external_id))
    }

    async fn insert(&self, article: &Article) -> Result<()> {
        let mut state = self.state.write().await;
        if state.articles.contains_key(&article.external_id) {
            bail!("Article {} already exists", article.external_id);
        }
        state.next_id += 1;
        let mut stored = article.clone();
        stored.id = Some(state.next_id);
        state.articles.insert(article.external_id.clone(), stored);
        Ok(())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Article>> {
        Ok(self.state.read().await.articles.get(external_id).cloned())
    }

    async fn update(&self, external_id: &str, update: &ArticleUpdate) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(article) = state.articles.get_mut(external_id) else {
            bail!("Article {external_id} not found");
        };
        if !update.is_empty() {
            update.apply_to(article);
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryPriceStore {
    async fn exists_for_date(&self, external_id: &str, observed_on: NaiveDate) -> Result<bool> {
        let key = (external_id.to_string(), observed_on);
        Ok(self.state.read().await.history.contains_key(&key))
    }

    async fn insert(&self, record: &PriceRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.articles.contains_key(&record.external_id) {
            bail!("Price for unknown article {}", record.external_id);
        }
        let key = (record.external_id.clone(), record.observed_on);
        if state.history.contains_key(&key) {
            bail!(
                "Price of {} for {} already recorded",
                record.external_id,
                record.observed_on
            );
        }
        state.history.insert(key, record.clone());
        Ok(())
    }
}

#[async_trait]
impl LatestStore for InMemoryPriceStore {
    async fn upsert(&self, latest: &LastPrice) -> Result<()> {
        let mut state = self.state.write().await;
        let is_newer = state
            .latest
            .get(&latest.external_id)
            .is_none_or(|current| latest.observed_on >= current.observed_on);
        if is_newer {
            state.latest.insert(latest.external_id.clone(), latest.clone());
        }
        Ok(())
    }

    async fn get(&self, external_id: &str) -> Result<Option<LastPrice>> {
        Ok(self.state.read().await.latest.get(external_id).cloned())
    }
}
