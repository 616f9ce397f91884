//! SQLite implementations of the catalog, history and latest-price stores
//!
//! Prices are stored as canonical decimal strings and observation dates as
//! ISO `YYYY-MM-DD` text.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::product::{Article, ArticleUpdate, LastPrice, PriceRecord};
use crate::domain::repositories::{CatalogStore, HistoryStore, LatestStore, PriceStores};

#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

#[derive(Clone)]
pub struct SqliteLatestStore {
    pool: SqlitePool,
}

/// All three stores over one pool
pub fn sqlite_stores(pool: &SqlitePool) -> PriceStores {
    PriceStores {
        catalog: Arc::new(SqliteCatalogStore::new(pool.clone())),
        history: Arc::new(SqliteHistoryStore::new(pool.clone())),
        latest: Arc::new(SqliteLatestStore::new(pool.clone())),
    }
}

fn parse_price(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("Stored price '{raw}' is not a decimal"))
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: Some(row.try_get("id")?),
        external_id: row.try_get("external_id")?,
        category: row.try_get("category")?,
        name: row.try_get("name")?,
        ean: row.try_get("ean")?,
        article_url: row.try_get("article_url")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE external_id = ?)")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
            (external_id, category, name, ean, article_url, image_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.external_id)
        .bind(&article.category)
        .bind(&article.name)
        .bind(&article.ean)
        .bind(&article.article_url)
        .bind(&article.image_url)
        .bind(article.created_at)
        .bind(article.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert article {}", article.external_id))?;
        Ok(())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Article>> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, category, name, ean, article_url, image_url, created_at, updated_at
            FROM articles
            WHERE external_id = ?
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    async fn update(&self, external_id: &str, update: &ArticleUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE articles SET
                category = COALESCE(?, category),
                name = COALESCE(?, name),
                ean = COALESCE(?, ean),
                article_url = COALESCE(?, article_url),
                image_url = COALESCE(?, image_url),
                updated_at = ?
            WHERE external_id = ?
            "#,
        )
        .bind(&update.category)
        .bind(&update.name)
        .bind(&update.ean)
        .bind(&update.article_url)
        .bind(&update.image_url)
        .bind(Utc::now())
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("Article {external_id} not found");
        }
        Ok(())
    }
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Full history of one article, oldest first
    pub async fn list_for(&self, external_id: &str) -> Result<Vec<PriceRecord>> {
        let rows = sqlx::query(
            "SELECT external_id, price, observed_on FROM price_history WHERE external_id = ? ORDER BY observed_on",
        )
        .bind(external_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<PriceRecord> {
                Ok(PriceRecord {
                    external_id: row.try_get("external_id")?,
                    price: parse_price(row.try_get::<&str, _>("price")?)?,
                    observed_on: row.try_get::<NaiveDate, _>("observed_on")?,
                })
            })
            .collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn exists_for_date(&self, external_id: &str, observed_on: NaiveDate) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM price_history WHERE external_id = ? AND observed_on = ?)",
        )
        .bind(external_id)
        .bind(observed_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert(&self, record: &PriceRecord) -> Result<()> {
        sqlx::query("INSERT INTO price_history (external_id, price, observed_on) VALUES (?, ?, ?)")
            .bind(&record.external_id)
            .bind(record.price.to_string())
            .bind(record.observed_on)
            .execute(&self.pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to insert price of {} for {}",
                    record.external_id, record.observed_on
                )
            })?;
        Ok(())
    }
}

impl SqliteLatestStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LatestStore for SqliteLatestStore {
    async fn upsert(&self, latest: &LastPrice) -> Result<()> {
        // an older observation (snapshot replay) never replaces a newer one
        sqlx::query(
            r#"
            INSERT INTO last_prices (external_id, price, observed_on)
            VALUES (?, ?, ?)
            ON CONFLICT (external_id) DO UPDATE SET
                price = excluded.price,
                observed_on = excluded.observed_on
            WHERE excluded.observed_on >= last_prices.observed_on
            "#,
        )
        .bind(&latest.external_id)
        .bind(latest.price.to_string())
        .bind(latest.observed_on)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert latest price of {}", latest.external_id))?;
        Ok(())
    }

    async fn get(&self, external_id: &str) -> Result<Option<LastPrice>> {
        let row = sqlx::query("SELECT external_id, price, observed_on FROM last_prices WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<LastPrice> {
            Ok(LastPrice {
                external_id: row.try_get("external_id")?,
                price: parse_price(row.try_get::<&str, _>("price")?)?,
                observed_on: row.try_get::<NaiveDate, _>("observed_on")?,
            })
        })
        .transpose()
    }
}
