//! End-to-end crawl runs against scripted storefront pages

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use tempfile::{TempDir, tempdir};

use rtr_price_tracker_lib::application::CrawlPipeline;
use rtr_price_tracker_lib::domain::FetchError;
use rtr_price_tracker_lib::infrastructure::config::utils::listing_page_url;
use rtr_price_tracker_lib::infrastructure::config::{CategoryConfig, ExtractionStrategy};
use rtr_price_tracker_lib::infrastructure::{
    AppConfig, DatabaseConnection, InMemoryPriceStore, JsonStagingStore, SqliteCatalogStore, SqliteHistoryStore,
    sqlite_stores,
};
use rtr_price_tracker_lib::test_utils::{
    ListingItem, ScriptedFetcher, TEST_BASE_URL, listing_html, listing_page, not_found_html,
};

const MOTOS: &str = "https://www.rtrvalladolid.es/12-motos";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn page(index: u32) -> String {
    listing_page_url(MOTOS, "page", index)
}

fn config(staging: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.staging.directory = staging.path().join("temp_data");
    config.retry.delay_secs = 0;
    config.crawling.categories = vec![CategoryConfig {
        name: "Motos".to_string(),
        url: MOTOS.to_string(),
    }];
    config
}

fn shock_absorber_page() -> String {
    listing_page(&[ListingItem::with_slug(
        12345,
        "amortiguador-delantero-izquierdo",
        "Amortiguador Delant...",
        "89,99€",
    )])
}

async fn sqlite(dir: &TempDir) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}", dir.path().join("rtr_prices.db").display());
    let db = DatabaseConnection::new(&url).await?;
    db.migrate().await?;
    Ok(db)
}

#[tokio::test]
async fn fresh_product_takes_the_create_path() -> Result<()> {
    let dir = tempdir()?;
    let db = sqlite(&dir).await?;
    let config = config(&dir);
    let fetcher = ScriptedFetcher::new()
        .page(&page(1), &shock_absorber_page())
        .page(&page(2), &not_found_html());
    let staging = Arc::new(JsonStagingStore::new(&config.staging.directory));
    let pipeline = CrawlPipeline::new(&config, Arc::new(fetcher), sqlite_stores(db.pool()), staging.clone())?;

    let stats = pipeline.run_category_crawl("Motos", today()).await?;

    assert_eq!(stats.articles_created, 1);
    assert_eq!(stats.prices_appended, 0);

    let stores = sqlite_stores(db.pool());
    let article = stores.catalog.get_by_external_id("12345").await?.unwrap();
    assert_eq!(article.name, "Amortiguador Delant Delantero Izquierdo");
    assert_eq!(article.category, "Motos");

    let history = SqliteHistoryStore::new(db.pool().clone()).list_for("12345").await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].price, dec!(89.99));
    assert_eq!(history[0].observed_on, today());

    let latest = stores.latest.get("12345").await?.unwrap();
    assert_eq!((latest.price, latest.observed_on), (dec!(89.99), today()));

    assert!(staging.list_snapshots().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn second_run_on_the_same_day_adds_no_rows() -> Result<()> {
    let dir = tempdir()?;
    let db = sqlite(&dir).await?;
    let config = config(&dir);
    let items = [(1, "Casco integral", "99,00€"), (2, "Guantes", "25,50€"), (1, "Casco integral", "99,00€")];
    let fetcher = ScriptedFetcher::new()
        .page(&page(1), &listing_html(&items))
        .page(&page(2), &not_found_html());
    let staging = Arc::new(JsonStagingStore::new(&config.staging.directory));
    let pipeline = CrawlPipeline::new(&config, Arc::new(fetcher), sqlite_stores(db.pool()), staging)?;

    let first = pipeline.run_full_crawl(today()).await?;
    assert_eq!(first.duplicates_removed, 1);
    assert_eq!(first.articles_created, 2);

    let second = pipeline.run_full_crawl(today()).await?;
    assert_eq!(second.rows_written(), 0);
    assert_eq!(second.skipped, 2);

    assert_eq!(SqliteCatalogStore::new(db.pool().clone()).count().await?, 2);
    assert_eq!(SqliteHistoryStore::new(db.pool().clone()).count().await?, 2);

    let tomorrow = today().succ_opt().unwrap();
    let third = pipeline.run_full_crawl(tomorrow).await?;
    assert_eq!(third.prices_appended, 2);
    assert_eq!(SqliteHistoryStore::new(db.pool().clone()).count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn not_found_page_four_stops_after_three_pages() -> Result<()> {
    let dir = tempdir()?;
    let config = config(&dir);
    let fetcher = ScriptedFetcher::new()
        .page(&page(1), &listing_html(&[(1, "Uno", "1,00€")]))
        .page(&page(2), &listing_html(&[(2, "Dos", "2,00€")]))
        .page(&page(3), &listing_html(&[(3, "Tres", "3,00€")]))
        .page(&page(4), &not_found_html())
        .page(&page(5), &listing_html(&[(5, "Cinco", "5,00€")]));
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(InMemoryPriceStore::new());
    let pipeline = CrawlPipeline::new(
        &config,
        fetcher.clone(),
        store.stores(),
        Arc::new(JsonStagingStore::new(&config.staging.directory)),
    )?;

    let stats = pipeline.run_category_crawl("motos", today()).await?;

    assert_eq!(stats.pages_fetched, 3);
    assert_eq!(stats.articles_created, 3);
    assert_eq!(fetcher.request_count(&page(5)), 0);
    Ok(())
}

#[tokio::test]
async fn aborted_category_still_reconciles_collected_pages() -> Result<()> {
    let dir = tempdir()?;
    let config = config(&dir);
    let fetcher = ScriptedFetcher::new()
        .page(&page(1), &listing_html(&[(1, "Uno", "1,00€"), (2, "Dos", "2,00€")]))
        .error(
            &page(2),
            FetchError::Network {
                url: page(2),
                message: "connection reset by peer".to_string(),
            },
        );
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(InMemoryPriceStore::new());
    let pipeline = CrawlPipeline::new(
        &config,
        fetcher.clone(),
        store.stores(),
        Arc::new(JsonStagingStore::new(&config.staging.directory)),
    )?;

    let stats = pipeline.run_full_crawl(today()).await?;

    assert_eq!(stats.categories_aborted, 1);
    assert_eq!(stats.articles_created, 2);
    assert_eq!(store.article_count().await, 2);
    // non-timeout failures are never retried
    assert_eq!(fetcher.request_count(&page(2)), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried_with_backoff() -> Result<()> {
    let dir = tempdir()?;
    let mut config = config(&dir);
    config.retry.delay_secs = 5;
    let fetcher = ScriptedFetcher::new()
        .timeouts(&page(1), 2)
        .page(&page(1), &listing_html(&[(1, "Uno", "1,00€")]))
        .timeouts(&page(2), 6);
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(InMemoryPriceStore::new());
    let pipeline = CrawlPipeline::new(
        &config,
        fetcher.clone(),
        store.stores(),
        Arc::new(JsonStagingStore::new(&config.staging.directory)),
    )?;

    let started = tokio::time::Instant::now();
    let stats = pipeline.run_full_crawl(today()).await?;

    assert_eq!(fetcher.request_count(&page(1)), 3);
    assert_eq!(fetcher.request_count(&page(2)), 5);
    assert_eq!(stats.pages_fetched, 1);
    assert_eq!(stats.categories_aborted, 1);
    assert_eq!(stats.articles_created, 1);
    assert!(started.elapsed() >= Duration::from_secs(30));
    Ok(())
}

#[tokio::test]
async fn invalid_rows_are_rejected_without_affecting_siblings() -> Result<()> {
    let dir = tempdir()?;
    let config = config(&dir);
    let bad_price = ListingItem::new(1, "Pastillas", "consultar");
    let mut no_id = ListingItem::new(2, "Bujia", "3,00€");
    no_id.detail_url = format!("{TEST_BASE_URL}/content/condiciones.html");
    let good = ListingItem::new(3, "Disco freno", "1.234,56€");
    let fetcher = ScriptedFetcher::new()
        .page(&page(1), &listing_page(&[bad_price, no_id, good]))
        .page(&page(2), &not_found_html());
    let store = Arc::new(InMemoryPriceStore::new());
    let pipeline = CrawlPipeline::new(
        &config,
        Arc::new(fetcher),
        store.stores(),
        Arc::new(JsonStagingStore::new(&config.staging.directory)),
    )?;

    let stats = pipeline.run_full_crawl(today()).await?;

    assert_eq!(stats.products_extracted, 3);
    assert_eq!(stats.products_rejected, 2);
    assert_eq!(stats.articles_created, 1);
    assert_eq!(store.prices_for("3").await[0].price, dec!(1234.56));
    Ok(())
}

#[tokio::test]
async fn positional_strategy_reads_well_formed_pages() -> Result<()> {
    let dir = tempdir()?;
    let mut config = config(&dir);
    config.crawling.extraction_strategy = ExtractionStrategy::Positional;
    let fetcher = ScriptedFetcher::new()
        .page(&page(1), &listing_html(&[(1, "Uno", "1,00€"), (2, "Dos", "2,00€")]))
        .page(&page(2), &not_found_html());
    let store = Arc::new(InMemoryPriceStore::new());
    let pipeline = CrawlPipeline::new(
        &config,
        Arc::new(fetcher),
        store.stores(),
        Arc::new(JsonStagingStore::new(&config.staging.directory)),
    )?;

    let stats = pipeline.run_full_crawl(today()).await?;

    assert_eq!(stats.articles_created, 2);
    assert_eq!(store.prices_for("2").await[0].price, dec!(2.00));
    Ok(())
}
