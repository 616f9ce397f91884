use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use rtr_price_tracker_lib::application::CrawlPipeline;
use rtr_price_tracker_lib::domain::{CrawlStats, PipelineError, PriceStores, SnapshotHandle};
use rtr_price_tracker_lib::infrastructure::{
    AppConfig, ConfigManager, DatabaseConnection, HttpClientConfig, HttpFetcher, InMemoryPriceStore, JsonStagingStore,
    init_logging_with_config, sqlite_stores,
};

#[derive(Parser, Debug)]
#[command(name = "rtr-price-tracker", version, about = "Daily price tracker for the RTR Valladolid storefront")]
struct Cli {
    /// Configuration file (TOML or JSON); the per-user config is used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every category, or one with --category
    Crawl {
        /// Category name as shown in the side menu
        #[arg(long)]
        category: Option<String>,
        /// Reconcile against in-memory stores instead of the database
        #[arg(long)]
        dry_run: bool,
        /// Keep the staged snapshot after reconciliation
        #[arg(long)]
        keep_snapshot: bool,
    },
    /// Reconcile a snapshot left behind by an interrupted run
    Recover { snapshot: PathBuf },
    /// List the storefront categories
    Categories,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn configuration_error(e: &anyhow::Error) -> PipelineError {
    PipelineError::Configuration {
        message: format!("{e:#}"),
    }
}

async fn load_config(path: Option<&Path>) -> Result<AppConfig, PipelineError> {
    match path {
        Some(path) => AppConfig::load(Some(path)).map_err(|e| PipelineError::Configuration { message: e.to_string() }),
        None => {
            let manager = ConfigManager::new().map_err(|e| configuration_error(&e))?;
            manager.load_config().await.map_err(|e| configuration_error(&e))
        }
    }
}

async fn open_stores(config: &AppConfig, dry_run: bool) -> Result<PriceStores, PipelineError> {
    if dry_run {
        info!("🧪 Dry run: nothing is written to {}", config.database.url);
        return Ok(Arc::new(InMemoryPriceStore::new()).stores());
    }

    let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| configuration_error(&e))?;
    db.migrate().await.map_err(|e| configuration_error(&e))?;
    Ok(sqlite_stores(db.pool()))
}

async fn build_pipeline(config: &AppConfig, dry_run: bool) -> Result<CrawlPipeline, PipelineError> {
    let fetcher = HttpFetcher::new(HttpClientConfig::from(&config.site)).map_err(|e| configuration_error(&e))?;
    let stores = open_stores(config, dry_run).await?;
    let staging = Arc::new(JsonStagingStore::new(&config.staging.directory));
    CrawlPipeline::new(config, Arc::new(fetcher), stores, staging)
}

fn print_stats(stats: &CrawlStats) {
    match serde_json::to_string_pretty(stats) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{stats:?}"),
    }
}

async fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = load_config(cli.config.as_deref()).await?;
    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    match cli.command {
        Command::Crawl {
            category,
            dry_run,
            keep_snapshot,
        } => {
            let pipeline = build_pipeline(&config, dry_run)
                .await?
                .with_keep_snapshot(keep_snapshot || config.staging.keep_snapshot);
            let today = chrono::Local::now().date_naive();
            let stats = match category {
                Some(name) => pipeline.run_category_crawl(&name, today).await?,
                None => pipeline.run_full_crawl(today).await?,
            };
            print_stats(&stats);
        }
        Command::Recover { snapshot } => {
            let pipeline = build_pipeline(&config, false).await?;
            let stats = pipeline.recover_from_snapshot(&SnapshotHandle { path: snapshot }).await?;
            print_stats(&stats);
        }
        Command::Categories => {
            let pipeline = build_pipeline(&config, true).await?;
            for category in pipeline.list_categories().await? {
                println!("{}\t{}", category.name, category.url);
            }
        }
    }
    Ok(())
}
