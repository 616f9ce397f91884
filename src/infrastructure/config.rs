//! Configuration infrastructure
//!
//! `AppConfig` is assembled from three layers, later ones winning:
//! 1. built-in defaults (`defaults` module)
//! 2. an optional TOML or JSON file
//! 3. `RTR__<SECTION>__<FIELD>` environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::infrastructure::parsing::ParsingConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub crawling: CrawlingConfig,
    pub retry: RetryConfig,
    pub staging: StagingConfig,
    pub database: DatabaseConfig,
    pub reconcile: ReconcileConfig,
    pub logging: LoggingConfig,
    pub parsing: ParsingConfig,
}

/// Storefront location and request identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub request_timeout_secs: u64,
    /// Politeness limit, `0` disables it
    pub max_requests_per_second: u32,
}

/// How listing pages are walked and read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingConfig {
    pub max_pages_per_category: u32,
    pub page_query_param: String,
    pub extraction_strategy: ExtractionStrategy,
    /// Fixed category list; discovered from the side menu when empty
    pub categories: Vec<CategoryConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// Fields read inside each product block
    #[default]
    Scoped,
    /// Four page-wide lists aligned by index
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub directory: PathBuf,
    /// Keep snapshots even after a successful reconciliation
    pub keep_snapshot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Update changed catalog fields when appending a price
    pub refresh_articles: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or full `EnvFilter` directive
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,
    /// Number of log files to keep
    pub max_files: u32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: rtr_site::BASE_URL.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            accept_language: defaults::ACCEPT_LANGUAGE.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            max_pages_per_category: defaults::MAX_PAGES_PER_CATEGORY,
            page_query_param: rtr_site::PAGE_QUERY_PARAM.to_string(),
            extraction_strategy: ExtractionStrategy::default(),
            categories: Vec::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_ATTEMPTS,
            delay_secs: defaults::RETRY_DELAY_SECONDS,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::STAGING_DIR),
            keep_snapshot: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            max_files: defaults::LOG_MAX_FILES,
        }
    }
}

impl AppConfig {
    /// Defaults, then `path` if given, then `RTR__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Validation {
                message: message.to_string(),
            })
        };

        if url::Url::parse(&self.site.base_url).is_err() {
            return invalid("site.base_url must be an absolute URL");
        }
        if self.site.request_timeout_secs == 0 {
            return invalid("site.request_timeout_secs must be greater than 0");
        }
        if self.crawling.max_pages_per_category == 0 {
            return invalid("crawling.max_pages_per_category must be greater than 0");
        }
        if self.crawling.page_query_param.trim().is_empty() {
            return invalid("crawling.page_query_param cannot be empty");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be greater than 0");
        }
        if self
            .crawling
            .categories
            .iter()
            .any(|c| c.name.trim().is_empty() || c.url.trim().is_empty())
        {
            return invalid("crawling.categories entries need a name and a url");
        }
        if self.database.url.trim().is_empty() {
            return invalid("database.url cannot be empty");
        }
        Ok(())
    }
}

/// Reads and writes the per-user JSON config file
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Write the default configuration if no file exists yet
    pub async fn initialize_on_first_run(&self) -> Result<()> {
        let exists = fs::try_exists(&self.config_path)
            .await
            .with_context(|| format!("Failed to check {}", self.config_path.display()))?;
        if exists {
            return Ok(());
        }
        info!("🎉 First run detected - writing default configuration");
        self.save_config(&AppConfig::default()).await
    }

    /// Load the file through the layered loader, so env overrides still apply
    pub async fn load_config(&self) -> Result<AppConfig> {
        self.initialize_on_first_run().await?;
        let config = AppConfig::load(Some(self.config_path.as_path()))
            .with_context(|| format!("Failed to load {}", self.config_path.display()))?;
        info!("Loaded configuration from: {}", self.config_path.display());
        Ok(config)
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {}", self.config_path.display());
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Storefront URLs and markup constants
pub mod rtr_site {
    pub const BASE_URL: &str = "https://www.rtrvalladolid.es";

    pub const PAGE_QUERY_PARAM: &str = "page";
}

pub mod defaults {
    pub const APP_DIR_NAME: &str = "rtr-price-tracker";
    pub const CONFIG_FILE_NAME: &str = "rtr_price_tracker_config.json";
    pub const ENV_PREFIX: &str = "RTR";

    pub const USER_AGENT: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
    pub const ACCEPT_LANGUAGE: &str = "es-ES,es;q=0.9";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    /// Walk cap when the not-found page never shows up
    pub const MAX_PAGES_PER_CATEGORY: u32 = 9;

    pub const RETRY_ATTEMPTS: u32 = 5;
    pub const RETRY_DELAY_SECONDS: u64 = 5;

    pub const STAGING_DIR: &str = "temp_data";

    pub const DATABASE_URL: &str = "sqlite://rtr_prices.db";
    pub const DB_MAX_CONNECTIONS: u32 = 5;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_MAX_FILES: u32 = 5;
}

/// URL building helper functions
pub mod utils {
    use url::Url;

    /// Listing page `index` of a category (`<category>?page=<index>`)
    pub fn listing_page_url(category_url: &str, page_param: &str, index: u32) -> String {
        match Url::parse(category_url) {
            Ok(mut url) => {
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(k, _)| k != page_param)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(kept)
                    .append_pair(page_param, &index.to_string());
                url.to_string()
            }
            Err(_) => format!("{category_url}?{page_param}={index}"),
        }
    }

    /// Resolve a possibly relative href against the site base URL
    pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        if href.starts_with("http://") || href.starts_with("https://") {
            return Some(href.to_string());
        }
        Url::parse(base_url)
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .ok()
    }
}
