//! Infrastructure layer: transport, HTML parsing, persistence and runtime wiring
//!
//! Everything here implements a domain interface or supports one. The
//! application layer only sees the traits and the re-exports below.

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod memory_repository;
pub mod parsing;
pub mod parsing_error;
pub mod price_repository;
pub mod retry_manager;
pub mod staging_store;

pub use self::config::{AppConfig, ConfigManager, ExtractionStrategy, rtr_site};
pub use database_connection::DatabaseConnection;
pub use http_client::{FetchedPage, HttpClientConfig, HttpFetcher, PageFetcher};
pub use logging::{get_log_directory, init_logging_with_config};
pub use memory_repository::InMemoryPriceStore;
pub use parsing::{CategoryLink, CategoryMenuParser, ParseContext, ParsingConfig, ProductExtractor};
pub use parsing_error::{ParsingError, ParsingResult};
pub use price_repository::{SqliteCatalogStore, SqliteHistoryStore, SqliteLatestStore, sqlite_stores};
pub use retry_manager::{RetryOutcome, RetryPolicy, Retryable, RetryingRunner};
pub use staging_store::JsonStagingStore;
