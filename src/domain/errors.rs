//! Error taxonomy of the crawl pipeline
//!
//! Each error type belongs to one boundary: transport (`FetchError`),
//! product normalization (`ValidationError`), persistence
//! (`ReconciliationError`) and whole-run failures (`PipelineError`).
//! Only `PipelineError` ever escapes a crawl run.

use std::fmt;
use thiserror::Error;

/// Failure of a single HTTP GET
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out after {timeout_secs}s: {url}")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url, .. } | Self::Network { url, .. } | Self::Status { url, .. } => url,
        }
    }
}

/// Per-product normalization failure; the item is dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Detail URL is empty")]
    EmptyUrl,

    #[error("No external ID segment ('-<digits>...html') in detail URL: {url}")]
    MissingExternalId { url: String },

    #[error("Price '{raw}' is not a valid decimal")]
    InvalidPrice { raw: String },

    #[error("Price '{raw}' is negative")]
    NegativePrice { raw: String },

    #[error("Product name is empty and cannot be derived from {url}")]
    EmptyName { url: String },
}

/// Persistence step at which a reconciliation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    CheckCatalog,
    InsertArticle,
    CheckHistory,
    InsertPrice,
    UpsertLatest,
    RefreshArticle,
}

impl fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CheckCatalog => "check_catalog",
            Self::InsertArticle => "insert_article",
            Self::CheckHistory => "check_history",
            Self::InsertPrice => "insert_price",
            Self::UpsertLatest => "upsert_latest",
            Self::RefreshArticle => "refresh_article",
        };
        f.write_str(name)
    }
}

/// Per-product persistence failure; the item is counted as skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Reconciliation failed for {external_id} at {step}: {message}")]
pub struct ReconciliationError {
    pub external_id: String,
    pub step: ReconcileStep,
    pub message: String,
}

impl ReconciliationError {
    pub fn new(external_id: &str, step: ReconcileStep, source: &anyhow::Error) -> Self {
        Self {
            external_id: external_id.to_string(),
            step,
            message: format!("{source:#}"),
        }
    }
}

/// Fatal failure of a crawl run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Staging store failure: {message}")]
    Staging { message: String },

    #[error("Unknown category: {name}")]
    UnknownCategory { name: String },

    #[error("Category discovery failed: {message}")]
    CategoryDiscovery { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl PipelineError {
    pub fn staging(source: &anyhow::Error) -> Self {
        Self::Staging {
            message: format!("{source:#}"),
        }
    }
}
