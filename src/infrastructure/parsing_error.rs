//! Listing page parsing errors
//!
//! A parsing error never aborts a crawl: the affected page yields zero
//! products and the walk continues with the next page.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("HTML parsing failed: {message}")]
    HtmlParsingFailed { message: String, url: Option<String> },

    #[error("No products found on page {page_index} of '{category}'")]
    NoProductsFound { page_index: u32, category: String },

    #[error("Side menu '{selector}' not found on {url}")]
    CategoryMenuMissing { selector: String, url: String },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed { url: String, reason: String },
}

impl ParsingError {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Configuration mistakes, as opposed to a page that simply has no data
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidSelector { .. })
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
