//! HTML parsing infrastructure for the storefront
//!
//! Trait-based parsers over `scraper` documents with typed errors.

pub mod category_menu_parser;
pub mod config;
pub mod context;
pub mod product_list_parser;

pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use category_menu_parser::{CategoryLink, CategoryMenuParser};
pub use self::config::{CategoryMenuSelectors, ListingSelectors, ParsingConfig};
pub use context::ParseContext;
pub use product_list_parser::ProductExtractor;

use scraper::Html;

/// Parser over an already-built document with contextual information
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}
