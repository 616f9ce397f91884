//! Listing page extraction
//!
//! Reads candidate product rows from one storefront listing page. Two
//! strategies are available: `Scoped` reads each field inside its product
//! block, `Positional` queries the four fields page-wide and zips the
//! lists by index, padding the shorter ones with empty values.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::config::ListingSelectors;
use super::{ContextualParser, ParseContext, ParsingError, ParsingResult};
use crate::domain::product::RawProduct;
use crate::infrastructure::config::{ExtractionStrategy, utils::resolve_url};

/// Compiled listing selectors plus the extraction strategy
pub struct ProductExtractor {
    strategy: ExtractionStrategy,
    container_selectors: Vec<Selector>,
    detail_link_container: Selector,
    anchor: Selector,
    name: Selector,
    price: Selector,
    thumbnail: Selector,
    image: Selector,
    image_attribute: String,
    not_found_marker: Selector,
}

impl ProductExtractor {
    pub fn new(strategy: ExtractionStrategy) -> ParsingResult<Self> {
        Self::with_config(&ListingSelectors::default(), strategy)
    }

    pub fn with_config(selectors: &ListingSelectors, strategy: ExtractionStrategy) -> ParsingResult<Self> {
        let container_selectors = selectors
            .product_container
            .iter()
            .map(|s| compile_selector(s))
            .collect::<ParsingResult<Vec<_>>>()?;

        Ok(Self {
            strategy,
            container_selectors,
            detail_link_container: compile_selector(&selectors.detail_link_container)?,
            anchor: compile_selector("a")?,
            name: compile_selector(&selectors.name)?,
            price: compile_selector(&selectors.price)?,
            thumbnail: compile_selector(&selectors.thumbnail)?,
            image: compile_selector("img")?,
            image_attribute: selectors.image_attribute.clone(),
            not_found_marker: compile_selector(&selectors.not_found_marker)?,
        })
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    /// Parse a fetched body and extract its rows
    pub fn extract(&self, body: &str, context: &ParseContext) -> ParsingResult<Vec<RawProduct>> {
        if body.trim().is_empty() {
            return Err(ParsingError::HtmlParsingFailed {
                message: "empty response body".to_string(),
                url: None,
            });
        }
        let document = Html::parse_document(body);
        self.parse_with_context(&document, context)
    }

    /// Whether the page is the storefront's "no more results" page
    pub fn is_not_found_page(&self, body: &str) -> bool {
        Html::parse_document(body)
            .select(&self.not_found_marker)
            .next()
            .is_some()
    }

    fn extract_scoped(&self, document: &Html, context: &ParseContext) -> Vec<RawProduct> {
        let Some(blocks) = self
            .container_selectors
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|blocks| !blocks.is_empty())
        else {
            return Vec::new();
        };

        debug!("Found {} product blocks on page {}", blocks.len(), context.page_index);

        blocks
            .iter()
            .filter_map(|block| {
                let detail_url = self.detail_href(*block)?;
                let mut raw = RawProduct::new(&context.category);
                raw.detail_url = resolve_url(&context.base_url, &detail_url).unwrap_or(detail_url);
                raw.name = block.select(&self.name).next().map(element_text).unwrap_or_default();
                raw.price_text = block.select(&self.price).next().map(element_text).unwrap_or_default();
                raw.image_url = self
                    .thumbnail_image(*block)
                    .and_then(|src| resolve_url(&context.base_url, &src))
                    .unwrap_or_default();
                Some(raw)
            })
            .collect()
    }

    fn extract_positional(&self, document: &Html, context: &ParseContext) -> Vec<RawProduct> {
        let hrefs: Vec<String> = document
            .select(&self.detail_link_container)
            .map(|container| self.detail_href(container).unwrap_or_default())
            .collect();
        let names: Vec<String> = document.select(&self.name).map(element_text).collect();
        let prices: Vec<String> = document.select(&self.price).map(element_text).collect();
        let images: Vec<String> = document
            .select(&self.thumbnail)
            .map(|thumb| self.thumbnail_image(thumb).unwrap_or_default())
            .collect();

        let rows = hrefs.len().max(names.len()).max(prices.len()).max(images.len());
        if hrefs.len() != rows || names.len() != rows || prices.len() != rows || images.len() != rows {
            debug!(
                "Unequal field lists on page {} (links {}, names {}, prices {}, images {})",
                context.page_index,
                hrefs.len(),
                names.len(),
                prices.len(),
                images.len()
            );
        }

        let field = |list: &[String], i: usize| list.get(i).cloned().unwrap_or_default();
        (0..rows)
            .filter_map(|i| {
                let href = field(&hrefs, i);
                if href.is_empty() {
                    return None;
                }
                let mut raw = RawProduct::new(&context.category);
                raw.detail_url = resolve_url(&context.base_url, &href).unwrap_or(href);
                raw.name = field(&names, i);
                raw.price_text = field(&prices, i);
                raw.image_url = resolve_url(&context.base_url, &field(&images, i)).unwrap_or_default();
                Some(raw)
            })
            .collect()
    }

    /// First anchor href inside the detail-link container, if non-empty
    fn detail_href(&self, scope: ElementRef<'_>) -> Option<String> {
        let container = if scope.value().name() == "div" && self.detail_link_container.matches(&scope) {
            scope
        } else {
            scope.select(&self.detail_link_container).next()?
        };
        container
            .select(&self.anchor)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string)
    }

    fn thumbnail_image(&self, scope: ElementRef<'_>) -> Option<String> {
        let thumbnail = if self.thumbnail.matches(&scope) {
            scope
        } else {
            scope.select(&self.thumbnail).next()?
        };
        thumbnail
            .select(&self.image)
            .next()
            .and_then(|img| img.value().attr(&self.image_attribute))
            .map(str::to_string)
    }
}

impl ContextualParser for ProductExtractor {
    type Output = Vec<RawProduct>;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        let rows = match self.strategy {
            ExtractionStrategy::Scoped => self.extract_scoped(html, context),
            ExtractionStrategy::Positional => self.extract_positional(html, context),
        };

        if rows.is_empty() {
            return Err(ParsingError::NoProductsFound {
                page_index: context.page_index,
                category: context.category.clone(),
            });
        }

        debug!(
            "Extracted {} rows from page {} of '{}'",
            rows.len(),
            context.page_index,
            context.category
        );
        Ok(rows)
    }
}

fn compile_selector(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e))
}

/// Element text with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}
