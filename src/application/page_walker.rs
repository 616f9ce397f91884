//! Listing page traversal for one category
//!
//! Pages are requested in order (`?page=1`, `?page=2`, ...) through the
//! retrying runner. The walk ends at the storefront's "not found" page, a
//! 404, the page cap or a fetch that could not be completed.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::infrastructure::config::utils::listing_page_url;
use crate::infrastructure::http_client::PageFetcher;
use crate::infrastructure::parsing::ProductExtractor;
use crate::infrastructure::retry_manager::RetryingRunner;

/// One listing page that belongs to the category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// 1-based page index
    pub index: u32,
    pub url: String,
    pub body: String,
}

/// Why a walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// The "not found" marker was on the page
    NotFoundMarker { page: u32 },
    /// The server answered 404
    NotFoundStatus { page: u32 },
    PageCap,
    /// A fetch failed for good; later pages were never requested
    Aborted { page: u32 },
}

pub struct PageWalker {
    fetcher: Arc<dyn PageFetcher>,
    runner: RetryingRunner,
    extractor: Arc<ProductExtractor>,
    max_pages: u32,
    page_param: String,
}

impl PageWalker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        runner: RetryingRunner,
        extractor: Arc<ProductExtractor>,
        max_pages: u32,
        page_param: &str,
    ) -> Self {
        Self {
            fetcher,
            runner,
            extractor,
            max_pages,
            page_param: page_param.to_string(),
        }
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Start a fresh walk from page 1
    pub fn walk(&self, category_url: &str) -> PageCursor<'_> {
        PageCursor {
            walker: self,
            category_url: category_url.to_string(),
            next_index: 1,
            end: None,
        }
    }
}

/// Lazy cursor over the listing pages of one category
pub struct PageCursor<'a> {
    walker: &'a PageWalker,
    category_url: String,
    next_index: u32,
    end: Option<WalkEnd>,
}

impl PageCursor<'_> {
    /// Fetch the next page, `None` once the walk is over
    pub async fn next(&mut self) -> Option<ListingPage> {
        if self.end.is_some() {
            return None;
        }
        if self.next_index > self.walker.max_pages {
            info!("🛑 Page cap of {} reached for {}", self.walker.max_pages, self.category_url);
            self.end = Some(WalkEnd::PageCap);
            return None;
        }

        let index = self.next_index;
        let url = listing_page_url(&self.category_url, &self.walker.page_param, index);
        let label = format!("listing page {index} ({url})");

        let fetcher = &self.walker.fetcher;
        let Some(page) = self.walker.runner.run(&label, || fetcher.fetch(&url)).await else {
            warn!("⚠️ Aborting walk of {} at page {}", self.category_url, index);
            self.end = Some(WalkEnd::Aborted { page: index });
            return None;
        };

        if page.is_not_found() {
            debug!("Page {} answered 404, end of listing", index);
            self.end = Some(WalkEnd::NotFoundStatus { page: index });
            return None;
        }
        if self.walker.extractor.is_not_found_page(&page.body) {
            debug!("Page {} shows the not-found marker, end of listing", index);
            self.end = Some(WalkEnd::NotFoundMarker { page: index });
            return None;
        }

        self.next_index += 1;
        Some(ListingPage {
            index,
            url: page.url,
            body: page.body,
        })
    }

    pub fn end(&self) -> Option<WalkEnd> {
        self.end
    }

    pub fn aborted(&self) -> bool {
        matches!(self.end, Some(WalkEnd::Aborted { .. }))
    }
}
