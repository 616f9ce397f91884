//! Test utilities for the price tracker
//!
//! A scripted [`PageFetcher`] and storefront-shaped HTML builders, shared by
//! unit tests and the integration tests under `tests/`.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::domain::errors::FetchError;
use crate::infrastructure::http_client::{FetchedPage, PageFetcher};

pub const TEST_BASE_URL: &str = "https://www.rtrvalladolid.es";

/// Fetcher answering from a per-URL script.
///
/// Each URL holds a queue of responses; the last one repeats forever.
/// Unscripted URLs answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<HashMap<String, VecDeque<Result<FetchedPage, FetchError>>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a 200 page
    #[must_use]
    pub fn page(self, url: &str, body: &str) -> Self {
        self.status(url, 200, body)
    }

    #[must_use]
    pub fn status(self, url: &str, status: u16, body: &str) -> Self {
        let page = FetchedPage {
            url: url.to_string(),
            status,
            body: body.to_string(),
        };
        self.push(url, Ok(page))
    }

    #[must_use]
    pub fn error(self, url: &str, error: FetchError) -> Self {
        self.push(url, Err(error))
    }

    /// Queue `count` timeouts
    #[must_use]
    pub fn timeouts(mut self, url: &str, count: usize) -> Self {
        for _ in 0..count {
            self = self.error(
                url,
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: 10,
                },
            );
        }
        self
    }

    fn push(self, url: &str, response: Result<FetchedPage, FetchError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.entry(url.to_string()).or_default().push_back(response);
        }
        self
    }

    /// Every requested URL, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        let not_found = || {
            Ok(FetchedPage {
                url: url.to_string(),
                status: 404,
                body: String::new(),
            })
        };
        let Ok(mut script) = self.script.lock() else {
            return not_found();
        };
        match script.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }
}

/// One product tile on a listing page
#[derive(Debug, Clone)]
pub struct ListingItem {
    pub detail_url: String,
    pub name: String,
    pub price: String,
    pub image_url: String,
}

impl ListingItem {
    /// Tile whose URL slug is derived from `name`
    pub fn new(id: u32, name: &str, price: &str) -> Self {
        let slug = name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        Self::with_slug(id, &slug, name, price)
    }

    pub fn with_slug(id: u32, slug: &str, name: &str, price: &str) -> Self {
        Self {
            detail_url: format!("{TEST_BASE_URL}/recambios/{id}-{slug}.html"),
            name: name.to_string(),
            price: price.to_string(),
            image_url: format!("{TEST_BASE_URL}/{id}-large_default/{slug}.jpg"),
        }
    }

    fn to_html(&self) -> String {
        format!(
            r#"<article class="product-miniature js-product-miniature">
  <div class="thumbnail-container">
    <a href="{url}" class="thumbnail product-thumbnail"><img src="{image}" data-full-size-image-url="{image}" alt=""></a>
    <div class="product-description">
      <h2 class="h3 product-title"><a href="{url}">{name}</a></h2>
      <div class="product-price-and-shipping"><span class="price">{price}</span></div>
    </div>
  </div>
</article>"#,
            url = self.detail_url,
            image = self.image_url,
            name = self.name,
            price = self.price,
        )
    }
}

/// Listing page from `(id, name, price)` tuples
pub fn listing_html(items: &[(u32, &str, &str)]) -> String {
    let items: Vec<ListingItem> = items
        .iter()
        .map(|(id, name, price)| ListingItem::new(*id, name, price))
        .collect();
    listing_page(&items)
}

pub fn listing_page(items: &[ListingItem]) -> String {
    let tiles: String = items.iter().map(ListingItem::to_html).collect();
    format!(
        r#"<!doctype html><html lang="es"><body id="category"><section id="products"><div class="products row">{tiles}</div></section></body></html>"#
    )
}

/// The page the storefront serves past the last listing page
pub fn not_found_html() -> String {
    r#"<!doctype html><html lang="es"><body id="category"><section id="products"><section class="page-content page-not-found"><h4>No hay productos en esta categoría</h4></section></section></body></html>"#
        .to_string()
}

/// Home page with the category side menu
pub fn category_menu_html(categories: &[(&str, &str)]) -> String {
    let entries: String = categories
        .iter()
        .map(|(name, href)| {
            format!(
                r#"<li><a href="{href}">{name}</a><ul><li><a class="category-sub-link" href="{href}/sub">Sub {name}</a></li></ul></li>"#
            )
        })
        .collect();
    format!(
        r#"<!doctype html><html lang="es"><body><div class="block-categories"><ul class="category-sub-menu">{entries}</ul></div></body></html>"#
    )
}
