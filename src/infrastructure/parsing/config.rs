//! Parsing configuration for HTML extraction
//!
//! Centralized CSS selectors for the storefront's listing pages and side
//! menu. Every selector list is tried in order; the first one that matches
//! anything wins.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub listing: ListingSelectors,
    pub category_menu: CategoryMenuSelectors,
}

/// CSS selectors for product listing pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// One element per product (scoped extraction)
    pub product_container: Vec<String>,

    /// Container of the detail link; its first anchor is used
    pub detail_link_container: String,

    pub name: String,

    pub price: String,

    /// Thumbnail anchor holding the product image
    pub thumbnail: String,

    /// Image attribute carrying the full-size URL
    pub image_attribute: String,

    /// Present only on the page after the last listing page
    pub not_found_marker: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            product_container: vec![
                "article.product-miniature".to_string(),
                "div.js-product-miniature".to_string(),
            ],
            detail_link_container: "div.product-description".to_string(),
            name: "h2".to_string(),
            price: "span.price".to_string(),
            thumbnail: "a.thumbnail".to_string(),
            image_attribute: "data-full-size-image-url".to_string(),
            not_found_marker: ".page-content.page-not-found".to_string(),
        }
    }
}

/// CSS selectors for the category side menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryMenuSelectors {
    pub menu: String,
    pub link: String,
    /// Subcategory anchors, excluded from the top-level list
    pub sub_link: String,
}

impl Default for CategoryMenuSelectors {
    fn default() -> Self {
        Self {
            menu: "ul.category-sub-menu".to_string(),
            link: "a".to_string(),
            sub_link: "a.category-sub-link".to_string(),
        }
    }
}
