//! Turns raw listing fields into validated products
//!
//! Everything the storefront encodes in the detail URL is recovered here:
//! the numeric product ID, the optional EAN and, for names cut short by
//! the listing UI, the missing words of the title.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::domain::errors::ValidationError;
use crate::domain::product::{Product, RawProduct};

/// Trailing `<id>[-slug][-ean].html` segment, introduced by `-` or `/`
static URL_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[/-](\d+[\w-]*)\.html(?:[?#].*)?$").expect("valid regex")
});
static LEADING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)").expect("valid regex"));
static TRAILING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\d+)$").expect("valid regex"));
static SLUG_WITH_EAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+-([a-zA-Z0-9-]+)-\d+$").expect("valid regex"));
static SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+-([a-zA-Z0-9-]+)").expect("valid regex"));

const TRUNCATION_MARKERS: [&str; 2] = ["...", "…"];
const CURRENCY_SYMBOL: char = '€';
/// Longest clean price string that can't carry a thousands separator
const MAX_PLAIN_PRICE_LEN: usize = 6;

/// Identifiers carried by a detail URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlInfo {
    pub external_id: String,
    pub ean: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductNormalizer;

impl ProductNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Validate one raw listing row.
    ///
    /// `observed_on` is the run date supplied by the caller.
    pub fn normalize(&self, raw: &RawProduct, observed_on: NaiveDate) -> Result<Product, ValidationError> {
        let url = raw.detail_url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }

        let UrlInfo { external_id, ean } = extract_url_info(url)?;
        let price = normalize_price(&raw.price_text)?;
        let name = correct_name(&raw.name, url).ok_or_else(|| ValidationError::EmptyName {
            url: url.to_string(),
        })?;

        Ok(Product {
            category: raw.category.trim().to_string(),
            external_id,
            name,
            price,
            ean,
            url: url.to_string(),
            image_url: raw.image_url.trim().to_string(),
            observed_on,
        })
    }

    /// Normalize a page worth of rows, dropping and logging the invalid ones.
    ///
    /// Returns the valid products and the number of rejected rows.
    pub fn normalize_all(&self, raws: &[RawProduct], observed_on: NaiveDate) -> (Vec<Product>, u32) {
        let mut products = Vec::with_capacity(raws.len());
        let mut rejected = 0u32;

        for raw in raws {
            match self.normalize(raw, observed_on) {
                Ok(product) => {
                    debug!("🧾 Normalized {} '{}' at {}", product.external_id, product.name, product.price);
                    products.push(product);
                }
                Err(e) => {
                    warn!("⚠️ Rejected listing row ({}): {}", raw.detail_url, e);
                    rejected += 1;
                }
            }
        }

        (products, rejected)
    }
}

fn url_segment(url: &str) -> Option<&str> {
    URL_SEGMENT
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// External ID (mandatory) and EAN (optional) of a detail URL
pub fn extract_url_info(url: &str) -> Result<UrlInfo, ValidationError> {
    let missing = || ValidationError::MissingExternalId { url: url.to_string() };

    let segment = url_segment(url).ok_or_else(missing)?;
    let external_id = LEADING_DIGITS
        .captures(segment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(missing)?;
    let ean = TRAILING_DIGITS
        .captures(segment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Ok(UrlInfo { external_id, ean })
}

/// Human name encoded in the URL slug, e.g. `Amortiguador delantero izquierdo`
pub fn name_from_url(url: &str) -> Option<String> {
    let segment = url_segment(url)?;
    let slug = SLUG_WITH_EAN
        .captures(segment)
        .or_else(|| SLUG.captures(segment))
        .and_then(|caps| caps.get(1))?
        .as_str();

    let words = slug.replace('-', " ");
    let name = capitalize(words.trim());
    (!name.is_empty()).then_some(name)
}

/// Trimmed name, completed from the URL when truncated.
///
/// An empty name falls back to the URL-derived one.
pub fn correct_name(name: &str, url: &str) -> Option<String> {
    let name = name.trim();

    if name.is_empty() {
        return name_from_url(url);
    }

    if TRUNCATION_MARKERS.iter().any(|marker| name.contains(marker)) {
        if let Some(url_name) = name_from_url(url) {
            return Some(complete_truncated_name(name, &url_name));
        }
    }

    Some(name.to_string())
}

fn complete_truncated_name(truncated: &str, url_name: &str) -> String {
    let head = TRUNCATION_MARKERS
        .iter()
        .fold(truncated.to_string(), |acc, marker| acc.replace(marker, ""));
    let head = head.trim();

    let known: Vec<String> = head
        .replace('/', "")
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut completed = head.to_string();
    for word in url_name.to_lowercase().split_whitespace() {
        if !known.iter().any(|k| k == word) {
            completed.push(' ');
            completed.push_str(&capitalize(word));
        }
    }
    completed
}

/// First character upper-cased, the rest lower-cased
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Clean decimal string of a storefront price (`"1.234,56 €"` → `"1234.56"`)
pub fn clean_price_text(text: &str) -> String {
    let mut price: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != CURRENCY_SYMBOL)
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if price.len() > MAX_PLAIN_PRICE_LEN && price.matches('.').count() > 1 {
        if let Some(pos) = price.find('.') {
            price.remove(pos);
        }
    }
    price
}

pub fn normalize_price(text: &str) -> Result<Decimal, ValidationError> {
    let cleaned = clean_price_text(text);
    let invalid = || ValidationError::InvalidPrice { raw: text.to_string() };

    if cleaned.is_empty() {
        return Err(invalid());
    }
    let price = Decimal::from_str(&cleaned).map_err(|_| invalid())?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::NegativePrice { raw: text.to_string() });
    }
    Ok(price)
}
