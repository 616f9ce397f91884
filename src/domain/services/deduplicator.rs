//! Batch deduplication by external ID

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::domain::product::Product;

/// Duplicate analysis of a batch, nothing removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateStats {
    pub total_products: usize,
    pub unique_products: usize,
    pub duplicates_count: usize,
    /// One entry per discarded occurrence, in batch order
    pub duplicate_ids: Vec<String>,
}

/// Result of a deduplication pass
#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    pub products: Vec<Product>,
    pub duplicate_ids: Vec<String>,
}

impl Deduplicated {
    pub fn removed(&self) -> usize {
        self.duplicate_ids.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Keep the first product seen for each external ID
    pub fn deduplicate(&self, products: Vec<Product>) -> Deduplicated {
        let total = products.len();
        let mut seen = HashSet::with_capacity(total);
        let mut result = Deduplicated {
            products: Vec::with_capacity(total),
            duplicate_ids: Vec::new(),
        };

        for product in products {
            if seen.insert(product.external_id.clone()) {
                result.products.push(product);
            } else {
                debug!("🗑️ Dropped duplicate product {}", product.external_id);
                result.duplicate_ids.push(product.external_id);
            }
        }

        if !result.duplicate_ids.is_empty() {
            debug!("🔍 Duplicate IDs: {:?}", result.duplicate_ids);
        }
        info!(
            "✅ Deduplication: {} unique of {}, {} duplicates removed",
            result.products.len(),
            total,
            result.removed()
        );
        result
    }

    pub fn duplicate_stats(&self, products: &[Product]) -> DuplicateStats {
        let mut seen = HashSet::with_capacity(products.len());
        let duplicate_ids: Vec<String> = products
            .iter()
            .filter(|p| !seen.insert(p.external_id.as_str()))
            .map(|p| p.external_id.clone())
            .collect();

        DuplicateStats {
            total_products: products.len(),
            unique_products: seen.len(),
            duplicates_count: duplicate_ids.len(),
            duplicate_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn product(id: &str, name: &str) -> Product {
        Product {
            category: "Frenos".to_string(),
            external_id: id.to_string(),
            name: name.to_string(),
            price: Decimal::ONE,
            ean: None,
            url: format!("https://x.es/{id}-pieza.html"),
            image_url: String::new(),
            observed_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    fn batch() -> Vec<Product> {
        vec![
            product("1", "first 1"),
            product("2", "first 2"),
            product("1", "second 1"),
            product("3", "first 3"),
            product("2", "second 2"),
        ]
    }

    #[test]
    fn test_first_occurrence_wins() {
        let result = Deduplicator::new().deduplicate(batch());

        let ids: Vec<&str> = result.products.iter().map(|p| p.external_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(result.products.iter().all(|p| p.name.starts_with("first")));
        assert_eq!(result.removed(), 2);
        assert_eq!(result.duplicate_ids, ["1", "2"]);
    }

    #[test]
    fn test_duplicate_stats_does_not_remove() {
        let products = batch();
        let stats = Deduplicator::new().duplicate_stats(&products);

        assert_eq!(products.len(), 5);
        assert_eq!(
            stats,
            DuplicateStats {
                total_products: 5,
                unique_products: 3,
                duplicates_count: 2,
                duplicate_ids: vec!["1".to_string(), "2".to_string()],
            }
        );
    }

    #[test]
    fn test_empty_batch() {
        let result = Deduplicator::new().deduplicate(Vec::new());
        assert!(result.products.is_empty());
        assert_eq!(result.removed(), 0);
    }
}
