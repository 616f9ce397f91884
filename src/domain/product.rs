use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Candidate product fields as they appear on one listing page.
///
/// Nothing is validated here; any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProduct {
    pub category: String,
    pub detail_url: String,
    pub name: String,
    pub price_text: String,
    pub image_url: String,
}

impl RawProduct {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }
}

/// Normalized product ready for reconciliation.
///
/// `external_id` is always a non-empty run of digits taken from `url`,
/// `price` is never negative and `name` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub category: String,
    pub external_id: String,
    pub name: String,
    pub price: Decimal,
    pub ean: Option<String>,
    pub url: String,
    pub image_url: String,
    pub observed_on: NaiveDate,
}

impl Product {
    /// Catalog fields of this observation
    pub fn to_article(&self) -> Article {
        let now = Utc::now();
        Article {
            id: None,
            external_id: self.external_id.clone(),
            category: self.category.clone(),
            name: self.name.clone(),
            ean: self.ean.clone(),
            article_url: self.url.clone(),
            image_url: self.image_url.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Price observation of this product
    pub fn to_price_record(&self) -> PriceRecord {
        PriceRecord {
            external_id: self.external_id.clone(),
            price: self.price,
            observed_on: self.observed_on,
        }
    }
}

/// Persistent catalog entry, one per external ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Store-assigned row ID (`None` before insertion)
    pub id: Option<i64>,
    pub external_id: String,
    pub category: String,
    pub name: String,
    pub ean: Option<String>,
    pub article_url: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Fields of `product` that differ from this article, if any.
    ///
    /// The external ID is immutable and never part of the update.
    pub fn changes_from(&self, product: &Product) -> Option<ArticleUpdate> {
        let update = ArticleUpdate {
            category: (self.category != product.category).then(|| product.category.clone()),
            name: (self.name != product.name).then(|| product.name.clone()),
            ean: (product.ean.is_some() && self.ean != product.ean).then(|| product.ean.clone()).flatten(),
            article_url: (self.article_url != product.url).then(|| product.url.clone()),
            image_url: (!product.image_url.is_empty() && self.image_url != product.image_url)
                .then(|| product.image_url.clone()),
        };
        (!update.is_empty()).then_some(update)
    }
}

/// Partial update of an [`Article`]; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleUpdate {
    pub category: Option<String>,
    pub name: Option<String>,
    pub ean: Option<String>,
    pub article_url: Option<String>,
    pub image_url: Option<String>,
}

impl ArticleUpdate {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.name.is_none()
            && self.ean.is_none()
            && self.article_url.is_none()
            && self.image_url.is_none()
    }

    pub fn apply_to(&self, article: &mut Article) {
        if let Some(category) = &self.category {
            article.category.clone_from(category);
        }
        if let Some(name) = &self.name {
            article.name.clone_from(name);
        }
        if let Some(ean) = &self.ean {
            article.ean = Some(ean.clone());
        }
        if let Some(url) = &self.article_url {
            article.article_url.clone_from(url);
        }
        if let Some(url) = &self.image_url {
            article.image_url.clone_from(url);
        }
        article.updated_at = Utc::now();
    }
}

/// One row of the append-only price history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub external_id: String,
    pub price: Decimal,
    pub observed_on: NaiveDate,
}

/// Latest known price of an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPrice {
    pub external_id: String,
    pub price: Decimal,
    pub observed_on: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_product() -> Product {
        Product {
            category: "Coches".to_string(),
            external_id: "12345".to_string(),
            name: "Amortiguador Delantero".to_string(),
            price: dec!(89.99),
            ean: Some("8431234567890".to_string()),
            url: "https://www.rtrvalladolid.es/coches/12345-amortiguador-delantero-8431234567890.html".to_string(),
            image_url: "https://www.rtrvalladolid.es/img/12345.jpg".to_string(),
            observed_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    #[test]
    fn test_product_splits_into_article_and_price() {
        let product = sample_product();

        let article = product.to_article();
        assert_eq!(article.id, None);
        assert_eq!(article.external_id, "12345");
        assert_eq!(article.article_url, product.url);

        let record = product.to_price_record();
        assert_eq!(record.price, dec!(89.99));
        assert_eq!(record.observed_on, product.observed_on);
    }

    #[test]
    fn test_unchanged_article_has_no_update() {
        let product = sample_product();
        let article = product.to_article();
        assert!(article.changes_from(&product).is_none());
    }

    #[test]
    fn test_changed_name_and_category_produce_update() {
        let product = sample_product();
        let mut article = product.to_article();
        article.name = "Amortiguador".to_string();
        article.category = "Motos".to_string();

        let update = article.changes_from(&product).unwrap();
        assert_eq!(update.name.as_deref(), Some("Amortiguador Delantero"));
        assert_eq!(update.category.as_deref(), Some("Coches"));
        assert!(update.article_url.is_none());

        update.apply_to(&mut article);
        assert_eq!(article.name, product.name);
        assert_eq!(article.external_id, "12345");
    }

    #[test]
    fn test_missing_ean_never_clears_stored_ean() {
        let mut product = sample_product();
        let article = product.to_article();
        product.ean = None;
        assert!(article.changes_from(&product).is_none());
    }
}
