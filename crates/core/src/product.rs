//! Product records and the validated catalog.
//!
//! [`RawProduct`] is the loosely-typed ingestion format: every field except the id
//! and title may be missing. [`Product`] is the validated value type that flows through
//! the pipeline, and [`Catalog`] holds an immutable, index-ordered snapshot of them.
//! Internal u32 document IDs used by the lexical and vector indices are positions in
//! the catalog.

use crate::error::{ArtifactError, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Delivery estimate assumed when a record does not carry one.
const DEFAULT_DELIVERY_DAYS: u32 = 7;

/// A product record as it arrives from ingestion (JSON, CSV export, logs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProduct {
    #[serde(alias = "id")]
    pub product_id: String,
    pub title: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    #[serde(alias = "current_price")]
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    #[serde(alias = "num_ratings")]
    pub review_count: Option<u32>,
    pub stock_quantity: Option<i64>,
    pub is_in_stock: Option<bool>,
    pub seller_rating: Option<f64>,
    #[serde(alias = "is_flipkart_assured")]
    pub is_assured: Option<bool>,
    pub delivery_days: Option<u32>,
    pub ctr: Option<f64>,
    pub conversion_rate: Option<f64>,
    pub is_plus_product: Option<bool>,
}

/// A validated product. All numeric fields are finite and within their documented ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub title: String,
    pub description: String,
    pub brand: String,
    pub category: String,
    pub subcategory: String,
    pub price: f64,
    pub original_price: f64,
    /// Discount in percent, \[0, 100\].
    pub discount_percentage: f64,
    /// Average rating, \[0, 5\].
    pub rating: f64,
    pub review_count: u32,
    pub stock_quantity: i64,
    pub is_in_stock: bool,
    /// Seller rating, \[0, 5\]. 0 means unknown.
    pub seller_rating: f64,
    pub is_assured: bool,
    pub delivery_days: u32,
    /// Click-through rate as a fraction.
    pub ctr: f64,
    /// Conversion rate as a fraction.
    pub conversion_rate: f64,
    pub is_plus_product: bool,
}

impl Product {
    /// Creates an in-stock product with neutral defaults. Mostly useful for tests and demos.
    pub fn new(product_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
            description: String::new(),
            brand: String::new(),
            category: String::new(),
            subcategory: String::new(),
            price: 0.0,
            original_price: 0.0,
            discount_percentage: 0.0,
            rating: 0.0,
            review_count: 0,
            stock_quantity: 0,
            is_in_stock: true,
            seller_rating: 0.0,
            is_assured: false,
            delivery_days: DEFAULT_DELIVERY_DAYS,
            ctr: 0.0,
            conversion_rate: 0.0,
            is_plus_product: false,
        }
    }

    /// Text indexed by BM25: title, brand, category, subcategory, and description.
    pub fn search_text(&self) -> String {
        [
            self.title.as_str(),
            self.brand.as_str(),
            self.category.as_str(),
            self.subcategory.as_str(),
            self.description.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Text handed to the embedding provider: title and description.
    pub fn embedding_text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.description)
        }
    }
}

impl TryFrom<RawProduct> for Product {
    type Error = ConfigError;

    fn try_from(raw: RawProduct) -> Result<Self, Self::Error> {
        let id = raw.product_id.trim().to_string();
        let invalid = |reason: String| ConfigError::InvalidProduct {
            id: id.clone(),
            reason,
        };

        if id.is_empty() {
            return Err(ConfigError::InvalidProduct {
                id: "<missing>".to_string(),
                reason: "product_id is empty".to_string(),
            });
        }
        if raw.title.trim().is_empty() {
            return Err(invalid("title is empty".to_string()));
        }

        let price = non_negative("price", raw.price.unwrap_or(0.0)).map_err(&invalid)?;
        let original_price =
            non_negative("original_price", raw.original_price.unwrap_or(price)).map_err(&invalid)?;
        let discount_percentage = bounded(
            "discount_percentage",
            raw.discount_percentage.unwrap_or(0.0),
            100.0,
        )
        .map_err(&invalid)?;
        let rating = bounded("rating", raw.rating.unwrap_or(0.0), 5.0).map_err(&invalid)?;
        let seller_rating =
            bounded("seller_rating", raw.seller_rating.unwrap_or(0.0), 5.0).map_err(&invalid)?;
        let ctr = bounded("ctr", raw.ctr.unwrap_or(0.0), 1.0).map_err(&invalid)?;
        let conversion_rate =
            bounded("conversion_rate", raw.conversion_rate.unwrap_or(0.0), 1.0).map_err(&invalid)?;

        let stock_quantity = raw.stock_quantity.unwrap_or(0);
        let is_in_stock = raw.is_in_stock.unwrap_or(stock_quantity > 0);

        Ok(Self {
            product_id: id.clone(),
            title: raw.title.trim().to_string(),
            description: raw.description.unwrap_or_default(),
            brand: raw.brand.unwrap_or_default(),
            category: raw.category.unwrap_or_default(),
            subcategory: raw.subcategory.unwrap_or_default(),
            price,
            original_price,
            discount_percentage,
            rating,
            review_count: raw.review_count.unwrap_or(0),
            stock_quantity,
            is_in_stock,
            seller_rating,
            is_assured: raw.is_assured.unwrap_or(false),
            delivery_days: raw.delivery_days.unwrap_or(DEFAULT_DELIVERY_DAYS),
            ctr,
            conversion_rate,
            is_plus_product: raw.is_plus_product.unwrap_or(false),
        })
    }
}

fn non_negative(field: &str, value: f64) -> Result<f64, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be a finite non-negative number, got {value}"));
    }
    Ok(value)
}

fn bounded(field: &str, value: f64, max: f64) -> Result<f64, String> {
    let value = non_negative(field, value)?;
    if value > max {
        return Err(format!("{field} must be at most {max}, got {value}"));
    }
    Ok(value)
}

/// Immutable, index-ordered product snapshot.
///
/// The position of a product in the catalog is its internal document ID in every index
/// built from this snapshot.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    by_id: HashMap<String, u32>,
}

impl Catalog {
    /// Builds a catalog from validated products. Rejects duplicate ids.
    pub fn new(products: Vec<Product>) -> Result<Self, ConfigError> {
        let mut by_id = HashMap::with_capacity(products.len());
        for (i, p) in products.iter().enumerate() {
            if by_id.insert(p.product_id.clone(), i as u32).is_some() {
                return Err(ConfigError::DuplicateProduct(p.product_id.clone()));
            }
        }
        Ok(Self { products, by_id })
    }

    /// Validates raw records and builds a catalog.
    pub fn from_raw(raw: Vec<RawProduct>) -> Result<Self, ConfigError> {
        let products = raw
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(products)
    }

    /// Parses either a JSON array or JSON lines of raw product records.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let trimmed = text.trim_start();
        let raw: Vec<RawProduct> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed).map_err(|e| ConfigError::InvalidParameter {
                name: "catalog",
                reason: e.to_string(),
            })?
        } else {
            trimmed
                .lines()
                .filter(|l| !l.trim().is_empty())
                .enumerate()
                .map(|(line, l)| {
                    serde_json::from_str(l).map_err(|e| ConfigError::InvalidParameter {
                        name: "catalog",
                        reason: format!("line {}: {}", line + 1, e),
                    })
                })
                .collect::<Result<_, _>>()?
        };
        Self::from_raw(raw)
    }

    /// Reads a catalog file (JSON lines or a JSON array).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(path.display().to_string()).into());
            }
            Err(e) => return Err(ArtifactError::Io(e).into()),
        };
        let catalog = Self::from_json(&text)?;
        tracing::info!("Loaded catalog of {} products from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Writes the catalog as JSON lines, atomically.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let mut out = String::new();
        for p in &self.products {
            let line = serde_json::to_string(p).map_err(|e| ArtifactError::Serialization(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, out)?;
        fs::rename(&tmp, path)?;
        tracing::info!("Saved catalog of {} products to {}", self.len(), path.display());
        Ok(())
    }

    /// Returns the product at an internal document ID.
    pub fn get(&self, doc_id: u32) -> Option<&Product> {
        self.products.get(doc_id as usize)
    }

    /// Looks up the internal document ID of a product id.
    pub fn doc_id(&self, product_id: &str) -> Option<u32> {
        self.by_id.get(product_id).copied()
    }

    /// Looks up a product by its external id.
    pub fn by_product_id(&self, product_id: &str) -> Option<&Product> {
        self.doc_id(product_id).and_then(|id| self.get(id))
    }

    /// All products in index order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Returns the number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns `true` if the catalog holds no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, title: &str) -> RawProduct {
        RawProduct {
            product_id: id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_filled() {
        let p = Product::try_from(RawProduct {
            price: Some(499.0),
            stock_quantity: Some(12),
            ..raw("p1", "red cotton t-shirt")
        })
        .unwrap();
        assert_eq!(p.original_price, 499.0);
        assert_eq!(p.delivery_days, DEFAULT_DELIVERY_DAYS);
        assert!(p.is_in_stock, "positive stock implies in stock when unset");
    }

    #[test]
    fn test_rejects_missing_title() {
        let err = Product::try_from(raw("p1", "  ")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProduct { .. }));
    }

    #[test]
    fn test_rejects_out_of_range_rating() {
        let err = Product::try_from(RawProduct {
            rating: Some(7.5),
            ..raw("p1", "shoe")
        })
        .unwrap_err();
        assert!(err.to_string().contains("rating"));
    }

    #[test]
    fn test_rejects_nan_price() {
        let err = Product::try_from(RawProduct {
            price: Some(f64::NAN),
            ..raw("p1", "shoe")
        })
        .unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Catalog::from_raw(vec![raw("a", "one"), raw("a", "two")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProduct(id) if id == "a"));
    }

    #[test]
    fn test_from_json_lines_and_array() {
        let lines = r#"{"product_id":"a","title":"blue denim jeans","price":999}
{"id":"b","title":"gaming laptop","current_price":55000,"is_flipkart_assured":true}"#;
        let c = Catalog::from_json(lines).unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.by_product_id("b").unwrap().is_assured);
        assert_eq!(c.by_product_id("b").unwrap().price, 55000.0);

        let array = r#"[{"product_id":"x","title":"wireless headphones"}]"#;
        let c = Catalog::from_json(array).unwrap();
        assert_eq!(c.doc_id("x"), Some(0));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.jsonl");
        let c = Catalog::from_raw(vec![raw("a", "blue denim jeans"), raw("b", "gaming laptop")]).unwrap();
        c.save(&path).unwrap();
        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded.products(), c.products());

        let missing = Catalog::load(&dir.path().join("nope.jsonl")).unwrap_err();
        assert!(matches!(missing, ConfigError::Artifact(ArtifactError::NotFound(_))));
    }

    #[test]
    fn test_search_text_skips_empty_fields() {
        let mut p = Product::new("a", "blue denim jeans");
        p.brand = "Levis".to_string();
        assert_eq!(p.search_text(), "blue denim jeans Levis");
        assert_eq!(p.embedding_text(), "blue denim jeans");
    }
}
