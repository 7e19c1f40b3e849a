//! Structured post-retrieval filters.
//!
//! Neither index supports predicate filtering, so filters are evaluated against
//! the catalog product of every retrieved candidate. String fields match
//! case-insensitively; all set conditions are AND-ed.

use crate::error::UsageError;
use crate::product::Product;
use serde::{Deserialize, Serialize};

/// Optional constraints on the result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    /// Drop out-of-stock products.
    pub in_stock_only: bool,
}

impl SearchFilters {
    /// `true` when no condition is set.
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.brand.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_rating.is_none()
            && !self.in_stock_only
    }

    /// Rejects non-finite bounds and inverted ranges.
    pub fn validate(&self) -> Result<(), UsageError> {
        for (name, value) in [
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("min_rating", self.min_rating),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(UsageError::InvalidFilter(format!(
                        "{name} must be a finite non-negative number, got {v}"
                    )));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_price, self.max_price) {
            if lo > hi {
                return Err(UsageError::InvalidFilter(format!(
                    "min_price {lo} is greater than max_price {hi}"
                )));
            }
        }
        if self.min_rating.is_some_and(|r| r > 5.0) {
            return Err(UsageError::InvalidFilter(
                "min_rating must be at most 5".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a product satisfies every set condition.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref category) = self.category {
            if !eq_ignore_case(&product.category, category) {
                return false;
            }
        }
        if let Some(ref brand) = self.brand {
            if !eq_ignore_case(&product.brand, brand) {
                return false;
            }
        }
        if self.min_price.is_some_and(|lo| product.price < lo) {
            return false;
        }
        if self.max_price.is_some_and(|hi| product.price > hi) {
            return false;
        }
        if self.min_rating.is_some_and(|r| product.rating < r) {
            return false;
        }
        if self.in_stock_only && !product.is_in_stock {
            return false;
        }
        true
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
