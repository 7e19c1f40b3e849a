//! Per-category price statistics, computed lazily and cached.
//!
//! Statistics cover the in-stock products of a category. Each category is computed
//! at most once per [`CategoryPriceStats`] instance and never invalidated; the
//! owning scorer is rebuilt together with the catalog, which bounds staleness.
//! Two threads racing on the first access compute identical values, so the write
//! lock only guards the map itself.

use crate::product::Catalog;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// Average, minimum, and maximum price of a category's in-stock products.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Lazily populated `category → PriceStats` cache.
#[derive(Debug, Default)]
pub struct CategoryPriceStats {
    cache: RwLock<HashMap<String, Option<PriceStats>>>,
}

impl CategoryPriceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for `category`, or `None` when it has no in-stock product with a positive price average.
    pub fn get(&self, catalog: &Catalog, category: &str) -> Option<PriceStats> {
        if let Some(cached) = self.cache.read().get(category) {
            return *cached;
        }

        let stats = compute(catalog, category);
        self.cache.write().insert(category.to_string(), stats);
        tracing::debug!("Cached price stats for category '{}': {:?}", category, stats);
        stats
    }

    /// Number of categories computed so far.
    pub fn cached_categories(&self) -> usize {
        self.cache.read().len()
    }
}

fn compute(catalog: &Catalog, category: &str) -> Option<PriceStats> {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for p in catalog.products() {
        if p.category == category && p.is_in_stock {
            count += 1;
            sum += p.price;
            min = min.min(p.price);
            max = max.max(p.price);
        }
    }
    if count == 0 {
        return None;
    }
    let avg = sum / count as f64;
    (avg > 0.0).then_some(PriceStats { avg, min, max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Product;

    fn product(id: &str, category: &str, price: f64, in_stock: bool) -> Product {
        let mut p = Product::new(id, "item");
        p.category = category.to_string();
        p.price = price;
        p.is_in_stock = in_stock;
        p
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            product("a", "phones", 100.0, true),
            product("b", "phones", 300.0, true),
            product("c", "phones", 10_000.0, false),
            product("d", "shoes", 50.0, false),
        ])
        .unwrap()
    }

    #[test]
    fn test_in_stock_only() {
        let stats = CategoryPriceStats::new();
        let s = stats.get(&catalog(), "phones").unwrap();
        assert_eq!(s, PriceStats { avg: 200.0, min: 100.0, max: 300.0 });
    }

    #[test]
    fn test_missing_category_cached_as_none() {
        let stats = CategoryPriceStats::new();
        let c = catalog();
        assert!(stats.get(&c, "shoes").is_none());
        assert!(stats.get(&c, "laptops").is_none());
        assert_eq!(stats.cached_categories(), 2);
    }

    #[test]
    fn test_computed_once() {
        let stats = CategoryPriceStats::new();
        let c = catalog();
        let first = stats.get(&c, "phones");
        // A different catalog does not affect an already cached category.
        let other = Catalog::new(vec![product("x", "phones", 1.0, true)]).unwrap();
        assert_eq!(stats.get(&other, "phones"), first);
        assert_eq!(stats.cached_categories(), 1);
    }
}
