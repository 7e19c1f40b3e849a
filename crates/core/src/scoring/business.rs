//! Rule-based business scorer (10 factors plus multiplicative boosts).
//!
//! Factors: stock, click-through rate, rating, price competitiveness, conversion,
//! seller trust, promotion, delivery speed, freshness, brand trust. The weighted
//! factor sum is the `business_score`; it is blended with the retrieval score and
//! multiplied by the boost factors to give the final score:
//!
//! `final = clamp01((base * 0.6 + business * 0.4) * Π boosts)`
//!
//! Every boost is capped at [`MAX_BOOST`](config::MAX_BOOST); penalties are not.

use crate::config;
use crate::degradation::{DegradationEvent, Stage, StageOutcome};
use crate::error::ConfigError;
use crate::product::{Catalog, Product};
use crate::scoring::price_stats::CategoryPriceStats;
use crate::search::types::{sort_by_final_score, Candidate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Base score assumed for a product with no retrieval score.
const DEFAULT_BASE_SCORE: f32 = 0.5;

/// Brand trust table. Unknown brands score [`DEFAULT_BRAND_SCORE`].
const PREMIUM_BRANDS: &[(&str, f32)] = &[
    ("apple", 1.0),
    ("samsung", 0.95),
    ("sony", 0.9),
    ("lg", 0.85),
    ("nike", 0.9),
    ("adidas", 0.9),
    ("puma", 0.8),
    ("dell", 0.85),
    ("hp", 0.8),
    ("lenovo", 0.8),
];

const DEFAULT_BRAND_SCORE: f32 = 0.6;

/// Weights for the 10 scoring factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessWeights {
    pub stock: f32,
    pub ctr: f32,
    pub rating: f32,
    pub price: f32,
    pub conversion: f32,
    pub seller: f32,
    pub promotional: f32,
    pub delivery: f32,
    pub freshness: f32,
    pub brand: f32,
}

impl Default for BusinessWeights {
    fn default() -> Self {
        Self {
            stock: 0.25,
            ctr: 0.15,
            rating: 0.15,
            price: 0.12,
            conversion: 0.10,
            seller: 0.08,
            promotional: 0.05,
            delivery: 0.05,
            freshness: 0.03,
            brand: 0.02,
        }
    }
}

impl BusinessWeights {
    fn as_array(&self) -> [f32; 10] {
        [
            self.stock,
            self.ctr,
            self.rating,
            self.price,
            self.conversion,
            self.seller,
            self.promotional,
            self.delivery,
            self.freshness,
            self.brand,
        ]
    }

    /// Every weight finite and non-negative, and at least one positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = self.as_array();
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "business_weights",
                reason: format!("weights must be finite and non-negative, got {w}"),
            });
        }
        if weights.iter().sum::<f32>() <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "business_weights",
                reason: "at least one weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// The ten sub-scores of one product, each in \[0, 1\].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub stock: f32,
    pub ctr: f32,
    pub rating: f32,
    pub price: f32,
    pub conversion: f32,
    pub seller: f32,
    pub promotional: f32,
    pub delivery: f32,
    pub freshness: f32,
    pub brand: f32,
}

impl ScoreBreakdown {
    /// Named factors in weight order.
    pub fn factors(&self) -> [(&'static str, f32); 10] {
        [
            ("stock", self.stock),
            ("ctr", self.ctr),
            ("rating", self.rating),
            ("price", self.price),
            ("conversion", self.conversion),
            ("seller", self.seller),
            ("promotional", self.promotional),
            ("delivery", self.delivery),
            ("freshness", self.freshness),
            ("brand", self.brand),
        ]
    }

    /// Weighted sum, clamped to \[0, 1\].
    pub fn weighted(&self, weights: &BusinessWeights) -> f32 {
        self.factors()
            .iter()
            .zip(weights.as_array())
            .map(|((_, s), w)| s * w)
            .sum::<f32>()
            .clamp(0.0, 1.0)
    }
}

/// Multiplicative adjustments. Exactly one of `stock_penalty` and `stock_boost` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostFactors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_boost: Option<f32>,
    pub ctr_boost: f32,
    pub rating_boost: f32,
    pub promotional_boost: f32,
    pub assured_boost: f32,
}

impl BoostFactors {
    /// Product of all factors; boosts capped at `MAX_BOOST`, penalties applied as is.
    pub fn multiplier(&self) -> f32 {
        let cap = |b: f32| b.min(config::MAX_BOOST);
        let mut m = self.stock_penalty.unwrap_or(1.0);
        m *= cap(self.stock_boost.unwrap_or(1.0));
        m *= cap(self.ctr_boost);
        m *= cap(self.rating_boost);
        m *= cap(self.promotional_boost);
        m *= cap(self.assured_boost);
        m
    }

    /// Factors above 1.0.
    pub fn active(&self) -> Vec<(&'static str, f32)> {
        [
            ("stock_boost", self.stock_boost.unwrap_or(1.0)),
            ("ctr_boost", self.ctr_boost),
            ("rating_boost", self.rating_boost),
            ("promotional_boost", self.promotional_boost),
            ("assured_boost", self.assured_boost),
        ]
        .into_iter()
        .filter(|&(_, v)| v > 1.0)
        .collect()
    }
}

/// Scoring result for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessScore {
    pub product_id: String,
    pub base_score: f32,
    pub business_score: f32,
    pub final_score: f32,
    pub breakdown: ScoreBreakdown,
    pub boosts: BoostFactors,
}

/// Human-readable summary of a [`BusinessScore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreExplanation {
    pub product_id: String,
    pub final_score: f32,
    pub base_relevance: f32,
    pub business_score: f32,
    /// Five highest sub-scores, descending.
    pub top_factors: Vec<(&'static str, f32)>,
    pub active_boosts: Vec<(&'static str, f32)>,
}

/// Deterministic business scorer over one catalog snapshot.
///
/// Owns the category price cache; a new catalog gets a new scorer.
#[derive(Debug)]
pub struct BusinessScorer {
    catalog: Arc<Catalog>,
    weights: BusinessWeights,
    price_stats: CategoryPriceStats,
}

impl BusinessScorer {
    pub fn new(catalog: Arc<Catalog>, weights: BusinessWeights) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self {
            catalog,
            weights,
            price_stats: CategoryPriceStats::new(),
        })
    }

    pub fn weights(&self) -> &BusinessWeights {
        &self.weights
    }

    pub fn price_stats(&self) -> &CategoryPriceStats {
        &self.price_stats
    }

    /// Scores the known products among `product_ids`, sorted by descending final score.
    ///
    /// Unknown ids are skipped. A product missing from `base_scores` gets a base of 0.5.
    pub fn score_products<S: AsRef<str>>(
        &self,
        product_ids: &[S],
        base_scores: &HashMap<String, f32>,
    ) -> Vec<BusinessScore> {
        let mut scores: Vec<BusinessScore> = product_ids
            .iter()
            .filter_map(|id| self.catalog.by_product_id(id.as_ref()))
            .map(|p| {
                let base = base_scores
                    .get(&p.product_id)
                    .copied()
                    .unwrap_or(DEFAULT_BASE_SCORE);
                self.score_product(p, base)
            })
            .collect();
        scores.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        scores
    }

    /// Scores one product against a base relevance score in \[0, 1\].
    pub fn score_product(&self, product: &Product, base_score: f32) -> BusinessScore {
        let base_score = if base_score.is_finite() {
            base_score.clamp(0.0, 1.0)
        } else {
            DEFAULT_BASE_SCORE
        };
        let breakdown = self.breakdown(product);
        let boosts = boost_factors(product, &breakdown);
        let business_score = breakdown.weighted(&self.weights);
        let combined = base_score * config::BASE_SCORE_WEIGHT + business_score * config::BUSINESS_SCORE_WEIGHT;
        let final_score = (combined * boosts.multiplier()).clamp(0.0, 1.0);

        BusinessScore {
            product_id: product.product_id.clone(),
            base_score,
            business_score,
            final_score,
            breakdown,
            boosts,
        }
    }

    /// Scores retrieval candidates in place, using each candidate's current
    /// `final_score` as the base, then re-sorts and reassigns positions.
    ///
    /// A candidate whose product is not in the catalog makes the stage degrade and
    /// the input is returned unchanged.
    pub fn score_candidates(&self, mut candidates: Vec<Candidate>) -> StageOutcome<Vec<Candidate>> {
        let mut scored = Vec::with_capacity(candidates.len());
        for c in &candidates {
            let Some(product) = self.catalog.get(c.doc_id) else {
                let reason = format!("no catalog data for product '{}'", c.product_id);
                return StageOutcome::Degraded {
                    fallback: candidates,
                    event: DegradationEvent::new(Stage::BusinessScoring, reason, "retrieval order"),
                };
            };
            scored.push(self.score_product(product, c.final_score));
        }

        for (c, s) in candidates.iter_mut().zip(scored) {
            c.business_score = Some(s.business_score);
            c.final_score = s.final_score;
            c.breakdown = Some(s.breakdown);
            c.boosts = Some(s.boosts);
        }
        sort_by_final_score(&mut candidates);
        StageOutcome::Completed(candidates)
    }

    /// Top factors and active boosts of a score.
    pub fn explain(&self, score: &BusinessScore) -> ScoreExplanation {
        let mut factors = score.breakdown.factors().to_vec();
        factors.sort_by(|a, b| b.1.total_cmp(&a.1));
        factors.truncate(5);
        ScoreExplanation {
            product_id: score.product_id.clone(),
            final_score: round3(score.final_score),
            base_relevance: round3(score.base_score),
            business_score: round3(score.business_score),
            top_factors: factors,
            active_boosts: score.boosts.active(),
        }
    }

    fn breakdown(&self, product: &Product) -> ScoreBreakdown {
        ScoreBreakdown {
            stock: stock_score(product),
            ctr: engagement_score(product.ctr),
            rating: rating_score(product),
            price: self.price_score(product),
            conversion: engagement_score(product.conversion_rate),
            seller: seller_score(product),
            promotional: promotional_score(product),
            delivery: delivery_score(product.delivery_days),
            freshness: config::FRESHNESS_SCORE,
            brand: brand_score(&product.brand),
        }
    }

    /// Position against the category's average in-stock price, lifted by the discount.
    fn price_score(&self, product: &Product) -> f32 {
        if product.price <= 0.0 {
            return 0.1;
        }
        let discount_boost = 1.0 + (product.discount_percentage / 100.0) * 0.3;
        let competitiveness = match self.price_stats.get(&self.catalog, &product.category) {
            Some(stats) if product.price <= stats.avg * 0.8 => 1.0,
            Some(stats) if product.price <= stats.avg => 0.8,
            Some(stats) if product.price <= stats.avg * 1.2 => 0.6,
            Some(_) => 0.4,
            None => 0.7,
        };
        (competitiveness * discount_boost).min(1.0) as f32
    }
}

fn stock_score(p: &Product) -> f32 {
    if !p.is_in_stock {
        return 0.0;
    }
    match p.stock_quantity {
        q if q <= 0 => 0.1,
        q if q <= 5 => 0.6,
        q if q <= 20 => 0.8,
        _ => 1.0,
    }
}

/// CTR and conversion share one shape: 0.3 without data, else 0.3 + 0.7 * min(rate / 5%, 1).
fn engagement_score(rate: f64) -> f32 {
    if rate <= 0.0 {
        return 0.3;
    }
    (0.3 + 0.7 * (rate / 0.05).min(1.0)) as f32
}

fn rating_score(p: &Product) -> f32 {
    if p.rating <= 0.0 {
        return 0.3;
    }
    let volume = match p.review_count {
        0 => 0.7,
        1..=10 => 0.8,
        11..=50 => 0.9,
        51..=100 => 0.95,
        _ => 1.0,
    };
    (p.rating / 5.0 * volume) as f32
}

fn seller_score(p: &Product) -> f32 {
    if p.is_assured {
        1.0
    } else if p.seller_rating <= 0.0 {
        0.5
    } else {
        (p.seller_rating / 5.0) as f32
    }
}

fn promotional_score(p: &Product) -> f32 {
    let mut score = 0.5;
    if p.discount_percentage >= 50.0 {
        score += 0.5;
    } else if p.discount_percentage >= 30.0 {
        score += 0.3;
    } else if p.discount_percentage >= 10.0 {
        score += 0.1;
    }
    if p.is_plus_product {
        score += 0.2;
    }
    f32::min(score, 1.0)
}

fn delivery_score(days: u32) -> f32 {
    match days {
        0..=1 => 1.0,
        2 => 0.9,
        3 => 0.8,
        4..=5 => 0.7,
        _ => 0.5,
    }
}

fn brand_score(brand: &str) -> f32 {
    let brand = brand.trim().to_lowercase();
    PREMIUM_BRANDS
        .iter()
        .find(|(name, _)| *name == brand)
        .map_or(DEFAULT_BRAND_SCORE, |&(_, s)| s)
}

fn boost_factors(p: &Product, breakdown: &ScoreBreakdown) -> BoostFactors {
    let (stock_penalty, stock_boost) = if breakdown.stock <= 0.1 {
        (Some(0.1), None)
    } else {
        (None, Some(1.0 + breakdown.stock * 0.2))
    };
    BoostFactors {
        stock_penalty,
        stock_boost,
        ctr_boost: if breakdown.ctr >= 0.8 { 1.3 } else { 1.0 },
        rating_boost: if breakdown.rating >= 0.8 { 1.2 } else { 1.0 },
        promotional_boost: if p.discount_percentage >= 30.0 { 1.4 } else { 1.0 },
        assured_boost: if p.is_assured { 1.3 } else { 1.0 },
    }
}

fn round3(x: f32) -> f32 {
    (x * 1000.0).round() / 1000.0
}
