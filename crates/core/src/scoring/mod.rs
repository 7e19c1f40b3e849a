//! Business scoring: ten rule-based sub-scores, boost factors, score explanations,
//! and the category price statistics cache the price factor reads.

/// Business scorer, weights, breakdowns, and boosts.
pub mod business;
/// Lazily cached per-category price statistics.
pub mod price_stats;

pub use business::{
    BoostFactors, BusinessScore, BusinessScorer, BusinessWeights, ScoreBreakdown, ScoreExplanation,
};
pub use price_stats::{CategoryPriceStats, PriceStats};
