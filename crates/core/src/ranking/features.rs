//! Reranker feature extraction and standardization.
//!
//! Feature order is fixed and shared by training and inference:
//! `[semantic_score, lexical_score, price, rating, 1/position, is_semantic, is_lexical, is_hybrid]`.

use crate::error::TrainingError;
use crate::product::Product;
use crate::search::types::{Candidate, MatchType};
use crate::storage::persistence::{Artifact, ArtifactKind};
use serde::{Deserialize, Serialize};

/// Width of a feature row.
pub const NUM_FEATURES: usize = 8;

/// Feature names in row order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "semantic_score",
    "lexical_score",
    "price",
    "rating",
    "position_bias",
    "is_semantic_match",
    "is_lexical_match",
    "is_hybrid_match",
];

/// One feature row.
pub type FeatureRow = [f32; NUM_FEATURES];

/// A logged search result: the signals available when the result was shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    #[serde(alias = "id")]
    pub product_id: String,
    #[serde(default)]
    pub semantic_score: f32,
    #[serde(default)]
    pub lexical_score: f32,
    #[serde(default)]
    pub price: f32,
    #[serde(default)]
    pub rating: f32,
    /// 1-based rank at which the result was shown.
    #[serde(default = "first_position")]
    pub position: usize,
    #[serde(default = "default_match_type")]
    pub match_type: MatchType,
}

fn first_position() -> usize {
    1
}

fn default_match_type() -> MatchType {
    MatchType::Hybrid
}

impl ResultSnapshot {
    /// Snapshot of a live candidate and its product.
    pub fn from_candidate(candidate: &Candidate, product: &Product) -> Self {
        Self {
            product_id: candidate.product_id.clone(),
            semantic_score: candidate.semantic_score,
            lexical_score: candidate.lexical_score,
            price: product.price as f32,
            rating: product.rating as f32,
            position: candidate.position,
            match_type: candidate.match_type,
        }
    }

    pub fn features(&self) -> FeatureRow {
        let [sem, lex, hyb] = self.match_type.one_hot();
        [
            self.semantic_score,
            self.lexical_score,
            self.price,
            self.rating,
            1.0 / self.position.max(1) as f32,
            sem,
            lex,
            hyb,
        ]
    }
}

/// Per-feature mean and standard deviation fit on the training rows.
///
/// A feature with zero variance keeps a standard deviation of 1 so it passes through centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl StandardScaler {
    pub fn fit(rows: &[FeatureRow]) -> Result<Self, TrainingError> {
        if rows.is_empty() {
            return Err(TrainingError::EmptyTrainingSet(
                "cannot fit a feature scaler on zero rows".to_string(),
            ));
        }
        let n = rows.len() as f64;
        let mut mean = [0f64; NUM_FEATURES];
        for row in rows {
            for (m, &x) in mean.iter_mut().zip(row) {
                *m += x as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = [0f64; NUM_FEATURES];
        for row in rows {
            for ((v, &m), &x) in var.iter_mut().zip(&mean).zip(row) {
                let d = x as f64 - m;
                *v += d * d;
            }
        }

        Ok(Self {
            mean: mean.iter().map(|&m| m as f32).collect(),
            std: var
                .iter()
                .map(|&v| {
                    let s = (v / n).sqrt() as f32;
                    if s > f32::EPSILON && s.is_finite() {
                        s
                    } else {
                        1.0
                    }
                })
                .collect(),
        })
    }

    pub fn transform(&self, row: &FeatureRow) -> FeatureRow {
        let mut out = *row;
        for ((x, m), s) in out.iter_mut().zip(&self.mean).zip(&self.std) {
            *x = (*x - m) / s;
        }
        out
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn std(&self) -> &[f32] {
        &self.std
    }
}

impl Artifact for StandardScaler {
    const KIND: ArtifactKind = ArtifactKind::FeatureScaler;

    fn validate(&self) -> Result<(), String> {
        if self.mean.len() != NUM_FEATURES || self.std.len() != NUM_FEATURES {
            return Err(format!(
                "scaler has {} means and {} stds, expected {NUM_FEATURES}",
                self.mean.len(),
                self.std.len()
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("non-finite mean".to_string());
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("standard deviations must be finite and positive".to_string());
        }
        Ok(())
    }
}
