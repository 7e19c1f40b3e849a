//! Retrieval modes and the per-query candidate type.

use crate::error::UsageError;
use crate::scoring::{BoostFactors, ScoreBreakdown};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Lexical,
    Semantic,
    Hybrid,
    /// Picks one of the other three from the shape of the query.
    #[default]
    Auto,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Lexical => "lexical",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
            SearchMode::Auto => "auto",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" | "keyword" | "bm25" => Ok(SearchMode::Lexical),
            "semantic" | "vector" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            "auto" => Ok(SearchMode::Auto),
            other => Err(UsageError::InvalidMode(other.to_string())),
        }
    }
}

/// Which retrievers contributed to a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Lexical,
    Semantic,
    Hybrid,
}

impl MatchType {
    /// One-hot position used by the reranker features: semantic, lexical, hybrid.
    pub fn one_hot(self) -> [f32; 3] {
        match self {
            MatchType::Semantic => [1.0, 0.0, 0.0],
            MatchType::Lexical => [0.0, 1.0, 0.0],
            MatchType::Hybrid => [0.0, 0.0, 1.0],
        }
    }
}

/// A product under consideration for one query. Created fresh per query.
///
/// `combined_score`, `business_score`, and `final_score` are always in \[0, 1\];
/// `position` is 1-based and contiguous after every sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Internal document id (catalog position).
    #[serde(skip)]
    pub doc_id: u32,
    pub product_id: String,
    /// Min-max normalized in hybrid retrieval. Lexical and semantic retrieval keep
    /// the raw index score here (BM25 or cosine) and leave the other sub-score at 0,
    /// so the scale follows the mode. Reranker features read these as-is; the
    /// match-type one-hot tells the model which scale it is looking at.
    pub semantic_score: f32,
    /// See `semantic_score`.
    pub lexical_score: f32,
    pub combined_score: f32,
    /// Set by the business scorer.
    pub business_score: Option<f32>,
    /// Score of the last executed stage; equals `combined_score` after retrieval.
    pub final_score: f32,
    /// Raw model output, set by the reranker.
    pub ml_score: Option<f32>,
    pub position: usize,
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boosts: Option<BoostFactors>,
}

impl Candidate {
    /// A fresh retrieval candidate with `final_score = combined_score`.
    pub fn new(
        doc_id: u32,
        product_id: impl Into<String>,
        semantic_score: f32,
        lexical_score: f32,
        combined_score: f32,
        match_type: MatchType,
    ) -> Self {
        Self {
            doc_id,
            product_id: product_id.into(),
            semantic_score,
            lexical_score,
            combined_score,
            business_score: None,
            final_score: combined_score,
            ml_score: None,
            position: 0,
            match_type,
            breakdown: None,
            boosts: None,
        }
    }
}

/// Reassigns 1-based contiguous positions in list order.
pub fn assign_positions(candidates: &mut [Candidate]) {
    for (i, c) in candidates.iter_mut().enumerate() {
        c.position = i + 1;
    }
}

/// Stable sort by descending `final_score`, ties by ascending doc id, then reassign positions.
pub fn sort_by_final_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then(a.doc_id.cmp(&b.doc_id))
    });
    assign_positions(candidates);
}
