//! Score normalization and hybrid fusion.
//!
//! Hybrid retrieval min-max normalizes the lexical and semantic score lists
//! independently and combines them linearly:
//!
//! `combined = w * sem + (1 - w) * lex + DUAL_PRESENCE_BONUS * min(sem, lex)`
//!
//! The last term rewards candidates both retrievers agree on. It is never negative
//! for normalized inputs, so a candidate present in both lists never scores below
//! its plain weighted sum.

use crate::config;
use crate::search::types::MatchType;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Runtime fusion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Weight of the semantic score, \[0, 1\]. Lexical gets `1 - semantic_weight`.
    pub semantic_weight: f32,
    /// Min-max normalize each list before combining. When disabled, scores are
    /// clamped to \[0, 1\] instead.
    pub normalize_scores: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            semantic_weight: config::DEFAULT_SEMANTIC_WEIGHT,
            normalize_scores: true,
        }
    }
}

/// Number of candidates each retriever contributes in hybrid mode: `min(3k, 100)`,
/// never below `k`.
pub fn expanded_k(k: usize) -> usize {
    (k * config::HYBRID_EXPANSION_FACTOR)
        .min(config::HYBRID_EXPANSION_CAP)
        .max(k)
}

/// Min-max normalizes scores in place to \[0, 1\].
///
/// A constant list uses [`NORMALIZATION_EPSILON`](config::NORMALIZATION_EPSILON) as its
/// range, so every value maps to 0.
pub fn min_max_normalize(results: &mut [(u32, f32)]) {
    let Some((min, max)) = min_max(results) else {
        return;
    };
    let range = (max - min).max(config::NORMALIZATION_EPSILON);
    for (_, s) in results.iter_mut() {
        *s = (*s - min) / range;
    }
}

/// Scales scores by the list maximum so the best result gets 1.0. Negative scores
/// (and every score when the maximum is not positive) map to 0.
pub fn max_scale(results: &mut [(u32, f32)]) {
    let max = results.iter().map(|&(_, s)| s).fold(f32::NEG_INFINITY, f32::max);
    for (_, s) in results.iter_mut() {
        *s = if max > 0.0 { (*s / max).clamp(0.0, 1.0) } else { 0.0 };
    }
}

/// Weighted sum plus dual-presence bonus, before clamping. Can exceed 1.0 for
/// strong dual matches; fusion ranks on this value.
pub fn raw_fused_score(semantic: f32, lexical: f32, semantic_weight: f32) -> f32 {
    let linear = semantic_weight * semantic + (1.0 - semantic_weight) * lexical;
    let bonus = config::DUAL_PRESENCE_BONUS * semantic.min(lexical);
    linear + bonus
}

/// Fused score of one candidate from normalized sub-scores, clamped to \[0, 1\].
pub fn fuse_scores(semantic: f32, lexical: f32, semantic_weight: f32) -> f32 {
    raw_fused_score(semantic, lexical, semantic_weight).clamp(0.0, 1.0)
}

/// Match type from normalized sub-scores, falling back to source presence when
/// both are zero.
pub fn match_type(semantic: f32, lexical: f32, in_semantic: bool, in_lexical: bool) -> MatchType {
    match (semantic > 0.0, lexical > 0.0) {
        (true, true) => MatchType::Hybrid,
        (true, false) => MatchType::Semantic,
        (false, true) => MatchType::Lexical,
        (false, false) => match (in_semantic, in_lexical) {
            (true, true) => MatchType::Hybrid,
            (true, false) => MatchType::Semantic,
            _ => MatchType::Lexical,
        },
    }
}

/// One fused entry: doc id, semantic, lexical, combined, match type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fused {
    pub doc_id: u32,
    pub semantic: f32,
    pub lexical: f32,
    pub combined: f32,
    pub match_type: MatchType,
}

/// Combines the two result lists and keeps the top `k`.
///
/// Selection and order use the unclamped fused score, so dual matches above 1.0
/// keep their relative order even though `combined` is stored clamped. Ties go to
/// the lower doc id.
pub fn hybrid_fusion(
    semantic_results: &[(u32, f32)],
    lexical_results: &[(u32, f32)],
    config: &FusionConfig,
    k: usize,
) -> Vec<Fused> {
    let mut semantic = semantic_results.to_vec();
    let mut lexical = lexical_results.to_vec();
    if config.normalize_scores {
        min_max_normalize(&mut semantic);
        min_max_normalize(&mut lexical);
    } else {
        for (_, s) in semantic.iter_mut().chain(lexical.iter_mut()) {
            *s = s.clamp(0.0, 1.0);
        }
    }

    let mut merged: HashMap<u32, (Option<f32>, Option<f32>)> =
        HashMap::with_capacity(semantic.len() + lexical.len());
    for &(id, s) in &semantic {
        merged.entry(id).or_default().0 = Some(s);
    }
    for &(id, s) in &lexical {
        merged.entry(id).or_default().1 = Some(s);
    }

    // Partial sort: O(n log k) via min-heap of size k
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<u32>)>> =
        BinaryHeap::with_capacity(k + 1);
    let mut entries: HashMap<u32, Fused> = HashMap::with_capacity(merged.len());
    for (id, (sem, lex)) in merged {
        let s = sem.unwrap_or(0.0);
        let l = lex.unwrap_or(0.0);
        let raw = raw_fused_score(s, l, config.semantic_weight);
        entries.insert(
            id,
            Fused {
                doc_id: id,
                semantic: s,
                lexical: l,
                combined: raw.clamp(0.0, 1.0),
                match_type: match_type(s, l, sem.is_some(), lex.is_some()),
            },
        );
        heap.push(Reverse((OrderedFloat(raw), Reverse(id))));
        if heap.len() > k {
            heap.pop();
        }
    }

    let mut ranked: Vec<(OrderedFloat<f32>, u32)> = heap
        .into_iter()
        .map(|Reverse((raw, Reverse(id)))| (raw, id))
        .collect();
    ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked
        .into_iter()
        .filter_map(|(_, id)| entries.get(&id).copied())
        .collect()
}

/// Single-pass min/max computation.
fn min_max(results: &[(u32, f32)]) -> Option<(f32, f32)> {
    if results.is_empty() {
        return None;
    }
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &(_, s) in results {
        if s < min {
            min = s;
        }
        if s > max {
            max = s;
        }
    }
    Some((min, max))
}
