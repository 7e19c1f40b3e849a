//! BM25 Okapi scoring engine.
//!
//! Scores documents against a query using the BM25 formula with the `k1` and `b`
//! parameters stored in the index (defaults in [`crate::config`]). Only documents in
//! the postings lists of the query terms are visited.

use crate::bm25::inverted_index::LexicalIndex;
use crate::bm25::tokenizer::tokenize;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// BM25 Okapi scoring for a query against the lexical index.
///
/// Returns at most `k` (internal_id, score) pairs sorted by descending score, ties
/// broken by ascending id. Documents whose summed score is not positive are omitted,
/// so empty or all-unknown-term queries return an empty list. Repeated query terms
/// contribute once per occurrence.
pub fn bm25_search(index: &LexicalIndex, query: &str, k: usize) -> Vec<(u32, f32)> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() || k == 0 || index.doc_count() == 0 {
        return Vec::new();
    }

    let avgdl = index.avg_doc_length;
    let k1 = index.params.k1;
    let b = index.params.b;

    let mut scores: HashMap<u32, f32> = HashMap::with_capacity(256.min(index.doc_count()));

    for token in query_tokens.iter() {
        let (Some(postings), Some(&idf)) = (index.postings.get(token), index.idf.get(token)) else {
            continue;
        };
        for posting in postings {
            let dl = index
                .doc_lengths
                .get(posting.doc_id as usize)
                .copied()
                .unwrap_or(0) as f32;
            let tf = posting.term_frequency as f32;

            // A document in a postings list has at least one token, so avgdl > 0 here.
            let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
            *scores.entry(posting.doc_id).or_insert(0.0) += idf * tf_norm;
        }
    }

    // Partial sort: O(n log k) via min-heap of size k. On equal scores the
    // larger id is evicted first.
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<u32>)>> =
        BinaryHeap::with_capacity(k + 1);
    for (id, score) in scores {
        if score <= 0.0 || !score.is_finite() {
            continue;
        }
        heap.push(Reverse((OrderedFloat(score), Reverse(id))));
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut results: Vec<(u32, f32)> = heap
        .into_iter()
        .map(|Reverse((s, Reverse(id)))| (id, s.0))
        .collect();
    results.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_corpus() -> LexicalIndex {
        LexicalIndex::fit(&[
            "rust programming systems language fast",
            "python programming scripting easy",
            "java enterprise programming verbose",
            "rust memory safety zero cost abstractions",
            "go concurrency simple",
            "haskell pure functional",
        ])
        .unwrap()
    }

    #[test]
    fn test_bm25_empty_query() {
        let idx = build_corpus();
        assert!(bm25_search(&idx, "", 10).is_empty());
        assert!(bm25_search(&idx, "  ?! ", 10).is_empty());
    }

    #[test]
    fn test_bm25_finds_matching_docs() {
        let idx = build_corpus();
        let results = bm25_search(&idx, "rust", 10);
        let ids: Vec<u32> = results.iter().map(|&(id, _)| id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&0), "doc 0 contains 'rust'");
        assert!(ids.contains(&3), "doc 3 contains 'rust'");
    }

    #[test]
    fn test_bm25_ranking_order() {
        let idx = LexicalIndex::fit(&["rust rust rust", "rust programming", "go", "java", "python"]).unwrap();
        let results = bm25_search(&idx, "rust", 10);
        assert!(results.len() >= 2);
        assert_eq!(results[0].0, 0, "doc with higher TF should rank first");
    }

    #[test]
    fn test_bm25_exact_score() {
        // N = 3, df("laptop") = 1, every doc has 2 tokens so dl / avgdl = 1.
        let idx = LexicalIndex::fit(&["gaming laptop", "wireless headphones", "smartphone camera"]).unwrap();
        let results = bm25_search(&idx, "laptop", 10);
        assert_eq!(results.len(), 1);
        let idf = (2.5f32 / 1.5).ln();
        let expected = idf * (1.0 * 2.5) / (1.0 + 1.5);
        assert!((results[0].1 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_bm25_no_match() {
        let idx = build_corpus();
        assert!(bm25_search(&idx, "nonexistent_xyz_term", 10).is_empty());
    }

    #[test]
    fn test_bm25_k_truncation() {
        let idx = build_corpus();
        let results = bm25_search(&idx, "rust programming", 2);
        assert_eq!(results.len(), 2);
        assert!(bm25_search(&idx, "rust", 0).is_empty());
    }

    #[test]
    fn test_bm25_omits_non_positive_scores() {
        // "programming" appears in 3 of 6 documents: idf = ln(3.5 / 3.5) = 0.
        let idx = build_corpus();
        assert!(bm25_search(&idx, "programming", 10).is_empty());
        for &(_, score) in &bm25_search(&idx, "rust programming", 10) {
            assert!(score > 0.0, "BM25 scores should be positive, got {score}");
        }
    }

    #[test]
    fn test_bm25_deterministic_ties() {
        let idx = LexicalIndex::fit(&[
            "alpha beta",
            "alpha beta",
            "gamma delta",
            "epsilon zeta",
            "eta theta",
            "iota kappa",
        ])
        .unwrap();
        let first = bm25_search(&idx, "alpha", 10);
        assert_eq!(first.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(bm25_search(&idx, "alpha", 1), vec![first[0]]);
    }
}
