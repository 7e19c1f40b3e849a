//! Inverted index and corpus statistics for BM25 full-text search.
//!
//! Maps terms to postings lists (document ID + term frequency) and keeps the
//! per-term IDF, per-document token lengths, and the corpus average length.
//! Documents are identified by internal u32 IDs (catalog positions). The index is
//! built once by [`LexicalIndex::fit`] and never mutated afterwards.

use crate::bm25::tokenizer::tokenize;
use crate::config;
use crate::error::{ArtifactError, ConfigError};
use crate::product::Catalog;
use crate::storage::{load_artifact, save_artifact, Artifact, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A single entry in a term's postings list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Internal u32 document ID.
    pub doc_id: u32,
    /// Number of times the term appears in this document.
    pub term_frequency: u32,
}

/// BM25 Okapi parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: config::BM25_K1,
            b: config::BM25_B,
        }
    }
}

/// Term statistics over a fixed corpus.
#[derive(Debug, Serialize, Deserialize)]
pub struct LexicalIndex {
    /// term → list of postings, sorted by doc_id
    pub(crate) postings: HashMap<String, Vec<Posting>>,
    /// term → ln((N - df + 0.5) / (df + 0.5)); negative for terms in more than half the corpus
    pub(crate) idf: HashMap<String, f32>,
    /// internal_id → document length in tokens
    pub(crate) doc_lengths: Vec<u32>,
    pub(crate) avg_doc_length: f32,
    pub(crate) params: Bm25Params,
}

impl LexicalIndex {
    /// Fit with the default k1/b.
    pub fn fit<S: AsRef<str>>(corpus: &[S]) -> Result<Self, ConfigError> {
        Self::fit_with_params(corpus, Bm25Params::default())
    }

    /// Tokenize every document and record df, document lengths, and IDF.
    pub fn fit_with_params<S: AsRef<str>>(
        corpus: &[S],
        params: Bm25Params,
    ) -> Result<Self, ConfigError> {
        if corpus.is_empty() {
            return Err(ConfigError::EmptyCorpus);
        }
        if !(params.k1.is_finite() && params.k1 >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "k1",
                reason: format!("must be finite and non-negative, got {}", params.k1),
            });
        }
        if !(0.0..=1.0).contains(&params.b) {
            return Err(ConfigError::InvalidParameter {
                name: "b",
                reason: format!("must be in [0, 1], got {}", params.b),
            });
        }

        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(corpus.len());
        let mut total_len: u64 = 0;

        for (doc_id, text) in corpus.iter().enumerate() {
            let tokens = tokenize(text.as_ref());
            doc_lengths.push(tokens.len() as u32);
            total_len += tokens.len() as u64;

            // Count term frequencies for this doc
            let mut tf_map: HashMap<&str, u32> = HashMap::new();
            for token in tokens.iter() {
                *tf_map.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in tf_map {
                postings.entry(term.to_string()).or_default().push(Posting {
                    doc_id: doc_id as u32,
                    term_frequency: tf,
                });
            }
        }

        let n = corpus.len() as f32;
        let idf = postings
            .iter()
            .map(|(term, list)| {
                let df = list.len() as f32;
                (term.clone(), ((n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        let index = Self {
            postings,
            idf,
            doc_lengths,
            avg_doc_length: total_len as f32 / n,
            params,
        };
        tracing::info!(
            "Fitted lexical index: {} documents, {} terms, avgdl={:.2}",
            index.doc_count(),
            index.vocabulary_size(),
            index.avg_doc_length
        );
        Ok(index)
    }

    /// Fit over the search text of every catalog product, in catalog order.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, ConfigError> {
        let corpus: Vec<String> = catalog.products().iter().map(|p| p.search_text()).collect();
        Self::fit(&corpus)
    }

    /// Top-k (doc_id, score) pairs, descending. See [`bm25_search`](crate::bm25::bm25_search).
    pub fn search(&self, query: &str, k: usize) -> Vec<(u32, f32)> {
        crate::bm25::scorer::bm25_search(self, query, k)
    }

    /// IDF of a term, `None` if the term never occurs in the corpus.
    pub fn idf(&self, term: &str) -> Option<f32> {
        self.idf.get(term).copied()
    }

    /// Number of documents containing the term.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    pub fn average_doc_length(&self) -> f32 {
        self.avg_doc_length
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Persist the statistics as a `LEX1` artifact.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        save_artifact(self, path)
    }

    /// Load previously saved statistics without refitting.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        load_artifact(path)
    }
}

impl Artifact for LexicalIndex {
    const KIND: ArtifactKind = ArtifactKind::LexicalIndex;

    fn validate(&self) -> Result<(), String> {
        if self.doc_lengths.is_empty() {
            return Err("index covers zero documents".to_string());
        }
        if self.postings.len() != self.idf.len() {
            return Err(format!(
                "{} postings lists but {} idf entries",
                self.postings.len(),
                self.idf.len()
            ));
        }
        let n = self.doc_lengths.len() as u32;
        for (term, list) in &self.postings {
            if list.iter().any(|p| p.doc_id >= n || p.term_frequency == 0) {
                return Err(format!("postings for '{term}' reference an invalid document"));
            }
        }
        if !self.avg_doc_length.is_finite() || self.avg_doc_length < 0.0 {
            return Err(format!("invalid average length {}", self.avg_doc_length));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_records_statistics() {
        let idx = LexicalIndex::fit(&["red cotton shirt", "blue cotton jeans", "gaming laptop"]).unwrap();
        assert_eq!(idx.doc_count(), 3);
        assert_eq!(idx.document_frequency("cotton"), 2);
        assert_eq!(idx.document_frequency("laptop"), 1);
        assert_eq!(idx.document_frequency("missing"), 0);
        assert!((idx.average_doc_length() - 8.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_idf_formula() {
        let idx = LexicalIndex::fit(&["red cotton shirt", "blue cotton jeans", "gaming laptop"]).unwrap();
        // df = 1, N = 3: ln(2.5 / 1.5)
        let expected = (2.5f32 / 1.5).ln();
        assert!((idx.idf("laptop").unwrap() - expected).abs() < 1e-6);
        // df = 2, N = 3: ln(1.5 / 2.5) is negative
        assert!(idx.idf("cotton").unwrap() < 0.0);
        assert!(idx.idf("missing").is_none());
    }

    #[test]
    fn test_term_frequency() {
        let idx = LexicalIndex::fit(&["hello hello hello world"]).unwrap();
        let postings = idx.postings.get("hello").unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].term_frequency, 3);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let corpus: Vec<String> = Vec::new();
        assert!(matches!(
            LexicalIndex::fit(&corpus),
            Err(ConfigError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let err = LexicalIndex::fit_with_params(&["a doc"], Bm25Params { k1: 1.2, b: 1.5 }).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "b", .. }));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexical.idx");
        let idx = LexicalIndex::fit(&["wireless headphones", "smartphone camera", "gaming laptop"]).unwrap();
        idx.save(&path).unwrap();
        let loaded = LexicalIndex::load(&path).unwrap();
        assert_eq!(loaded.doc_count(), 3);
        assert_eq!(loaded.search("gaming", 5), idx.search("gaming", 5));
    }
}
