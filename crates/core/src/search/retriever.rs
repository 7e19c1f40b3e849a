//! Fusion retriever: lexical, semantic, hybrid, and auto retrieval over one catalog.
//!
//! The retriever owns shared read-only handles to the indices. A missing or failing
//! retriever degrades hybrid search to the other one; only the absence of both is
//! an error, raised at construction.

use crate::bm25::tokenizer::word_count;
use crate::bm25::LexicalIndex;
use crate::config;
use crate::degradation::{DegradationEvent, Stage, StageOutcome};
use crate::embedding::EmbeddingProvider;
use crate::error::{ConfigError, EmbeddingError};
use crate::product::Catalog;
use crate::search::hybrid::{expanded_k, hybrid_fusion, max_scale, FusionConfig};
use crate::search::types::{assign_positions, Candidate, MatchType, SearchMode};
use crate::vector::VectorIndex;
use std::sync::Arc;
use std::time::Instant;

/// Vector index plus the provider that embeds queries into its space.
#[derive(Clone)]
pub struct SemanticSource {
    pub index: Arc<VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

/// Candidates of one retrieval and the mode that actually produced them.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub mode: SearchMode,
    pub candidates: Vec<Candidate>,
}

/// Picks a concrete mode from the shape of the query.
///
/// Semantic for natural-language questions (more than 3 words with an
/// interrogative or superlative term), lexical for short queries with a digit
/// (model numbers, sizes, specs), hybrid otherwise.
pub fn auto_mode(query: &str) -> SearchMode {
    let words = word_count(query);
    let lower = query.to_lowercase();
    let has_question_term = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| config::AUTO_SEMANTIC_TERMS.contains(&w));

    if words > config::AUTO_SEMANTIC_MIN_TOKENS && has_question_term {
        SearchMode::Semantic
    } else if query.chars().any(|c| c.is_ascii_digit()) && words < config::AUTO_LEXICAL_MAX_TOKENS {
        SearchMode::Lexical
    } else {
        SearchMode::Hybrid
    }
}

/// Merges lexical and semantic retrieval into one ranked candidate list.
pub struct FusionRetriever {
    catalog: Arc<Catalog>,
    lexical: Option<Arc<LexicalIndex>>,
    semantic: Option<SemanticSource>,
    config: FusionConfig,
}

impl FusionRetriever {
    /// Validates that at least one retriever is present and that every index covers
    /// exactly the catalog.
    pub fn new(
        catalog: Arc<Catalog>,
        lexical: Option<Arc<LexicalIndex>>,
        semantic: Option<SemanticSource>,
        config: FusionConfig,
    ) -> Result<Self, ConfigError> {
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCorpus);
        }
        if !(0.0..=1.0).contains(&config.semantic_weight) {
            return Err(ConfigError::InvalidParameter {
                name: "semantic_weight",
                reason: format!("must be in [0, 1], got {}", config.semantic_weight),
            });
        }
        if lexical.is_none() && semantic.is_none() {
            return Err(ConfigError::NoRetriever);
        }
        if let Some(ref idx) = lexical {
            if idx.doc_count() != catalog.len() {
                return Err(ConfigError::CorpusMismatch {
                    component: "lexical index",
                    expected: catalog.len(),
                    got: idx.doc_count(),
                });
            }
        }
        if let Some(ref source) = semantic {
            if source.index.len() != catalog.len() {
                return Err(ConfigError::CorpusMismatch {
                    component: "vector index",
                    expected: catalog.len(),
                    got: source.index.len(),
                });
            }
            if source.embedder.dimensions() != source.index.dim() {
                return Err(ConfigError::DimensionMismatch {
                    expected: source.index.dim(),
                    got: source.embedder.dimensions(),
                });
            }
        }
        Ok(Self {
            catalog,
            lexical,
            semantic,
            config,
        })
    }

    pub fn has_lexical(&self) -> bool {
        self.lexical.is_some()
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic.is_some()
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Resolves `Auto` from the query and the loaded retrievers. Explicit modes are
    /// returned unchanged and degrade at search time if their retriever is missing.
    pub fn resolve_mode(&self, query: &str, mode: SearchMode) -> SearchMode {
        if mode != SearchMode::Auto {
            return mode;
        }
        match (auto_mode(query), self.has_lexical(), self.has_semantic()) {
            (_, true, false) => SearchMode::Lexical,
            (_, false, true) => SearchMode::Semantic,
            (m, _, _) => m,
        }
    }

    /// Retrieves the top `k` candidates for `query`.
    pub fn search(&self, query: &str, k: usize, mode: SearchMode) -> StageOutcome<Retrieval> {
        let start = Instant::now();
        let requested = mode;
        let mode = self.resolve_mode(query, requested);
        let outcome = match mode {
            SearchMode::Lexical => self.lexical_or_fallback(query, k),
            SearchMode::Semantic => self.semantic_or_fallback(query, k),
            _ => self.hybrid(query, k),
        };
        tracing::debug!(
            requested = %requested,
            resolved = %outcome.value().mode,
            results = outcome.value().candidates.len(),
            "Retrieval for '{}' took {:.2}ms",
            query,
            start.elapsed().as_secs_f64() * 1000.0
        );
        outcome
    }

    fn lexical_or_fallback(&self, query: &str, k: usize) -> StageOutcome<Retrieval> {
        match self.lexical {
            Some(ref idx) => StageOutcome::Completed(self.lexical_only(idx, query, k)),
            None => match self.semantic_hits(query, k) {
                Ok(hits) => StageOutcome::Degraded {
                    fallback: self.semantic_only(hits),
                    event: DegradationEvent::new(
                        Stage::LexicalSearch,
                        "lexical index not loaded",
                        "semantic retrieval",
                    ),
                },
                Err(reason) => self.nothing(Stage::LexicalSearch, reason),
            },
        }
    }

    fn semantic_or_fallback(&self, query: &str, k: usize) -> StageOutcome<Retrieval> {
        match self.semantic_hits(query, k) {
            Ok(hits) => StageOutcome::Completed(self.semantic_only(hits)),
            Err(reason) => match self.lexical {
                Some(ref idx) => StageOutcome::Degraded {
                    fallback: self.lexical_only(idx, query, k),
                    event: DegradationEvent::new(Stage::VectorSearch, reason, "lexical retrieval"),
                },
                None => self.nothing(Stage::VectorSearch, reason),
            },
        }
    }

    fn hybrid(&self, query: &str, k: usize) -> StageOutcome<Retrieval> {
        let depth = expanded_k(k);
        let Some(ref lexical) = self.lexical else {
            return match self.semantic_hits(query, k) {
                Ok(hits) => StageOutcome::Degraded {
                    fallback: self.semantic_only(hits),
                    event: DegradationEvent::new(
                        Stage::LexicalSearch,
                        "lexical index not loaded",
                        "semantic retrieval",
                    ),
                },
                Err(reason) => self.nothing(Stage::VectorSearch, reason),
            };
        };
        let semantic = match self.semantic_hits(query, depth) {
            Ok(hits) => hits,
            Err(reason) => {
                return StageOutcome::Degraded {
                    fallback: self.lexical_only(lexical, query, k),
                    event: DegradationEvent::new(Stage::VectorSearch, reason, "lexical retrieval"),
                };
            }
        };
        let lexical_hits = lexical.search(query, depth);

        let mut candidates: Vec<Candidate> = hybrid_fusion(&semantic, &lexical_hits, &self.config, k)
            .into_iter()
            .filter_map(|f| {
                let product = self.catalog.get(f.doc_id)?;
                Some(Candidate::new(
                    f.doc_id,
                    product.product_id.clone(),
                    f.semantic,
                    f.lexical,
                    f.combined,
                    f.match_type,
                ))
            })
            .collect();
        assign_positions(&mut candidates);
        StageOutcome::Completed(Retrieval {
            mode: SearchMode::Hybrid,
            candidates,
        })
    }

    /// Embeds the query and searches the vector index.
    fn semantic_hits(&self, query: &str, k: usize) -> Result<Vec<(u32, f32)>, String> {
        let source = self
            .semantic
            .as_ref()
            .ok_or_else(|| "vector index not loaded".to_string())?;
        let embedding = source.embedder.embed(query).map_err(|e| e.to_string())?;
        if embedding.len() != source.index.dim() {
            return Err(EmbeddingError::Dimension {
                expected: source.index.dim(),
                got: embedding.len(),
            }
            .to_string());
        }
        source.index.search(&embedding, k).map_err(|e| e.to_string())
    }

    fn lexical_only(&self, index: &LexicalIndex, query: &str, k: usize) -> Retrieval {
        let hits = index.search(query, k);
        Retrieval {
            mode: SearchMode::Lexical,
            candidates: self.single_source(hits, MatchType::Lexical),
        }
    }

    fn semantic_only(&self, hits: Vec<(u32, f32)>) -> Retrieval {
        Retrieval {
            mode: SearchMode::Semantic,
            candidates: self.single_source(hits, MatchType::Semantic),
        }
    }

    /// Raw scores are kept as the sub-score; `combined_score` is max-scaled into \[0, 1\].
    fn single_source(&self, hits: Vec<(u32, f32)>, match_type: MatchType) -> Vec<Candidate> {
        let mut scaled = hits.clone();
        max_scale(&mut scaled);
        let mut candidates: Vec<Candidate> = hits
            .iter()
            .zip(&scaled)
            .filter_map(|(&(doc_id, raw), &(_, combined))| {
                let product = self.catalog.get(doc_id)?;
                let (semantic, lexical) = match match_type {
                    MatchType::Semantic => (raw, 0.0),
                    _ => (0.0, raw),
                };
                Some(Candidate::new(
                    doc_id,
                    product.product_id.clone(),
                    semantic,
                    lexical,
                    combined,
                    match_type,
                ))
            })
            .collect();
        assign_positions(&mut candidates);
        candidates
    }

    fn nothing(&self, stage: Stage, reason: String) -> StageOutcome<Retrieval> {
        StageOutcome::Degraded {
            fallback: Retrieval {
                mode: SearchMode::Lexical,
                candidates: Vec::new(),
            },
            event: DegradationEvent::new(stage, reason, "no retriever available, empty result"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::product::Product;

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        fn dimensions(&self) -> usize {
            crate::config::HASHING_EMBEDDER_DIM
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("connection refused".to_string()))
        }
    }

    fn catalog() -> Arc<Catalog> {
        let titles = [
            "red cotton t-shirt",
            "blue denim jeans",
            "wireless headphones",
            "smartphone camera",
            "gaming laptop",
        ];
        let products = titles
            .iter()
            .enumerate()
            .map(|(i, t)| Product::new(format!("p{i}"), *t))
            .collect();
        Arc::new(Catalog::new(products).unwrap())
    }

    fn semantic_source(catalog: &Catalog, embedder: Arc<dyn EmbeddingProvider>) -> SemanticSource {
        let hashing = HashingEmbedder::default();
        let texts: Vec<String> = catalog.products().iter().map(|p| p.embedding_text()).collect();
        let vectors = hashing.embed_batch(&texts).unwrap();
        SemanticSource {
            index: Arc::new(VectorIndex::build(&vectors, None).unwrap()),
            embedder,
        }
    }

    fn retriever(with_lexical: bool, embedder: Option<Arc<dyn EmbeddingProvider>>) -> FusionRetriever {
        let catalog = catalog();
        let lexical = with_lexical.then(|| Arc::new(LexicalIndex::from_catalog(&catalog).unwrap()));
        let semantic = embedder.map(|e| semantic_source(&catalog, e));
        FusionRetriever::new(catalog, lexical, semantic, FusionConfig::default()).unwrap()
    }

    #[test]
    fn test_auto_mode() {
        assert_eq!(auto_mode("what is the best phone for photos"), SearchMode::Semantic);
        assert_eq!(auto_mode("iphone 15 128gb"), SearchMode::Lexical);
        assert_eq!(auto_mode("blue jeans"), SearchMode::Hybrid);
        // Three words is not more than three.
        assert_eq!(auto_mode("best running shoes"), SearchMode::Hybrid);
        // "show" contains "how" but is not the word "how".
        assert_eq!(auto_mode("show me red cotton shirts"), SearchMode::Hybrid);
    }

    #[test]
    fn test_lexical_mode_ranks_title_match() {
        let r = retriever(true, None);
        let out = r.search("blue jeans", 5, SearchMode::Lexical);
        assert!(!out.is_degraded());
        let retrieval = out.value();
        assert_eq!(retrieval.candidates[0].product_id, "p1");
        assert_eq!(retrieval.candidates[0].combined_score, 1.0);
        assert_eq!(retrieval.candidates[0].position, 1);
    }

    #[test]
    fn test_single_source_keeps_raw_sub_scores() {
        let r = retriever(true, Some(Arc::new(HashingEmbedder::default())));
        let raw = r.lexical.as_ref().unwrap().search("blue jeans", 5);

        let lexical = r.search("blue jeans", 5, SearchMode::Lexical);
        let top = &lexical.value().candidates[0];
        assert_eq!(top.match_type, MatchType::Lexical);
        assert_eq!(top.lexical_score, raw[0].1);
        assert_eq!(top.combined_score, 1.0);
        assert_eq!(top.semantic_score, 0.0);

        let hybrid = r.search("blue jeans", 5, SearchMode::Hybrid);
        for c in &hybrid.value().candidates {
            assert!((0.0..=1.0).contains(&c.lexical_score));
            assert!((0.0..=1.0).contains(&c.semantic_score));
        }
    }

    #[test]
    fn test_hybrid_mode_scores_in_unit_range() {
        let r = retriever(true, Some(Arc::new(HashingEmbedder::default())));
        let out = r.search("denim jeans", 3, SearchMode::Hybrid);
        assert!(!out.is_degraded());
        let retrieval = out.value();
        assert_eq!(retrieval.mode, SearchMode::Hybrid);
        assert!(retrieval.candidates.len() <= 3);
        assert_eq!(retrieval.candidates[0].product_id, "p1");
        for c in &retrieval.candidates {
            assert!((0.0..=1.0).contains(&c.combined_score));
        }
    }

    #[test]
    fn test_hybrid_degrades_to_lexical_when_embedder_fails() {
        let r = retriever(true, Some(Arc::new(FailingEmbedder)));
        let out = r.search("blue jeans", 5, SearchMode::Hybrid);
        let mut events = Vec::new();
        let retrieval = out.collect_into(&mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage, Stage::VectorSearch);
        assert_eq!(retrieval.mode, SearchMode::Lexical);
        assert_eq!(retrieval.candidates[0].product_id, "p1");
    }

    #[test]
    fn test_semantic_without_vectors_degrades() {
        let r = retriever(true, None);
        let out = r.search("blue jeans", 5, SearchMode::Semantic);
        assert!(out.is_degraded());
        assert_eq!(out.value().mode, SearchMode::Lexical);
    }

    #[test]
    fn test_auto_uses_available_retriever() {
        let r = retriever(true, None);
        assert_eq!(r.resolve_mode("blue jeans", SearchMode::Auto), SearchMode::Lexical);
        let out = r.search("blue jeans", 5, SearchMode::Auto);
        assert!(!out.is_degraded());
    }

    #[test]
    fn test_no_retriever_is_config_error() {
        let err = FusionRetriever::new(catalog(), None, None, FusionConfig::default()).err();
        assert!(matches!(err, Some(ConfigError::NoRetriever)));
    }

    #[test]
    fn test_corpus_mismatch_rejected() {
        let small = LexicalIndex::fit(&["only one document"]).unwrap();
        let err = FusionRetriever::new(catalog(), Some(Arc::new(small)), None, FusionConfig::default()).err();
        assert!(matches!(err, Some(ConfigError::CorpusMismatch { expected: 5, got: 1, .. })));
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let catalog = catalog();
        let lexical = Arc::new(LexicalIndex::from_catalog(&catalog).unwrap());
        let config = FusionConfig {
            semantic_weight: 1.5,
            normalize_scores: true,
        };
        let err = FusionRetriever::new(catalog, Some(lexical), None, config).err();
        assert!(matches!(err, Some(ConfigError::InvalidParameter { name: "semantic_weight", .. })));
    }
}
