//! Offline artifact builds and startup loading.
//!
//! Building writes every artifact independently; loading reads each one on its
//! own. A missing index leaves its retriever out (the pipeline then degrades or,
//! if the default mode needs it, refuses to start). A present but corrupt index is
//! a configuration error. Ranker artifacts always fail open.

use crate::bm25::LexicalIndex;
use crate::embedding::EmbeddingProvider;
use crate::error::{ArtifactError, ConfigError};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::orchestrator::Pipeline;
use crate::product::Catalog;
use crate::ranking::MlReranker;
use crate::search::SemanticSource;
use crate::storage::ArtifactPaths;
use crate::vector::{IndexTier, VectorIndex, VectorIndexOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// What [`build_artifacts`] wrote.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub products: usize,
    pub vocabulary: usize,
    pub vector_tier: IndexTier,
    pub dimensions: usize,
    pub elapsed_ms: f64,
}

/// Builds and saves the catalog snapshot, the BM25 index, and the vector index.
pub fn build_artifacts(
    catalog: &Catalog,
    embedder: &dyn EmbeddingProvider,
    paths: &ArtifactPaths,
    options: VectorIndexOptions,
) -> Result<BuildSummary, ConfigError> {
    if catalog.is_empty() {
        return Err(ConfigError::EmptyCorpus);
    }
    let start = Instant::now();

    catalog.save(&paths.catalog())?;

    let lexical = LexicalIndex::from_catalog(catalog)?;
    lexical.save(&paths.lexical_index())?;

    let texts: Vec<String> = catalog.products().iter().map(|p| p.embedding_text()).collect();
    let embeddings = embedder.embed_batch(&texts)?;
    let vectors = VectorIndex::build_with(&embeddings, options)?;
    vectors.save(&paths.vector_index())?;

    let summary = BuildSummary {
        products: catalog.len(),
        vocabulary: lexical.vocabulary_size(),
        vector_tier: vectors.tier(),
        dimensions: vectors.dim(),
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    tracing::info!(
        products = summary.products,
        vocabulary = summary.vocabulary,
        tier = ?summary.vector_tier,
        "Artifacts built in {:.1}ms",
        summary.elapsed_ms
    );
    Ok(summary)
}

/// Loads a pipeline from an artifact directory. The catalog is required.
pub fn load_pipeline(
    paths: &ArtifactPaths,
    config: PipelineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Pipeline, ConfigError> {
    config.validate()?;
    let catalog = Arc::new(Catalog::load(&paths.catalog())?);

    let lexical = if config.enable_lexical {
        load_optional(&paths.lexical_index(), LexicalIndex::load)?.map(Arc::new)
    } else {
        None
    };
    let semantic = if config.enable_semantic {
        load_optional(&paths.vector_index(), VectorIndex::load)?.map(|index| SemanticSource {
            index: Arc::new(index),
            embedder,
        })
    } else {
        None
    };
    let reranker = if config.enable_reranking {
        MlReranker::from_artifacts(&paths.ranker_model(), &paths.feature_scaler())
    } else {
        MlReranker::untrained()
    };

    Pipeline::new(config, catalog, lexical, semantic, reranker)
}

fn load_optional<T>(
    path: &Path,
    load: impl FnOnce(&Path) -> Result<T, ArtifactError>,
) -> Result<Option<T>, ConfigError> {
    match load(path) {
        Ok(value) => Ok(Some(value)),
        Err(ArtifactError::NotFound(p)) => {
            tracing::warn!("Artifact {} not found, continuing without it", p);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::pipeline::config::Preset;
    use crate::pipeline::orchestrator::SearchRequest;
    use crate::product::Product;

    fn catalog() -> Catalog {
        Catalog::new(
            ["red cotton t-shirt", "blue denim jeans", "wireless headphones", "smartphone camera", "gaming laptop"]
                .iter()
                .enumerate()
                .map(|(i, t)| Product::new(format!("p{i}"), *t))
                .collect(),
        )
        .unwrap()
    }

    fn embedder() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbedder::new(32))
    }

    #[test]
    fn test_build_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        let summary = build_artifacts(&catalog(), embedder().as_ref(), &paths, VectorIndexOptions::default()).unwrap();
        assert_eq!(summary.products, 5);
        assert_eq!(summary.vector_tier, IndexTier::Flat);

        let pipeline = load_pipeline(&paths, PipelineConfig::preset(Preset::Business), embedder()).unwrap();
        assert!(pipeline.retriever().has_lexical() && pipeline.retriever().has_semantic());
        let resp = pipeline.search(&SearchRequest::new("denim jeans")).unwrap();
        assert_eq!(resp.hits[0].candidate.product_id, "p1");
    }

    #[test]
    fn test_missing_vector_index_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        build_artifacts(&catalog(), embedder().as_ref(), &paths, VectorIndexOptions::default()).unwrap();
        std::fs::remove_file(paths.vector_index()).unwrap();

        let pipeline = load_pipeline(&paths, PipelineConfig::preset(Preset::Relevance), embedder()).unwrap();
        assert!(!pipeline.retriever().has_semantic());
        let resp = pipeline
            .search(&SearchRequest::new("gaming laptop").mode(crate::search::SearchMode::Hybrid))
            .unwrap();
        assert_eq!(resp.hits[0].candidate.product_id, "p4");
        assert!(resp.is_degraded());

        assert!(matches!(
            load_pipeline(&paths, PipelineConfig::preset(Preset::Semantic), embedder()),
            Err(ConfigError::MissingRetriever { .. })
        ));
    }

    #[test]
    fn test_corrupt_index_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        build_artifacts(&catalog(), embedder().as_ref(), &paths, VectorIndexOptions::default()).unwrap();
        let mut bytes = std::fs::read(paths.lexical_index()).unwrap();
        bytes[0] ^= 0xff;
        std::fs::write(paths.lexical_index(), bytes).unwrap();
        assert!(matches!(
            load_pipeline(&paths, PipelineConfig::preset(Preset::Lexical), embedder()),
            Err(ConfigError::Artifact(ArtifactError::Checksum { .. }))
        ));
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_pipeline(&ArtifactPaths::new(dir.path()), PipelineConfig::default(), embedder()).unwrap_err();
        assert!(matches!(err, ConfigError::Artifact(ArtifactError::NotFound(_))));
    }

    #[test]
    fn test_embedder_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        build_artifacts(&catalog(), embedder().as_ref(), &paths, VectorIndexOptions::default()).unwrap();
        let err = load_pipeline(
            &paths,
            PipelineConfig::preset(Preset::Relevance),
            Arc::new(HashingEmbedder::new(16)),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DimensionMismatch { expected: 32, got: 16 }));
    }
}
