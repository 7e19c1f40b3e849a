//! Long-lived search service with atomic pipeline replacement.

use crate::embedding::EmbeddingProvider;
use crate::error::{ConfigError, SearchError};
use crate::pipeline::builder::load_pipeline;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::orchestrator::{Pipeline, SearchRequest, SearchResponse};
use crate::storage::ArtifactPaths;
use parking_lot::RwLock;
use std::sync::Arc;

/// Serves queries from the current [`Pipeline`] snapshot.
///
/// A rebuilt pipeline is loaded off to the side and then swapped in. The lock is
/// only held to clone or replace the `Arc`, so in-flight queries finish on the
/// snapshot they started with.
#[derive(Debug)]
pub struct SearchService {
    current: RwLock<Arc<Pipeline>>,
}

impl SearchService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            current: RwLock::new(Arc::new(pipeline)),
        }
    }

    /// The pipeline new queries will use.
    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.current.read())
    }

    /// Installs `pipeline` and returns the one it replaced.
    pub fn swap(&self, pipeline: Pipeline) -> Arc<Pipeline> {
        let next = Arc::new(pipeline);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        tracing::info!(products = self.current.read().catalog().len(), "Pipeline swapped");
        previous
    }

    /// Loads a pipeline from `paths` and swaps it in. On error the current
    /// pipeline keeps serving.
    pub fn reload(
        &self,
        paths: &ArtifactPaths,
        config: PipelineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<Pipeline>, ConfigError> {
        let pipeline = load_pipeline(paths, config, embedder)?;
        Ok(self.swap(pipeline))
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let pipeline = self.pipeline();
        pipeline.search(request)
    }
}
