//! The search pipeline: retrieval, filters, business scoring, reranking, sort, and pagination.
//!
//! Only configuration and usage errors surface from [`Pipeline::search`]. Every
//! optional stage returns a [`StageOutcome`](crate::degradation::StageOutcome);
//! degradations are collected into the response and the previous stage's output
//! carries on.

use crate::bm25::LexicalIndex;
use crate::config;
use crate::degradation::DegradationEvent;
use crate::error::{ConfigError, SearchError, UsageError};
use crate::pipeline::config::PipelineConfig;
use crate::product::{Catalog, Product};
use crate::ranking::MlReranker;
use crate::scoring::BusinessScorer;
use crate::search::types::{assign_positions, Candidate};
use crate::search::{FusionRetriever, SearchFilters, SearchMode, SemanticSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Result ordering applied after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Order of the last executed scoring stage.
    #[default]
    Relevance,
    PriceLow,
    PriceHigh,
    Rating,
    /// Review count, descending.
    Popularity,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::PriceLow => "price_low",
            SortOrder::PriceHigh => "price_high",
            SortOrder::Rating => "rating",
            SortOrder::Popularity => "popularity",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(SortOrder::Relevance),
            "price_low" | "price_asc" => Ok(SortOrder::PriceLow),
            "price_high" | "price_desc" => Ok(SortOrder::PriceHigh),
            "rating" => Ok(SortOrder::Rating),
            "popularity" => Ok(SortOrder::Popularity),
            other => Err(UsageError::InvalidSort(other.to_string())),
        }
    }
}

fn default_top_k() -> usize {
    config::DEFAULT_TOP_K
}

fn first_page() -> usize {
    1
}

/// One search call. `top_k` is the page size; pages start at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "first_page")]
    pub page: usize,
    /// Falls back to the pipeline's default mode.
    #[serde(default)]
    pub mode: Option<SearchMode>,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub sort: SortOrder,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: config::DEFAULT_TOP_K,
            page: 1,
            mode: None,
            filters: SearchFilters::default(),
            sort: SortOrder::Relevance,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Rejects malformed requests before any retrieval work.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.query.trim().is_empty() {
            return Err(UsageError::EmptyQuery);
        }
        if self.query.len() > config::MAX_QUERY_LEN {
            return Err(UsageError::QueryTooLong {
                len: self.query.len(),
                max: config::MAX_QUERY_LEN,
            });
        }
        if self.top_k == 0 || self.top_k > config::MAX_K {
            return Err(UsageError::InvalidTopK {
                got: self.top_k,
                max: config::MAX_K,
            });
        }
        if self.page == 0 {
            return Err(UsageError::InvalidPage);
        }
        if self.depth() > config::MAX_RESULT_DEPTH {
            return Err(UsageError::PageTooDeep {
                page: self.page,
                top_k: self.top_k,
                max: config::MAX_RESULT_DEPTH,
            });
        }
        self.filters.validate()
    }

    /// Rank of the last result on the requested page.
    fn depth(&self) -> usize {
        self.page.saturating_mul(self.top_k)
    }
}

/// A ranked result: the candidate scores plus the product fields a caller displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub brand: String,
    pub category: String,
    pub price: f64,
    pub rating: f64,
    #[serde(flatten)]
    pub candidate: Candidate,
}

impl SearchHit {
    fn new(candidate: Candidate, product: &Product) -> Self {
        Self {
            title: product.title.clone(),
            brand: product.brand.clone(),
            category: product.category.clone(),
            price: product.price,
            rating: product.rating,
            candidate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub search_id: Uuid,
    pub query: String,
    /// Mode that actually produced the candidates.
    pub mode: SearchMode,
    /// Matching candidates before pagination, at most
    /// [`MAX_RESULT_DEPTH`](config::MAX_RESULT_DEPTH).
    pub total: usize,
    pub page: usize,
    pub top_k: usize,
    pub hits: Vec<SearchHit>,
    pub degradations: Vec<DegradationEvent>,
    pub elapsed_ms: f64,
}

impl SearchResponse {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// A fully wired, immutable search pipeline over one catalog snapshot.
pub struct Pipeline {
    config: PipelineConfig,
    catalog: Arc<Catalog>,
    retriever: FusionRetriever,
    scorer: BusinessScorer,
    reranker: MlReranker,
}

impl Pipeline {
    /// Wires the stages. Indices disabled by the config are dropped; the default
    /// mode must be served by a loaded retriever.
    pub fn new(
        config: PipelineConfig,
        catalog: Arc<Catalog>,
        lexical: Option<Arc<LexicalIndex>>,
        semantic: Option<SemanticSource>,
        reranker: MlReranker,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let lexical = lexical.filter(|_| config.enable_lexical);
        let semantic = semantic.filter(|_| config.enable_semantic);

        match config.default_mode {
            SearchMode::Lexical if lexical.is_none() => {
                return Err(ConfigError::MissingRetriever {
                    mode: "lexical",
                    missing: "lexical",
                });
            }
            SearchMode::Semantic if semantic.is_none() => {
                return Err(ConfigError::MissingRetriever {
                    mode: "semantic",
                    missing: "vector",
                });
            }
            _ => {}
        }

        let retriever = FusionRetriever::new(Arc::clone(&catalog), lexical, semantic, config.fusion)?;
        let scorer = BusinessScorer::new(Arc::clone(&catalog), config.business_weights)?;
        if config.enable_reranking && !reranker.is_trained() {
            tracing::warn!("Reranking enabled but no model is loaded; queries will report degradation");
        }
        tracing::info!(
            products = catalog.len(),
            lexical = retriever.has_lexical(),
            semantic = retriever.has_semantic(),
            business = config.enable_business_scoring,
            rerank = config.enable_reranking,
            default_mode = %config.default_mode,
            "Pipeline ready"
        );

        Ok(Self {
            config,
            catalog,
            retriever,
            scorer,
            reranker,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn retriever(&self) -> &FusionRetriever {
        &self.retriever
    }

    pub fn scorer(&self) -> &BusinessScorer {
        &self.scorer
    }

    pub fn reranker(&self) -> &MlReranker {
        &self.reranker
    }

    /// Runs one query through every enabled stage.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        request.validate()?;
        let start = Instant::now();
        let mut degradations = Vec::new();

        let requested = request.mode.unwrap_or(self.config.default_mode);
        let (mode, mut candidates) = self.retrieve(request, requested, &mut degradations);
        let total = candidates.len();

        if self.config.enable_business_scoring {
            candidates = self.scorer.score_candidates(candidates).collect_into(&mut degradations);
        }
        if self.config.enable_reranking {
            candidates = self
                .reranker
                .rerank(candidates, &self.catalog)
                .collect_into(&mut degradations);
        }
        self.apply_sort(&mut candidates, request.sort);

        let offset = (request.page - 1) * request.top_k;
        let hits: Vec<SearchHit> = candidates
            .into_iter()
            .skip(offset)
            .take(request.top_k)
            .filter_map(|c| {
                let product = self.catalog.get(c.doc_id)?;
                Some(SearchHit::new(c, product))
            })
            .collect();

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            mode = %mode,
            total,
            returned = hits.len(),
            degraded = degradations.len(),
            "Search for '{}' took {:.2}ms",
            request.query,
            elapsed_ms
        );

        Ok(SearchResponse {
            search_id: Uuid::new_v4(),
            query: request.query.clone(),
            mode,
            total,
            page: request.page,
            top_k: request.top_k,
            hits,
            degradations,
            elapsed_ms,
        })
    }

    /// Retrieves the scoring window: up to `MAX_RESULT_DEPTH` matches, however
    /// deep the requested page is, so every page slices the same ranking.
    ///
    /// With filters, retrieval is repeated at `FILTER_EXPANSION_FACTOR` times the
    /// fetch size until the window fills or the retriever runs out.
    fn retrieve(
        &self,
        request: &SearchRequest,
        mode: SearchMode,
        degradations: &mut Vec<DegradationEvent>,
    ) -> (SearchMode, Vec<Candidate>) {
        let limit = self.catalog.len();
        let window = config::MAX_RESULT_DEPTH.min(limit);
        let mut fetch = window;
        loop {
            let mut round_events = Vec::new();
            let retrieval = self
                .retriever
                .search(&request.query, fetch, mode)
                .collect_into(&mut round_events);
            let exhausted = retrieval.candidates.len() < fetch || fetch >= limit;

            let mut candidates = retrieval.candidates;
            if !request.filters.is_empty() {
                candidates.retain(|c| {
                    self.catalog
                        .get(c.doc_id)
                        .is_some_and(|p| request.filters.matches(p))
                });
                assign_positions(&mut candidates);
            }

            if request.filters.is_empty() || candidates.len() >= window || exhausted {
                degradations.extend(round_events);
                candidates.truncate(window);
                return (retrieval.mode, candidates);
            }
            fetch = fetch.saturating_mul(config::FILTER_EXPANSION_FACTOR).min(limit);
        }
    }

    fn apply_sort(&self, candidates: &mut [Candidate], sort: SortOrder) {
        if sort == SortOrder::Relevance {
            return;
        }
        let catalog = &self.catalog;
        let key = |c: &Candidate| catalog.get(c.doc_id);
        candidates.sort_by(|a, b| {
            let (Some(pa), Some(pb)) = (key(a), key(b)) else {
                return std::cmp::Ordering::Equal;
            };
            match sort {
                SortOrder::PriceLow => pa.price.total_cmp(&pb.price),
                SortOrder::PriceHigh => pb.price.total_cmp(&pa.price),
                SortOrder::Rating => pb.rating.total_cmp(&pa.rating),
                SortOrder::Popularity => pb.review_count.cmp(&pa.review_count),
                SortOrder::Relevance => std::cmp::Ordering::Equal,
            }
        });
        assign_positions(candidates);
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("products", &self.catalog.len())
            .field("lexical", &self.retriever.has_lexical())
            .field("semantic", &self.retriever.has_semantic())
            .field("reranker_trained", &self.reranker.is_trained())
            .finish()
    }
}
