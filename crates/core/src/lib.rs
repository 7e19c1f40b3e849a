//! # shopsearch-core
//!
//! Product search engine core: BM25 and vector retrieval fused into one candidate
//! list, a deterministic business scorer, and a LambdaMART reranker trained from
//! logged searches and clicks.
//!
//! The library has no async dependencies. A [`Pipeline`](pipeline::Pipeline) is an
//! immutable snapshot over loaded artifacts; queries are pure reads, and a rebuilt
//! pipeline is swapped in through [`SearchService`](pipeline::SearchService).

/// BM25 lexical index: tokenizer, inverted index, and Okapi BM25 scoring.
pub mod bm25;
/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Success/degraded stage outcomes.
pub mod degradation;
/// Embedding provider trait and the built-in hashing embedder.
pub mod embedding;
/// Error types: configuration, usage, training, and artifact errors.
pub mod error;
/// Pipeline presets, orchestrator, artifact loading, and the search service.
pub mod pipeline;
/// Product records and the validated catalog.
pub mod product;
/// Learned reranking: features, LambdaMART training, and inference.
pub mod ranking;
/// Rule-based business scoring.
pub mod scoring;
/// Retrieval modes, hybrid fusion, filters, and the fusion retriever.
pub mod search;
/// Checksummed artifact persistence.
pub mod storage;
/// Vector index tiers: flat, IVF, and IVF with scalar quantization.
pub mod vector;

pub use error::{ConfigError, SearchError, UsageError};
pub use pipeline::{Pipeline, PipelineConfig, Preset, SearchRequest, SearchResponse, SearchService};
pub use product::{Catalog, Product, RawProduct};
