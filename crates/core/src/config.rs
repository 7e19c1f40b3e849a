//! Global configuration constants for shopsearch.
//!
//! All tuning parameters, input validation limits, and pipeline defaults are defined here.
//! These are compile-time constants; runtime configuration is handled by
//! [`PipelineConfig`](crate::pipeline::PipelineConfig) and the CLI flags in `main.rs`.

/// BM25 Okapi term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates. Higher values allow TF to grow more.
pub const BM25_K1: f32 = 1.5;

/// BM25 Okapi document length normalization parameter.
///
/// 0.0 = no normalization, 1.0 = full normalization.
pub const BM25_B: f32 = 0.75;

/// Default weight of the semantic score in hybrid fusion. Lexical gets `1 - weight`.
pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.65;

/// Bonus multiplier applied to `min(semantic, lexical)` in hybrid fusion.
///
/// Rewards candidates that both retrievers agree on.
pub const DUAL_PRESENCE_BONUS: f32 = 0.1;

/// Hybrid mode asks each retriever for `k * HYBRID_EXPANSION_FACTOR` candidates.
pub const HYBRID_EXPANSION_FACTOR: usize = 3;

/// Upper bound on the expanded per-retriever candidate count in hybrid mode.
pub const HYBRID_EXPANSION_CAP: usize = 100;

/// Range used in place of `max - min` when a score list is constant.
pub const NORMALIZATION_EPSILON: f32 = 0.001;

/// Corpora below this size get an exact flat vector index.
pub const FLAT_MAX_VECTORS: usize = 5_000;

/// Corpora below this size (and at least [`FLAT_MAX_VECTORS`]) get an IVF index
/// with full-precision posting lists. Larger corpora store u8 scalar-quantized lists.
pub const IVF_FLAT_MAX_VECTORS: usize = 50_000;

/// Maximum number of IVF partitions (coarse centroids).
pub const IVF_MAX_LISTS: usize = 256;

/// Upper bound on the number of IVF partitions probed per query.
pub const IVF_MAX_NPROBE: usize = 32;

/// Number of Lloyd iterations when training the IVF coarse quantizer.
pub const KMEANS_ITERATIONS: usize = 20;

/// The coarse quantizer is trained on at most this many sampled vectors per partition.
pub const KMEANS_MAX_POINTS_PER_CENTROID: usize = 64;

/// Seed for k-means++ initialization so that rebuilds are reproducible.
pub const KMEANS_SEED: u64 = 0x5eed_cafe;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`top_k`) per search request.
pub const MAX_K: usize = 1_000;

/// Default page size when a request does not set `top_k`.
pub const DEFAULT_TOP_K: usize = 10;

/// Number of matches retrieved, scored, and ranked per query. Pagination slices
/// this window, so `page * top_k` may not exceed it.
pub const MAX_RESULT_DEPTH: usize = 1_000;

/// With filters set, retrieval depth grows by this factor until the window fills.
pub const FILTER_EXPANSION_FACTOR: usize = 4;

/// Maximum query length in bytes.
pub const MAX_QUERY_LEN: usize = 512;

/// Auto mode picks semantic retrieval for queries longer than this many tokens
/// that contain an interrogative or superlative term.
pub const AUTO_SEMANTIC_MIN_TOKENS: usize = 3;

/// Auto mode picks lexical retrieval for queries with a digit and fewer than this many tokens.
pub const AUTO_LEXICAL_MAX_TOKENS: usize = 6;

/// Terms that mark a natural-language question or a recommendation request.
pub const AUTO_SEMANTIC_TERMS: &[&str] = &[
    "how",
    "what",
    "which",
    "where",
    "when",
    "why",
    "who",
    "best",
    "recommend",
];

/// Weight of the retrieval score when combining it with the business score.
pub const BASE_SCORE_WEIGHT: f32 = 0.6;

/// Weight of the business score when combining it with the retrieval score.
pub const BUSINESS_SCORE_WEIGHT: f32 = 0.4;

/// Maximum multiplier any single boost factor may apply. Penalties are uncapped.
pub const MAX_BOOST: f32 = 2.0;

/// Constant freshness sub-score. The catalog carries no recency signal.
pub const FRESHNESS_SCORE: f32 = 0.8;

/// Number of LambdaMART boosting rounds.
pub const RANKER_NUM_ROUNDS: usize = 100;

/// LambdaMART shrinkage.
pub const RANKER_LEARNING_RATE: f32 = 0.1;

/// Maximum depth of each regression tree.
pub const RANKER_MAX_DEPTH: usize = 4;

/// Minimum number of rows in a tree leaf.
pub const RANKER_MIN_SAMPLES_LEAF: usize = 2;

/// Rounds without validation NDCG improvement before training stops.
pub const RANKER_EARLY_STOPPING_ROUNDS: usize = 10;

/// Cutoff used for the NDCG objective and evaluation.
pub const RANKER_NDCG_AT: usize = 10;

/// Fraction of queries held out for validation.
pub const RANKER_VALIDATION_FRACTION: f32 = 0.2;

/// Seed for the query-level train/validation shuffle.
pub const RANKER_SPLIT_SEED: u64 = 42;

/// Highest relevance label on the graded scale.
pub const MAX_RELEVANCE_LABEL: f32 = 4.0;

/// Default directory for index and model artifacts.
pub const DEFAULT_ARTIFACT_DIR: &str = "./artifacts";

/// Dimension of the built-in hashing embedder.
pub const HASHING_EMBEDDER_DIM: usize = 256;
