//! Error types for the search pipeline.
//!
//! Configuration and usage errors are the only failures a query can surface.
//! Optional-stage problems are reported as [`DegradationEvent`](crate::degradation::DegradationEvent)
//! values instead of errors.

use thiserror::Error;

/// Top-level error type returned by pipeline construction and queries.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Invalid setup detected at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed request rejected before any retrieval work.
    #[error("invalid request: {0}")]
    Usage(#[from] UsageError),
}

/// Fatal setup problems, raised while building or loading components.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No products (or no documents) were provided.
    #[error("corpus is empty")]
    EmptyCorpus,

    /// A vector index was requested with no vectors.
    #[error("cannot build a vector index from zero vectors")]
    NoVectors,

    /// Embedding dimension is zero, too large, or inconsistent.
    #[error("invalid embedding dimension: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Catalog and index sizes disagree.
    #[error("{component} covers {got} documents but the catalog has {expected}")]
    CorpusMismatch {
        component: &'static str,
        expected: usize,
        got: usize,
    },

    /// Neither lexical nor vector retrieval is available.
    #[error("no retriever available: at least one of the lexical or vector index is required")]
    NoRetriever,

    /// The selected mode needs a retriever that is not loaded.
    #[error("mode '{mode}' requires the {missing} index")]
    MissingRetriever {
        mode: &'static str,
        missing: &'static str,
    },

    /// A weight or parameter is outside its valid range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A product record failed validation at the ingestion boundary.
    #[error("invalid product '{id}': {reason}")]
    InvalidProduct { id: String, reason: String },

    /// Two products share an id.
    #[error("duplicate product id: {0}")]
    DuplicateProduct(String),

    /// Unknown preset name.
    #[error("unknown preset '{0}' (expected full, business, relevance, lexical, or semantic)")]
    UnknownPreset(String),

    /// A required artifact could not be loaded.
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Catalog embeddings could not be computed at build time.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Request validation failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    /// Query is empty or only whitespace.
    #[error("query must not be empty")]
    EmptyQuery,

    /// Query is longer than [`MAX_QUERY_LEN`](crate::config::MAX_QUERY_LEN) bytes.
    #[error("query is {len} bytes, maximum is {max}")]
    QueryTooLong { len: usize, max: usize },

    /// `top_k` is zero or above [`MAX_K`](crate::config::MAX_K).
    #[error("top_k must be between 1 and {max}, got {got}")]
    InvalidTopK { got: usize, max: usize },

    /// A filter bound is not finite or the range is inverted.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Unknown retrieval mode name.
    #[error("unknown search mode '{0}' (expected lexical, semantic, hybrid, or auto)")]
    InvalidMode(String),

    /// Unknown sort order name.
    #[error("unknown sort order '{0}'")]
    InvalidSort(String),

    /// Page numbers start at 1.
    #[error("page must be at least 1")]
    InvalidPage,

    /// `page * top_k` is beyond [`MAX_RESULT_DEPTH`](crate::config::MAX_RESULT_DEPTH).
    #[error("page {page} of size {top_k} is beyond the maximum result depth {max}")]
    PageTooDeep { page: usize, top_k: usize, max: usize },

    /// A query embedding does not match the index dimension.
    #[error("query embedding has dimension {got}, index expects {expected}")]
    EmbeddingDimension { expected: usize, got: usize },
}

/// Offline training failures.
#[derive(Error, Debug)]
pub enum TrainingError {
    /// No logged result could be joined with a relevance label.
    #[error("no training data: {0}")]
    EmptyTrainingSet(String),

    /// All queries ended up in the validation split.
    #[error("no training queries left after holding out {held_out} for validation")]
    NoTrainingQueries { held_out: usize },

    /// A trainer hyperparameter is out of range.
    #[error("invalid trainer configuration: {0}")]
    InvalidConfig(String),
}

/// Artifact persistence failures.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not exist.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Footer magic does not match the expected artifact kind.
    #[error("{path}: expected a {expected} artifact")]
    WrongKind { path: String, expected: &'static str },

    /// Stored and computed checksums differ.
    #[error("{path}: CRC32 mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    Checksum {
        path: String,
        stored: u32,
        computed: u32,
    },

    /// bincode encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The decoded artifact violates its own invariants.
    #[error("{path}: validation failed: {reason}")]
    Invalid { path: String, reason: String },
}

/// Failure reported by an embedding provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// The provider could not be reached or returned an error.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// The provider returned a vector of the wrong length.
    #[error("embedding has dimension {got}, expected {expected}")]
    Dimension { expected: usize, got: usize },
}

/// Result alias for query-facing operations.
pub type Result<T> = std::result::Result<T, SearchError>;
