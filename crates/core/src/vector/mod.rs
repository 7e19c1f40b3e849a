//! Dense vector retrieval over L2-normalized embeddings.
//!
//! [`VectorIndex::build`] picks a tier from the corpus size: an exact flat index for
//! small catalogs, IVF with full-precision lists for medium ones, and IVF with u8
//! scalar-quantized lists for large ones. Similarity is the inner product of unit
//! vectors (cosine similarity). Every vector is normalized on insert and every
//! query before scoring.

/// Inner-product kernels and normalization.
pub mod distance;
/// Exact brute-force index.
pub mod flat;
/// Inverted-file index with flat or SQ8 posting lists.
pub mod ivf;
/// Spherical k-means coarse quantizer training.
pub mod kmeans;
/// u8 scalar quantization.
pub mod sq8;

pub use flat::FlatIndex;
pub use ivf::{IvfIndex, ListEncoding};

use crate::config;
use crate::error::{ArtifactError, ConfigError, UsageError};
use crate::storage::{load_artifact, save_artifact, Artifact, ArtifactKind};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;

/// Index tier chosen for a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTier {
    Flat,
    IvfFlat,
    IvfSq8,
}

impl IndexTier {
    /// Tier for a corpus of `n` vectors.
    pub fn for_size(n: usize) -> Self {
        if n < config::FLAT_MAX_VECTORS {
            IndexTier::Flat
        } else if n < config::IVF_FLAT_MAX_VECTORS {
            IndexTier::IvfFlat
        } else {
            IndexTier::IvfSq8
        }
    }
}

/// Build-time overrides. Unset fields follow the size-based defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorIndexOptions {
    /// Expected final corpus size, used for tier selection instead of the number of
    /// vectors passed to `build`.
    pub size_hint: Option<usize>,
    pub tier: Option<IndexTier>,
    pub n_lists: Option<usize>,
    pub nprobe: Option<usize>,
}

/// A built vector index. Document id `i` is the i-th embedding passed to `build`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VectorIndex {
    Flat(FlatIndex),
    Ivf(IvfIndex),
}

impl VectorIndex {
    /// Build with the size-based tier for `size_hint` (or the number of embeddings).
    pub fn build(embeddings: &[Vec<f32>], size_hint: Option<usize>) -> Result<Self, ConfigError> {
        Self::build_with(
            embeddings,
            VectorIndexOptions {
                size_hint,
                ..Default::default()
            },
        )
    }

    /// Build with explicit options.
    pub fn build_with(
        embeddings: &[Vec<f32>],
        options: VectorIndexOptions,
    ) -> Result<Self, ConfigError> {
        let dim = validate_embeddings(embeddings)?;
        let n = embeddings.len();
        let tier = options
            .tier
            .unwrap_or_else(|| IndexTier::for_size(options.size_hint.unwrap_or(n)));

        let normalized: Vec<f32> = embeddings
            .iter()
            .flat_map(|e| distance::normalized(e))
            .collect();

        let index = match tier {
            IndexTier::Flat => {
                let mut flat = FlatIndex::new(dim);
                for v in normalized.chunks_exact(dim) {
                    flat.add(v);
                }
                VectorIndex::Flat(flat)
            }
            IndexTier::IvfFlat | IndexTier::IvfSq8 => {
                let encoding = if tier == IndexTier::IvfFlat {
                    ListEncoding::Flat
                } else {
                    ListEncoding::Sq8
                };
                let n_lists = options.n_lists.unwrap_or_else(|| ivf::default_n_lists(n));
                let nprobe = options
                    .nprobe
                    .unwrap_or_else(|| ivf::default_nprobe(n_lists));
                let mut ivf = IvfIndex::train(&normalized, dim, n_lists, nprobe, encoding);
                for (id, v) in normalized.chunks_exact(dim).enumerate() {
                    ivf.add(id as u32, v);
                }
                VectorIndex::Ivf(ivf)
            }
        };

        tracing::info!(
            "Built vector index: tier={:?}, {} vectors, dim={}",
            index.tier(),
            index.len(),
            dim
        );
        Ok(index)
    }

    /// Top-k (doc_id, similarity) pairs, descending. The query is normalized first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>, UsageError> {
        if query.len() != self.dim() {
            return Err(UsageError::EmbeddingDimension {
                expected: self.dim(),
                got: query.len(),
            });
        }
        if k == 0 || query.iter().any(|x| !x.is_finite()) {
            return Ok(Vec::new());
        }
        let q = distance::normalized(query);
        Ok(match self {
            VectorIndex::Flat(idx) => idx.search(&q, k),
            VectorIndex::Ivf(idx) => idx.search(&q, k),
        })
    }

    pub fn tier(&self) -> IndexTier {
        match self {
            VectorIndex::Flat(_) => IndexTier::Flat,
            VectorIndex::Ivf(idx) => match idx.encoding {
                ListEncoding::Flat => IndexTier::IvfFlat,
                ListEncoding::Sq8 => IndexTier::IvfSq8,
            },
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            VectorIndex::Flat(idx) => idx.dim,
            VectorIndex::Ivf(idx) => idx.dim,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VectorIndex::Flat(idx) => idx.len(),
            VectorIndex::Ivf(idx) => idx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist as a `VEC1` artifact.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        save_artifact(self, path)
    }

    /// Load a saved index. No retraining happens.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        load_artifact(path)
    }
}

impl Artifact for VectorIndex {
    const KIND: ArtifactKind = ArtifactKind::VectorIndex;

    fn validate(&self) -> Result<(), String> {
        let dim = self.dim();
        if dim == 0 || dim > config::MAX_DIMENSION {
            return Err(format!("invalid dimension {dim}"));
        }
        if self.is_empty() {
            return Err("index holds no vectors".to_string());
        }
        match self {
            VectorIndex::Flat(idx) if idx.vectors.len() % dim != 0 => {
                Err("flat matrix is not a whole number of rows".to_string())
            }
            VectorIndex::Flat(_) => Ok(()),
            VectorIndex::Ivf(idx) => idx.validate(),
        }
    }
}

/// Checks every embedding is finite and of one dimension; returns that dimension.
fn validate_embeddings(embeddings: &[Vec<f32>]) -> Result<usize, ConfigError> {
    let first = embeddings.first().ok_or(ConfigError::NoVectors)?;
    let dim = first.len();
    if dim == 0 || dim > config::MAX_DIMENSION {
        return Err(ConfigError::InvalidParameter {
            name: "dimension",
            reason: format!("must be between 1 and {}, got {}", config::MAX_DIMENSION, dim),
        });
    }
    for (i, e) in embeddings.iter().enumerate() {
        if e.len() != dim {
            return Err(ConfigError::DimensionMismatch {
                expected: dim,
                got: e.len(),
            });
        }
        if e.iter().any(|x| !x.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "embedding",
                reason: format!("vector {i} contains a non-finite value"),
            });
        }
    }
    Ok(dim)
}

/// Partial sort: O(n log k) via a min-heap of size k. Output is sorted by
/// descending score, ties by ascending id.
pub(crate) fn select_top_k(scored: impl Iterator<Item = (u32, f32)>, k: usize) -> Vec<(u32, f32)> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<u32>)>> =
        BinaryHeap::with_capacity(k + 1);
    for (id, score) in scored {
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
