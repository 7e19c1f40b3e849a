//! Exact brute-force index: every stored vector is scored for every query.

use crate::vector::distance::dot;
use crate::vector::select_top_k;
use serde::{Deserialize, Serialize};

/// Row-major matrix of unit vectors. Row `i` belongs to document `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    pub(crate) dim: usize,
    pub(crate) vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    /// Appends a normalized vector; its document id is the current length.
    pub fn add(&mut self, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dim);
        self.vectors.extend_from_slice(vector);
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.vectors.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Exact top-k by inner product. `query` must already be normalized.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let scored = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(id, v)| (id as u32, dot(query, v)));
        select_top_k(scored, k)
    }
}
