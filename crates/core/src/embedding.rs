//! Embedding provider seam.
//!
//! The pipeline treats embeddings as a black box: text in, fixed-dimension vector
//! out, no side effects. [`HashingEmbedder`] is a dependency-free provider used for
//! offline builds and tests when no neural model is configured.

use crate::bm25::tokenize;
use crate::error::EmbeddingError;

/// Text embedding interface.
///
/// Implementations must be `Send + Sync` so one provider can be shared by every
/// query thread.
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch of texts. The default calls [`embed`](Self::embed) per item.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Deterministic feature-hashing embedder.
///
/// Hashes word tokens and their character trigrams into fixed-dimension buckets
/// with FNV-1a, weights by term frequency, and L2-normalizes. Not as semantically
/// rich as a neural model, but it is always available and shares vocabulary
/// between inflections such as `jean` and `jeans`.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

/// Weight of a character trigram relative to a whole word.
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// FNV-1a bucket and sign for a feature.
    fn bucket(feature: &str, dims: usize) -> (usize, f32) {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in feature.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        ((h % dims as u64) as usize, sign)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimensions];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec;
        }

        for token in tokens.iter() {
            let (b, s) = Self::bucket(token, self.dimensions);
            vec[b] += s;

            let padded: Vec<char> = format!("#{token}#").chars().collect();
            for tri in padded.windows(3) {
                let tri: String = tri.iter().collect();
                let (b, s) = Self::bucket(&tri, self.dimensions);
                vec[b] += s * TRIGRAM_WEIGHT;
            }
        }

        crate::vector::distance::l2_normalize(&mut vec);
        vec
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(crate::config::HASHING_EMBEDDER_DIM)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector(text))
    }
}
