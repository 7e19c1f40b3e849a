//! Inverted-file (IVF) index.
//!
//! A coarse quantizer (spherical k-means centroids) partitions the corpus into
//! `n_lists` posting lists. A query scores the centroids, probes the `nprobe` best
//! lists, and scores only their members. Posting lists store either full f32
//! vectors or u8 scalar-quantized codes.
//!
//! The quantizer must be trained before vectors are added: [`IvfIndex::train`]
//! returns an index with empty lists, and [`IvfIndex::add`] assigns each vector to
//! its nearest partition.

use crate::config;
use crate::vector::distance::dot;
use crate::vector::kmeans;
use crate::vector::select_top_k;
use crate::vector::sq8::{dot_product_asym, QuantizedVector};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Posting list vector encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListEncoding {
    /// Full-precision f32 vectors.
    Flat,
    /// u8 scalar quantization, 4x smaller.
    Sq8,
}

/// Stored vectors of one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ListVectors {
    Flat(Vec<f32>),
    Sq8(Vec<QuantizedVector>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InvertedList {
    ids: Vec<u32>,
    vectors: ListVectors,
}

impl InvertedList {
    fn new(encoding: ListEncoding) -> Self {
        let vectors = match encoding {
            ListEncoding::Flat => ListVectors::Flat(Vec::new()),
            ListEncoding::Sq8 => ListVectors::Sq8(Vec::new()),
        };
        Self {
            ids: Vec::new(),
            vectors,
        }
    }

    fn push(&mut self, id: u32, vector: &[f32]) {
        self.ids.push(id);
        match &mut self.vectors {
            ListVectors::Flat(v) => v.extend_from_slice(vector),
            ListVectors::Sq8(v) => v.push(QuantizedVector::quantize(vector)),
        }
    }

    fn scores<'a>(&'a self, query: &'a [f32], dim: usize) -> Box<dyn Iterator<Item = (u32, f32)> + 'a> {
        match &self.vectors {
            ListVectors::Flat(v) => Box::new(
                self.ids
                    .iter()
                    .zip(v.chunks_exact(dim))
                    .map(move |(&id, vec)| (id, dot(query, vec))),
            ),
            ListVectors::Sq8(v) => Box::new(
                self.ids
                    .iter()
                    .zip(v.iter())
                    .map(move |(&id, code)| (id, dot_product_asym(query, code))),
            ),
        }
    }
}

/// IVF index over unit vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfIndex {
    pub(crate) dim: usize,
    pub(crate) nprobe: usize,
    pub(crate) encoding: ListEncoding,
    centroids: Vec<f32>,
    lists: Vec<InvertedList>,
    count: usize,
}

/// Default partition count for a corpus of `n` vectors: `min(sqrt(n), 256)`, at least 1.
pub fn default_n_lists(n: usize) -> usize {
    ((n as f64).sqrt() as usize).clamp(1, config::IVF_MAX_LISTS)
}

/// Default probe count: `clamp(n_lists / 8, 1, 32)`.
pub fn default_nprobe(n_lists: usize) -> usize {
    (n_lists / 8).clamp(1, config::IVF_MAX_NPROBE)
}

impl IvfIndex {
    /// Train the coarse quantizer on `sample` (row-major, `dim` columns).
    ///
    /// At most `KMEANS_MAX_POINTS_PER_CENTROID * n_lists` sample rows are used.
    pub fn train(
        sample: &[f32],
        dim: usize,
        n_lists: usize,
        nprobe: usize,
        encoding: ListEncoding,
    ) -> Self {
        let n = sample.len() / dim;
        let n_lists = n_lists.clamp(1, n.max(1));
        let budget = config::KMEANS_MAX_POINTS_PER_CENTROID * n_lists;

        let subsampled;
        let training = if n > budget {
            let mut rng = StdRng::seed_from_u64(config::KMEANS_SEED);
            let mut picked = rand::seq::index::sample(&mut rng, n, budget).into_vec();
            picked.sort_unstable();
            subsampled = picked
                .iter()
                .flat_map(|&i| sample[i * dim..(i + 1) * dim].iter().copied())
                .collect::<Vec<f32>>();
            &subsampled[..]
        } else {
            sample
        };

        let centroids = kmeans::train(
            training,
            dim,
            n_lists,
            config::KMEANS_ITERATIONS,
            config::KMEANS_SEED,
        );
        tracing::info!(
            "Trained IVF quantizer: {} lists on {} vectors (dim={}, nprobe={})",
            n_lists,
            training.len() / dim,
            dim,
            nprobe
        );

        Self {
            dim,
            nprobe: nprobe.clamp(1, n_lists),
            encoding,
            centroids,
            lists: (0..n_lists).map(|_| InvertedList::new(encoding)).collect(),
            count: 0,
        }
    }

    /// Assigns a normalized vector to its nearest partition.
    pub fn add(&mut self, id: u32, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dim);
        let list = kmeans::nearest(vector, &self.centroids, self.dim);
        self.lists[list].push(id, vector);
        self.count += 1;
    }

    pub fn n_lists(&self) -> usize {
        self.lists.len()
    }

    pub fn nprobe(&self) -> usize {
        self.nprobe
    }

    /// Overrides the probe count, clamped to `[1, n_lists]`.
    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.nprobe = nprobe.clamp(1, self.lists.len().max(1));
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Approximate top-k by inner product. `query` must already be normalized.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let mut probes: Vec<(usize, f32)> = self
            .centroids
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, c)| (i, dot(query, c)))
            .collect();
        probes.sort_unstable_by_key(|&(i, s)| (std::cmp::Reverse(OrderedFloat(s)), i));
        probes.truncate(self.nprobe);

        let candidates = probes
            .into_iter()
            .flat_map(|(list, _)| self.lists[list].scores(query, self.dim));
        select_top_k(candidates, k)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.centroids.len() != self.lists.len() * self.dim {
            return Err(format!(
                "{} centroid values for {} lists of dimension {}",
                self.centroids.len(),
                self.lists.len(),
                self.dim
            ));
        }
        let mut total = 0;
        for list in &self.lists {
            let stored = match &list.vectors {
                ListVectors::Flat(v) => v.len() / self.dim,
                ListVectors::Sq8(v) => {
                    if v.iter().any(|q| q.dim() != self.dim) {
                        return Err("quantized vector with wrong dimension".to_string());
                    }
                    v.len()
                }
            };
            if stored != list.ids.len() {
                return Err(format!("posting list has {} ids but {} vectors", list.ids.len(), stored));
            }
            total += stored;
        }
        if total != self.count {
            return Err(format!("lists hold {total} vectors, header says {}", self.count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::distance::l2_normalize;
    use rand::Rng;

    fn random_unit_vectors(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = Vec::with_capacity(n * dim);
        for _ in 0..n {
            let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            l2_normalize(&mut v);
            data.extend(v);
        }
        data
    }

    fn build(encoding: ListEncoding, nprobe: usize) -> (IvfIndex, Vec<f32>) {
        let dim = 16;
        let data = random_unit_vectors(400, dim, 3);
        let mut idx = IvfIndex::train(&data, dim, 20, nprobe, encoding);
        for (i, v) in data.chunks_exact(dim).enumerate() {
            idx.add(i as u32, v);
        }
        (idx, data)
    }

    #[test]
    fn test_sizing_defaults() {
        assert_eq!(default_n_lists(10_000), 100);
        assert_eq!(default_n_lists(1_000_000), 256);
        assert_eq!(default_n_lists(0), 1);
        assert_eq!(default_nprobe(100), 12);
        assert_eq!(default_nprobe(4), 1);
        assert_eq!(default_nprobe(256), 32);
    }

    #[test]
    fn test_self_query_found() {
        let (idx, data) = build(ListEncoding::Flat, 3);
        assert_eq!(idx.len(), 400);
        for probe in [0usize, 17, 250] {
            let q = &data[probe * 16..(probe + 1) * 16];
            let results = idx.search(q, 5);
            assert_eq!(results[0].0, probe as u32, "a stored vector is its own nearest neighbor");
        }
    }

    #[test]
    fn test_full_probe_equals_exact() {
        let (mut idx, data) = build(ListEncoding::Flat, 1);
        idx.set_nprobe(idx.n_lists());
        let q = &data[5 * 16..6 * 16];
        let mut exact: Vec<(u32, f32)> = data
            .chunks_exact(16)
            .enumerate()
            .map(|(i, v)| (i as u32, dot(q, v)))
            .collect();
        exact.sort_by(|a, b| b.1.total_cmp(&a.1));
        let got: Vec<u32> = idx.search(q, 10).iter().map(|r| r.0).collect();
        let want: Vec<u32> = exact[..10].iter().map(|r| r.0).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn test_sq8_recall() {
        let (idx, data) = build(ListEncoding::Sq8, 20);
        let q = &data[42 * 16..43 * 16];
        let results = idx.search(q, 3);
        assert_eq!(results[0].0, 42);
        assert!((results[0].1 - 1.0).abs() < 0.05);
        assert!(idx.validate().is_ok());
    }
}
