//! Spherical k-means for the IVF coarse quantizer.
//!
//! K-means++ seeding followed by Lloyd iterations. Points are unit vectors and
//! assignment maximizes the inner product; centroids are re-normalized after
//! every update. Seeded so rebuilding the same corpus reproduces the same partitions.

use crate::vector::distance::{dot, l2_normalize};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Train `k` centroids over `data` (row-major, `dim` columns).
/// Returns k × dim centroids as a flat Vec<f32>.
pub fn train(data: &[f32], dim: usize, k: usize, iterations: usize, seed: u64) -> Vec<f32> {
    let n = data.len() / dim;
    let mut rng = StdRng::seed_from_u64(seed);

    if n <= k {
        // Fewer points than centroids: each point is its own centroid
        let mut centroids = data[..n * dim].to_vec();
        while centroids.len() < k * dim {
            let idx = if n == 0 { 0 } else { rng.gen_range(0..n) };
            match data.get(idx * dim..(idx + 1) * dim) {
                Some(point) => centroids.extend_from_slice(point),
                None => centroids.resize(k * dim, 0.0),
            }
        }
        return centroids;
    }

    let mut centroids = seed_plus_plus(data, dim, k, &mut rng);
    let mut assignments = vec![0u32; n];

    for iter in 0..iterations {
        let mut changed = 0usize;
        for i in 0..n {
            let best = nearest(&data[i * dim..(i + 1) * dim], &centroids, dim) as u32;
            if assignments[i] != best || iter == 0 {
                changed += 1;
            }
            assignments[i] = best;
        }

        // Update centroids; an empty cluster keeps its previous centroid.
        let mut sums = vec![0.0f32; k * dim];
        let mut counts = vec![0u32; k];
        for i in 0..n {
            let ci = assignments[i] as usize;
            counts[ci] += 1;
            let point = &data[i * dim..(i + 1) * dim];
            for (s, &p) in sums[ci * dim..(ci + 1) * dim].iter_mut().zip(point) {
                *s += p;
            }
        }
        for ci in 0..k {
            if counts[ci] > 0 {
                let c = &mut sums[ci * dim..(ci + 1) * dim];
                l2_normalize(c);
                centroids[ci * dim..(ci + 1) * dim].copy_from_slice(c);
            }
        }

        if changed == 0 {
            tracing::debug!("k-means converged after {} iterations", iter + 1);
            break;
        }
    }

    centroids
}

/// Index of the centroid with the highest inner product.
pub fn nearest(point: &[f32], centroids: &[f32], dim: usize) -> usize {
    let mut best = 0;
    let mut best_sim = f32::NEG_INFINITY;
    for (ci, centroid) in centroids.chunks_exact(dim).enumerate() {
        let sim = dot(point, centroid);
        if sim > best_sim {
            best_sim = sim;
            best = ci;
        }
    }
    best
}

/// K-means++ initialization using squared Euclidean distance to the nearest chosen centroid.
fn seed_plus_plus(data: &[f32], dim: usize, k: usize, rng: &mut StdRng) -> Vec<f32> {
    let n = data.len() / dim;
    let mut centroids = vec![0.0f32; k * dim];

    // First centroid: random point
    let first = rng.gen_range(0..n);
    centroids[..dim].copy_from_slice(&data[first * dim..(first + 1) * dim]);

    // Distance from each point to its nearest centroid
    let mut min_dists = vec![f32::MAX; n];

    for ci in 1..k {
        let last_centroid = &centroids[(ci - 1) * dim..ci * dim];
        let mut total = 0.0f64;
        for (i, min_d) in min_dists.iter_mut().enumerate() {
            let d = sq_dist(&data[i * dim..(i + 1) * dim], last_centroid);
            if d < *min_d {
                *min_d = d;
            }
            total += *min_d as f64;
        }

        // Weighted random selection proportional to distance²
        let chosen = if total < 1e-30 {
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0f64;
            let mut chosen = n - 1;
            for (i, &d) in min_dists.iter().enumerate() {
                cumulative += d as f64;
                if cumulative >= threshold {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids[ci * dim..(ci + 1) * dim].copy_from_slice(&data[chosen * dim..(chosen + 1) * dim]);
    }

    centroids
}

#[inline]
fn sq_dist(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
