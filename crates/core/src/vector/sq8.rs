//! Scalar quantization for IVF posting lists.
//!
//! Each f32 vector is compressed to u8 by finding the min and max values,
//! then linearly mapping each component to \[0, 255\]. The `min` and `scale`
//! parameters are stored per vector for dequantization. Queries stay in f32 and
//! are scored asymmetrically against the u8 codes.

use serde::{Deserialize, Serialize};

/// Scalar-quantized vector: f32 → u8 with min/scale for reconstruction.
/// `scale` is precomputed as (max - min) / 255.0 to avoid redundant division in hot paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantizedVector {
    pub data: Vec<u8>,
    pub min: f32,
    pub scale: f32,
}

impl QuantizedVector {
    /// Quantize a f32 vector to u8 using min-max scaling.
    pub fn quantize(vector: &[f32]) -> Self {
        if vector.is_empty() {
            return Self {
                data: Vec::new(),
                min: 0.0,
                scale: 0.0,
            };
        }

        let (min, max) = vector
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        let range = max - min;
        let (data, scale) = if range < f32::EPSILON {
            (vec![0u8; vector.len()], 0.0)
        } else {
            let inv_scale = 255.0 / range;
            let data = vector
                .iter()
                .map(|&v| ((v - min) * inv_scale).round().clamp(0.0, 255.0) as u8)
                .collect();
            (data, range / 255.0)
        };

        Self { data, min, scale }
    }

    /// Dequantize back to f32. Lossy.
    pub fn dequantize(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|&v| self.min + (v as f32) * self.scale)
            .collect()
    }

    pub fn dim(&self) -> usize {
        self.data.len()
    }
}

const CHUNK_F32: usize = 8;

/// Asymmetric dot product: f32 query vs u8 stored.
/// Uses SIMD-friendly f32 chunked inner loop with f64 accumulation at chunk boundaries.
#[allow(clippy::needless_range_loop)]
pub fn dot_product_asym(query: &[f32], stored: &QuantizedVector) -> f32 {
    debug_assert_eq!(query.len(), stored.data.len());

    let len = query.len().min(stored.data.len());
    let s_min = stored.min;
    let s_scale = stored.scale;

    let mut sum = 0.0f64;

    let full_chunks = len / CHUNK_F32;
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        let mut chunk_acc = 0.0f32;
        for j in 0..CHUNK_F32 {
            let s = s_min + stored.data[base + j] as f32 * s_scale;
            chunk_acc += query[base + j] * s;
        }
        sum += chunk_acc as f64;
    }

    for i in (full_chunks * CHUNK_F32)..len {
        let s = s_min as f64 + stored.data[i] as f64 * s_scale as f64;
        sum += query[i] as f64 * s;
    }

    sum as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::distance::dot;

    #[test]
    fn test_quantize_dequantize() {
        let v = vec![0.0, 0.5, 1.0, -1.0, 0.25];
        let q = QuantizedVector::quantize(&v);
        assert!(q.scale > 0.0, "scale should be positive for non-constant vectors");
        let d = q.dequantize();
        for (orig, deq) in v.iter().zip(d.iter()) {
            assert!((orig - deq).abs() < 0.01, "orig={orig}, deq={deq}");
        }
    }

    #[test]
    fn test_constant_vector() {
        let q = QuantizedVector::quantize(&[0.3; 10]);
        assert_eq!(q.scale, 0.0);
        assert!(q.dequantize().iter().all(|&x| (x - 0.3).abs() < 1e-6));
    }

    #[test]
    fn test_asym_dot_close_to_exact() {
        let a: Vec<f32> = (0..64).map(|i| ((i * 7 % 13) as f32 - 6.0) / 10.0).collect();
        let b: Vec<f32> = (0..64).map(|i| ((i * 5 % 11) as f32 - 5.0) / 10.0).collect();
        let q = QuantizedVector::quantize(&b);
        let exact = dot(&a, &b);
        let approx = dot_product_asym(&a, &q);
        assert!((exact - approx).abs() < 0.05, "exact={exact}, approx={approx}");
    }
}
