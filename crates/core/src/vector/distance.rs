//! Inner-product kernels for normalized f32 vectors.
//!
//! Uses SIMD-friendly f32 chunked inner loops with f64 accumulation at chunk
//! boundaries so the compiler can auto-vectorize without `unsafe` intrinsics.

/// 8 × f32 = 256 bit = one AVX register.
const CHUNK_F32: usize = 8;

/// Dot product between two f32 slices of equal length.
#[allow(clippy::needless_range_loop)]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let len = a.len().min(b.len());
    let mut sum = 0.0f64;

    let full_chunks = len / CHUNK_F32;
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        let mut chunk_acc = 0.0f32;
        for j in 0..CHUNK_F32 {
            chunk_acc += a[base + j] * b[base + j];
        }
        sum += chunk_acc as f64;
    }

    for i in (full_chunks * CHUNK_F32)..len {
        sum += a[i] as f64 * b[i] as f64;
    }

    sum as f32
}

/// Euclidean norm.
pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Scales `v` to unit length in place. Zero vectors are left untouched and
/// `false` is returned.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let n = norm(v);
    if n < 1e-12 {
        return false;
    }
    let inv = 1.0 / n;
    for x in v.iter_mut() {
        *x *= inv;
    }
    true
}

/// Returns a normalized copy of `v`.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    l2_normalize(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_matches_naive() {
        let a: Vec<f32> = (0..37).map(|i| i as f32 * 0.1).collect();
        let b: Vec<f32> = (0..37).map(|i| 1.0 - i as f32 * 0.05).collect();
        let naive: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((dot(&a, &b) - naive).abs() < 1e-3);
    }

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0; 4];
        assert!(!l2_normalize(&mut v));
        assert_eq!(v, vec![0.0; 4]);
    }
}
