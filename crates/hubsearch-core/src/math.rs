//! Vector math shared by the embedding engine and vector backends.

use crate::{Error, Result};

/// Tolerance used when deciding whether a vector is already unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-5;

/// Dot product of two equal-length vectors.
///
/// Fails with [`Error::DimensionMismatch`] when lengths differ.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::dimension_mismatch(a.len(), b.len()));
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Euclidean (L2) norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Rescale `v` in place to unit L2 norm.
///
/// Returns `false` and leaves the vector untouched when its norm is zero
/// (or not finite), so callers can flag it.
pub fn normalize_in_place(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Return a unit-length copy of `v`; the zero vector comes back unchanged.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

/// Cosine similarity `dot(a,b) / (|a|·|b|)`.
///
/// Returns `0.0` when either magnitude is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot(a, b)?;
    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / denom)
}

/// Euclidean distance between two equal-length vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::dimension_mismatch(a.len(), b.len()));
    }
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt())
}

/// Whether every component is a finite number.
pub fn all_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

// ============================================================================
// Tests
// ============================================================================
