use std::cmp::Ordering;

use ndarray::ArrayView1;

/// Cosine similarity in [-1, 1]; 0.0 for empty, zero-norm or mismatched
/// vectors.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.is_empty() || query.len() != candidate.len() {
        return 0.0;
    }

    let a = ArrayView1::from(query);
    let b = ArrayView1::from(candidate);
    let denom = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    a.dot(&b) / denom
}

/// Cosine distance, `1 - cosine_similarity`, in [0, 2].
pub fn cosine_distance(query: &[f32], candidate: &[f32]) -> f32 {
    1.0 - cosine_similarity(query, candidate)
}

/// Euclidean distance; `f32::INFINITY` for mismatched lengths.
pub fn l2_distance(query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() {
        return f32::INFINITY;
    }
    let diff = &ArrayView1::from(query) - &ArrayView1::from(candidate);
    diff.dot(&diff).sqrt()
}

/// Indices of the `k` smallest distances, ascending.
pub fn nearest(distances: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = distances.iter().copied().enumerate().collect();
    ranked.sort_by(|left, right| left.1.partial_cmp(&right.1).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}
