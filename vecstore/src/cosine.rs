/// Compute the cosine similarity between two vectors.
///
/// Uses f64 intermediate precision. Returns 0.0 for zero vectors or
/// dimension mismatches; the result is clamped to `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Cosine distance in `[0, 2]`: 0 for identical direction, 2 for opposite.
/// Zero vectors and dimension mismatches are maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.iter().all(|&x| x == 0.0) || b.iter().all(|&x| x == 0.0) {
        return 2.0;
    }
    1.0 - cosine_similarity(a, b)
}

/// Scales `v` to unit length in place. Returns false (leaving `v` untouched)
/// when the norm is zero or not finite.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    let s = 1.0 / norm;
    for x in v.iter_mut() {
        *x = (*x as f64 * s) as f32;
    }
    true
}
