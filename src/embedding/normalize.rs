/// Tolerance used when checking that a vector has unit length
pub const NORM_TOLERANCE: f32 = 1e-5;

/// Scale `vector` to unit Euclidean length in place
///
/// Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn is_unit_length(vector: &[f32]) -> bool {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    (norm - 1.0).abs() <= NORM_TOLERANCE
}
