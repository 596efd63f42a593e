//! Vector distance functions (§9 Open Question: distance metric), grounded
//! in `embedding-service::similarity::cosine_similarity`.

/// Cosine similarity in `[-1.0, 1.0]`. Zero-length vectors compare as `0.0`
/// rather than producing `NaN`, matching the teacher's zero-norm guard.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Raw inner product, for deployments that pin `VECTOR_DISTANCE=inner_product`
/// (embeddings are assumed unit-normalized by the provider, so this ranks
/// the same as cosine for normalized vectors but skips the division).
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Cosine,
    InnerProduct,
}

impl DistanceMetric {
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::InnerProduct => inner_product(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_are_maximally_similar() {
        let a = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &a), 1.0);
    }

    #[test]
    fn orthogonal_vectors_have_zero_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn zero_vector_never_produces_nan() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn inner_product_scales_with_magnitude() {
        let a = vec![2.0, 0.0];
        let b = vec![2.0, 0.0];
        assert_eq!(inner_product(&a, &b), 4.0);
    }
}
