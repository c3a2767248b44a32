//! Similarity metrics used by the vector index.
//!
//! The metric is chosen when an index is built, recorded in its header, and
//! used unchanged for every search against that index. Every metric is
//! expressed as a score where higher means more similar.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A vector similarity metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Cosine of the angle between the vectors, in `[-1, 1]`.
    #[default]
    Cosine,
    /// Raw dot product.
    InnerProduct,
    /// Negated Euclidean (L2) distance, in `(-inf, 0]`.
    Euclidean,
}

impl Similarity {
    /// Score `a` against `b`. Both slices must have the same length.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Similarity::Cosine => cosine_similarity(a, b),
            Similarity::InnerProduct => dot(a, b),
            Similarity::Euclidean => -euclidean_distance(a, b),
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Similarity::Cosine => "cosine",
            Similarity::InnerProduct => "inner_product",
            Similarity::Euclidean => "euclidean",
        };
        f.write_str(name)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_highest() {
        let v = [0.3, -0.4, 0.5];
        let w = [0.5, 0.4, -0.3];
        for metric in [Similarity::Cosine, Similarity::InnerProduct, Similarity::Euclidean] {
            assert!(metric.score(&v, &v) > metric.score(&v, &w), "{metric}");
        }
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(Similarity::Cosine.score(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn euclidean_is_negated_distance() {
        let score = Similarity::Euclidean.score(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((score + 5.0).abs() < 1e-6);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&Similarity::InnerProduct).unwrap();
        assert_eq!(json, "\"inner_product\"");
    }
}
