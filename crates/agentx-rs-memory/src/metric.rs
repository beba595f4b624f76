//! Similarity metrics used to rank records.

use serde::{Deserialize, Serialize};

/// Metric used both when building and when querying an index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
    /// Raw dot product.
    Dot,
    /// Negated euclidean distance, so closer vectors still score higher.
    Euclidean,
}

impl SimilarityMetric {
    /// Score two vectors of equal length. Higher means more similar.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Dot => dot(a, b),
            SimilarityMetric::Euclidean => -euclidean(a, b),
        }
    }

    /// Return the metric as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Dot => "dot",
            SimilarityMetric::Euclidean => "euclidean",
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    // Zero vectors have no direction.
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::SimilarityMetric;
    use pretty_assertions::assert_eq;

    #[test]
    fn cosine_prefers_same_direction() {
        let metric = SimilarityMetric::Cosine;
        let same = metric.score(&[1.0, 0.0], &[2.0, 0.0]);
        let orthogonal = metric.score(&[1.0, 0.0], &[0.0, 3.0]);
        assert!((same - 1.0).abs() < 1e-6);
        assert!(orthogonal.abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(SimilarityMetric::Cosine.score(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn euclidean_scores_closer_vectors_higher() {
        let metric = SimilarityMetric::Euclidean;
        let near = metric.score(&[0.0, 0.0], &[0.0, 1.0]);
        let far = metric.score(&[0.0, 0.0], &[3.0, 4.0]);
        assert_eq!(near, -1.0);
        assert_eq!(far, -5.0);
        assert!(near > far);
    }

    #[test]
    fn metric_round_trips_through_serde() {
        let value = serde_json::to_string(&SimilarityMetric::Dot).expect("serialize");
        assert_eq!(value, "\"dot\"");
        let parsed: SimilarityMetric = serde_json::from_str("\"euclidean\"").expect("parse");
        assert_eq!(parsed, SimilarityMetric::Euclidean);
    }
}
