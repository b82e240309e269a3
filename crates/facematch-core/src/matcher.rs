//! Nearest-neighbour matching of a query embedding against enrolled faces.

use crate::types::{Embedding, EnrolledFace, MatchResult};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error(
        "embedding dimension mismatch: query has {expected} values, candidate has {actual} \
         (mixed extraction models?)"
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Distance metric between two embeddings. Smaller = more similar.
pub trait Distance {
    fn distance(&self, a: &Embedding, b: &Embedding) -> Result<f64, MatchError>;
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl Distance for Euclidean {
    fn distance(&self, a: &Embedding, b: &Embedding) -> Result<f64, MatchError> {
        if a.dim() != b.dim() {
            return Err(MatchError::DimensionMismatch {
                expected: a.dim(),
                actual: b.dim(),
            });
        }

        Ok(a.values
            .iter()
            .zip(b.values.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt())
    }
}

/// Strategy for finding the enrolled face a query belongs to.
///
/// A match is accepted only when its distance is strictly below `threshold`.
pub trait Matcher {
    fn identify(
        &self,
        query: &Embedding,
        candidates: &[EnrolledFace],
        threshold: f64,
    ) -> Result<MatchResult, MatchError>;
}

/// Exhaustive scan over every candidate, O(n·d) per query.
///
/// Fine for galleries in the hundreds. Ties on the minimum distance go to
/// the earliest candidate.
#[derive(Debug, Clone, Default)]
pub struct LinearScanMatcher<D = Euclidean> {
    metric: D,
}

impl LinearScanMatcher {
    pub fn new() -> Self {
        Self { metric: Euclidean }
    }
}

impl<D: Distance> LinearScanMatcher<D> {
    pub fn with_metric(metric: D) -> Self {
        Self { metric }
    }
}

impl<D: Distance> Matcher for LinearScanMatcher<D> {
    fn identify(
        &self,
        query: &Embedding,
        candidates: &[EnrolledFace],
        threshold: f64,
    ) -> Result<MatchResult, MatchError> {
        if candidates.is_empty() {
            return Ok(MatchResult::NoMatch);
        }

        let mut best_dist = f64::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, candidate) in candidates.iter().enumerate() {
            let dist = self.metric.distance(query, &candidate.embedding)?;
            // Strict: first occurrence of the minimum wins, NaN never does.
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            best_distance = best_dist,
            threshold,
            "linear scan complete"
        );

        match best_idx {
            Some(idx) if best_dist < threshold => Ok(MatchResult::Matched {
                identity: candidates[idx].identity.clone(),
                distance: best_dist,
            }),
            _ => Ok(MatchResult::NoMatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;
    use chrono::Utc;
    use std::cell::Cell;

    fn face(id: i64, name: &str, values: Vec<f64>) -> EnrolledFace {
        EnrolledFace {
            identity: Identity {
                id,
                name: name.into(),
                age: None,
                email: None,
                phone: None,
                image_path: format!("uploads/{name}.jpg"),
                enrolled_at: Utc::now(),
            },
            embedding: Embedding::new(values),
        }
    }

    fn emb(values: Vec<f64>) -> Embedding {
        Embedding::new(values)
    }

    /// Euclidean metric that counts how often it is called.
    #[derive(Default)]
    struct CountingEuclidean {
        calls: Cell<usize>,
    }

    impl Distance for CountingEuclidean {
        fn distance(&self, a: &Embedding, b: &Embedding) -> Result<f64, MatchError> {
            self.calls.set(self.calls.get() + 1);
            Euclidean.distance(a, b)
        }
    }

    #[test]
    fn test_euclidean_distance() {
        let d = Euclidean.distance(&emb(vec![0.0, 0.0]), &emb(vec![3.0, 4.0])).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_euclidean_symmetric() {
        let a = emb(vec![0.12, -0.5, 3.25, 7.0]);
        let b = emb(vec![-1.0, 0.75, 2.0, 6.5]);
        assert_eq!(
            Euclidean.distance(&a, &b).unwrap(),
            Euclidean.distance(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_euclidean_dimension_mismatch() {
        let err = Euclidean.distance(&emb(vec![1.0, 2.0]), &emb(vec![1.0])).unwrap_err();
        assert_eq!(err, MatchError::DimensionMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn test_nearest_within_threshold_matches() {
        // Alice at [0,0], Bob at [10,10], query [0,1]
        let gallery = vec![
            face(1, "Alice", vec![0.0, 0.0]),
            face(2, "Bob", vec![10.0, 10.0]),
        ];
        let result = LinearScanMatcher::new()
            .identify(&emb(vec![0.0, 1.0]), &gallery, 0.5)
            .unwrap();
        // distance 1.0 is not below 0.5
        assert_eq!(result, MatchResult::NoMatch);

        let result = LinearScanMatcher::new()
            .identify(&emb(vec![0.0, 0.3]), &gallery, 0.5)
            .unwrap();
        assert_eq!(result.identity().map(|i| i.name.as_str()), Some("Alice"));
        assert!((result.distance().unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_best_match_reports_distance() {
        let gallery = vec![
            face(1, "Alice", vec![0.0, 0.0]),
            face(2, "Bob", vec![10.0, 10.0]),
        ];
        let result = LinearScanMatcher::new()
            .identify(&emb(vec![0.0, 1.0]), &gallery, 1.5)
            .unwrap();
        match result {
            MatchResult::Matched { identity, distance } => {
                assert_eq!(identity.name, "Alice");
                assert_eq!(distance, 1.0);
            }
            MatchResult::NoMatch => panic!("expected Alice"),
        }
    }

    #[test]
    fn test_far_query_no_match() {
        let gallery = vec![face(1, "Alice", vec![0.0, 0.0])];
        let result = LinearScanMatcher::new()
            .identify(&emb(vec![10.0, 10.0]), &gallery, 0.5)
            .unwrap();
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn test_empty_gallery_no_comparisons() {
        let matcher = LinearScanMatcher::with_metric(CountingEuclidean::default());
        for threshold in [0.0, 0.5, f64::MAX] {
            let result = matcher.identify(&emb(vec![1.0, 1.0]), &[], threshold).unwrap();
            assert_eq!(result, MatchResult::NoMatch);
        }
        assert_eq!(matcher.metric.calls.get(), 0);
    }

    #[test]
    fn test_every_candidate_compared() {
        let gallery = vec![
            face(1, "decoy1", vec![5.0, 5.0]),
            face(2, "decoy2", vec![9.0, 9.0]),
            face(3, "match", vec![1.0, 1.0]),
        ];
        let matcher = LinearScanMatcher::with_metric(CountingEuclidean::default());
        let result = matcher.identify(&emb(vec![1.0, 1.0]), &gallery, 0.5).unwrap();
        assert_eq!(result.identity().map(|i| i.id), Some(3));
        assert_eq!(matcher.metric.calls.get(), 3);
    }

    #[test]
    fn test_exact_match_accepted_for_any_positive_threshold() {
        let gallery = vec![
            face(1, "Bob", vec![0.4, 0.4, 0.4]),
            face(2, "Alice", vec![0.1, 0.2, 0.3]),
        ];
        for threshold in [f64::MIN_POSITIVE, 1e-9, 0.5, 100.0] {
            let result = LinearScanMatcher::new()
                .identify(&emb(vec![0.1, 0.2, 0.3]), &gallery, threshold)
                .unwrap();
            assert_eq!(result.identity().map(|i| i.id), Some(2), "threshold {threshold}");
            assert_eq!(result.distance(), Some(0.0));
        }
    }

    #[test]
    fn test_zero_threshold_never_matches() {
        let gallery = vec![face(1, "Alice", vec![1.0, 2.0])];
        let result = LinearScanMatcher::new()
            .identify(&emb(vec![1.0, 2.0]), &gallery, 0.0)
            .unwrap();
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn test_threshold_is_strict() {
        let gallery = vec![face(1, "Alice", vec![0.0, 0.0])];
        let query = emb(vec![0.0, 0.5]);
        let at = LinearScanMatcher::new().identify(&query, &gallery, 0.5).unwrap();
        assert!(!at.is_match());
        let above = LinearScanMatcher::new().identify(&query, &gallery, 0.500001).unwrap();
        assert!(above.is_match());
    }

    #[test]
    fn test_raising_threshold_keeps_match() {
        let gallery = vec![
            face(1, "Alice", vec![0.0, 0.0, 0.0]),
            face(2, "Bob", vec![1.0, 1.0, 1.0]),
            face(3, "Carol", vec![-1.0, 0.5, 0.25]),
        ];
        let query = emb(vec![0.2, 0.1, 0.0]);
        let thresholds = [0.0, 0.1, 0.2, 0.23, 0.3, 0.5, 1.0, 10.0];
        let matcher = LinearScanMatcher::new();

        let mut seen_match: Option<i64> = None;
        for t in thresholds {
            let result = matcher.identify(&query, &gallery, t).unwrap();
            if let Some(prev) = seen_match {
                assert_eq!(result.identity().map(|i| i.id), Some(prev), "threshold {t}");
            }
            if let Some(identity) = result.identity() {
                seen_match = Some(identity.id);
            }
        }
        assert_eq!(seen_match, Some(1));
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let gallery = vec![
            face(1, "first", vec![1.0, 0.0]),
            face(2, "second", vec![-1.0, 0.0]),
            face(3, "third", vec![0.0, 1.0]),
        ];
        let result = LinearScanMatcher::new()
            .identify(&emb(vec![0.0, 0.0]), &gallery, 2.0)
            .unwrap();
        assert_eq!(result.identity().map(|i| i.id), Some(1));
    }

    #[test]
    fn test_dimension_mismatch_fails_request() {
        let gallery = vec![
            face(1, "Alice", vec![0.0, 0.0]),
            face(2, "Legacy", vec![0.0, 0.0, 0.0]),
        ];
        let err = LinearScanMatcher::new()
            .identify(&emb(vec![0.0, 0.0]), &gallery, 0.5)
            .unwrap_err();
        assert_eq!(err, MatchError::DimensionMismatch { expected: 2, actual: 3 });
    }

    #[test]
    fn test_nan_candidate_never_selected() {
        let gallery = vec![
            face(1, "broken", vec![f64::NAN, 0.0]),
            face(2, "Alice", vec![0.0, 0.1]),
        ];
        let result = LinearScanMatcher::new()
            .identify(&emb(vec![0.0, 0.0]), &gallery, 0.5)
            .unwrap();
        assert_eq!(result.identity().map(|i| i.id), Some(2));
    }
}
