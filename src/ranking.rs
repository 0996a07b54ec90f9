//! Ranking of evaluated candidates.
//!
//! Each result is reduced to a single desirability score, lower is better:
//!
//! ```text
//! score = 10·|mean − 32| + 15·stddev + 5·zero_change_percentage
//! ```
//!
//! Spread and total diffusion failures weigh more than a slightly shifted
//! mean.

use crate::avalanche::{EvaluationResult, IDEAL_MEAN};
use std::cmp::Ordering;

/// Weight on the distance of the mean from 32.
pub const MEAN_WEIGHT: f64 = 10.0;
/// Weight on the standard deviation.
pub const STDDEV_WEIGHT: f64 = 15.0;
/// Weight on the zero-change percentage.
pub const ZERO_CHANGE_WEIGHT: f64 = 5.0;

/// Composite score of a result; smaller ranks higher.
pub fn score(result: &EvaluationResult) -> f64 {
    MEAN_WEIGHT * (result.mean_bit_changes() - IDEAL_MEAN).abs()
        + STDDEV_WEIGHT * result.stddev_bit_changes()
        + ZERO_CHANGE_WEIGHT * result.zero_change_percentage()
}

/// Orders two results best-first by [`score`].
pub fn compare(a: &EvaluationResult, b: &EvaluationResult) -> Ordering {
    score(a).total_cmp(&score(b))
}

/// Sorts `results` best-first.
///
/// The sort is stable: results with equal scores keep their incoming order.
pub fn rank(results: &mut [EvaluationResult]) {
    results.sort_by_cached_key(|result| OrderedScore(score(result)));
}

/// `f64` wrapper with the IEEE total order, for cached-key sorting.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedScore(f64);

impl Eq for OrderedScore {}

impl PartialOrd for OrderedScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avalanche::{Candidate, Histogram};
    use proptest::prelude::*;

    fn result_with(g: u64, spread: &[(u32, u64)]) -> EvaluationResult {
        let mut histogram = Histogram::new();
        for &(bits, count) in spread {
            histogram.add(bits, count);
        }
        EvaluationResult::from_histogram(Candidate::new(1_000_000_007, g), histogram).unwrap()
    }

    #[test]
    fn test_ideal_point_mass_scores_zero() {
        let result = result_with(5, &[(32, 100)]);
        assert_eq!(score(&result), 0.0);
    }

    #[test]
    fn test_score_uses_fixed_weights() {
        // Mean 31, stddev 31, zero-change 50%.
        let result = result_with(5, &[(0, 1), (62, 1)]);
        let expected = 10.0 * 1.0 + 15.0 * 31.0 + 5.0 * 50.0;
        assert!((score(&result) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_diffusion_failures_rank_last() {
        let mut batch = vec![
            result_with(2, &[(0, 50), (1, 50)]),
            result_with(3, &[(31, 40), (32, 20), (33, 40)]),
            result_with(4, &[(28, 50), (36, 50)]),
        ];
        rank(&mut batch);
        let order: Vec<u64> = batch.iter().map(|r| r.candidate().g).collect();
        assert_eq!(order, vec![3, 4, 2]);
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let mut batch = vec![
            result_with(11, &[(30, 10), (34, 10)]),
            result_with(12, &[(32, 10)]),
            result_with(13, &[(30, 10), (34, 10)]),
            result_with(14, &[(34, 10), (30, 10)]),
        ];
        rank(&mut batch);
        let order: Vec<u64> = batch.iter().map(|r| r.candidate().g).collect();
        assert_eq!(order, vec![12, 11, 13, 14]);
    }

    fn arbitrary_result() -> impl Strategy<Value = EvaluationResult> {
        (
            any::<u64>(),
            proptest::collection::btree_map(0u32..=64, 1u64..500, 1..6),
        )
            .prop_map(|(g, counts)| {
                let spread: Vec<(u32, u64)> = counts.into_iter().collect();
                result_with(g, &spread)
            })
    }

    proptest! {
        #[test]
        fn test_ranking_is_idempotent(mut batch in proptest::collection::vec(arbitrary_result(), 0..12)) {
            rank(&mut batch);
            let once = batch.clone();
            rank(&mut batch);
            prop_assert_eq!(once, batch);
        }

        #[test]
        fn test_ranked_batches_are_non_decreasing(mut batch in proptest::collection::vec(arbitrary_result(), 0..12)) {
            rank(&mut batch);
            for pair in batch.windows(2) {
                prop_assert_ne!(compare(&pair[0], &pair[1]), Ordering::Greater);
            }
        }

        #[test]
        fn test_compare_is_irreflexive_and_antisymmetric(a in arbitrary_result(), b in arbitrary_result()) {
            prop_assert_eq!(compare(&a, &a), Ordering::Equal);
            prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }
    }
}
