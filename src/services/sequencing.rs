//! Drop sequencing for multi-drop routes.
//!
//! Orders drops by their saved distance: the first drop stays where it is,
//! then the drop with the smallest saved distance among the remaining ones is
//! appended until none are left. The key is a static per-drop value, not the
//! distance from the previous stop, so the result is a selection by key rather
//! than a geographic tour.

use tracing::debug;

use crate::defaults::{FALLBACK_SAVED_DISTANCE_KM, SCORE_DISTANCE_SCALE_KM};
use crate::types::DropInput;

pub const ALGORITHM: &str = "saved-distance-selection";

/// Anything that may carry a precomputed distance estimate.
pub trait SavedDistance {
    fn saved_distance(&self) -> Option<f64>;
}

impl SavedDistance for DropInput {
    fn saved_distance(&self) -> Option<f64> {
        self.saved_or_base_distance()
    }
}

impl SavedDistance for Option<f64> {
    fn saved_distance(&self) -> Option<f64> {
        *self
    }
}

/// Sequencing key of a drop: its saved distance as given, or the fallback
/// distance when it has none.
pub fn distance_key<T: SavedDistance + ?Sized>(drop: &T) -> f64 {
    drop.saved_distance()
        .filter(|value| value.is_finite())
        .unwrap_or(FALLBACK_SAVED_DISTANCE_KM)
}

/// Result of sequencing
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced<T> {
    /// Drops in visiting order
    pub drops: Vec<T>,
    /// `order[k]` is the input index of the k-th visited drop
    pub order: Vec<usize>,
    /// Score in `[0, 1]`
    pub score: f64,
}

impl<T> Sequenced<T> {
    pub fn reordered(&self) -> bool {
        self.order.iter().enumerate().any(|(position, &index)| position != index)
    }
}

/// Sequence drops. Lists of two or fewer drops are returned as given with a
/// score of 1.0.
pub fn sequence_drops<T: SavedDistance>(drops: Vec<T>) -> Sequenced<T> {
    let n = drops.len();
    if n <= 2 {
        return Sequenced {
            order: (0..n).collect(),
            drops,
            score: 1.0,
        };
    }

    let mut remaining: Vec<(usize, f64, T)> = drops
        .into_iter()
        .enumerate()
        .map(|(index, drop)| (index, distance_key(&drop), drop))
        .collect();

    let mut ordered = Vec::with_capacity(n);
    let mut order = Vec::with_capacity(n);

    // The starting drop is never reconsidered
    let (anchor_index, _, anchor) = remaining.remove(0);
    order.push(anchor_index);
    ordered.push(anchor);

    while !remaining.is_empty() {
        let mut best = 0;
        for candidate in 1..remaining.len() {
            // Strict comparison keeps the earliest drop on ties
            if remaining[candidate].1 < remaining[best].1 {
                best = candidate;
            }
        }
        let (index, _, drop) = remaining.remove(best);
        order.push(index);
        ordered.push(drop);
    }

    let score = optimization_score(&ordered);
    debug!("Sequenced {} drops, order={:?}, score={:.3}", n, order, score);

    Sequenced {
        drops: ordered,
        order,
        score,
    }
}

/// Score of an already ordered route: one minus the average key of every drop
/// except the last, scaled by [`SCORE_DISTANCE_SCALE_KM`], clamped to `[0, 1]`.
pub fn optimization_score<T: SavedDistance>(ordered: &[T]) -> f64 {
    if ordered.len() < 2 {
        return 1.0;
    }

    let legs = &ordered[..ordered.len() - 1];
    let average = legs.iter().map(distance_key).sum::<f64>() / legs.len() as f64;

    (1.0 - average / SCORE_DISTANCE_SCALE_KM).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[Option<f64>]) -> Vec<Option<f64>> {
        values.to_vec()
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn test_documented_example() {
        let result = sequence_drops(keys(&[Some(8.0), Some(2.0), Some(5.0)]));

        assert_eq!(result.drops, vec![Some(8.0), Some(2.0), Some(5.0)]);
        assert_eq!(result.order, vec![0, 1, 2]);
        assert!((result.score - 0.5).abs() < 1e-9);
        assert!(!result.reordered());
    }

    #[test]
    fn test_picks_smallest_remaining_key() {
        let result = sequence_drops(keys(&[Some(1.0), Some(9.0), Some(3.0), Some(4.0)]));

        assert_eq!(result.order, vec![0, 2, 3, 1]);
        assert!(result.reordered());
        // avg(1, 3, 4) = 8/3
        assert!((result.score - (1.0 - 8.0 / 30.0)).abs() < 1e-9);
    }

    #[test]
    fn test_short_lists_are_returned_unchanged() {
        let empty: Sequenced<Option<f64>> = sequence_drops(vec![]);
        assert!(empty.drops.is_empty());
        assert_eq!(empty.score, 1.0);

        let one = sequence_drops(keys(&[Some(50.0)]));
        assert_eq!(one.order, vec![0]);
        assert_eq!(one.score, 1.0);

        let two = sequence_drops(keys(&[Some(9.0), Some(1.0)]));
        assert_eq!(two.drops, vec![Some(9.0), Some(1.0)]);
        assert_eq!(two.score, 1.0);
    }

    #[test]
    fn test_first_drop_is_anchored() {
        let result = sequence_drops(keys(&[Some(100.0), Some(0.5), Some(0.1)]));
        assert_eq!(result.order[0], 0);
        assert_eq!(result.drops[0], Some(100.0));
        assert_eq!(result.order, vec![0, 2, 1]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let result = sequence_drops(keys(&[Some(7.0), Some(2.0), Some(2.0), Some(2.0)]));
        assert_eq!(result.order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_missing_distance_uses_fallback() {
        assert_eq!(distance_key(&None::<f64>), FALLBACK_SAVED_DISTANCE_KM);
        assert_eq!(distance_key(&Some(f64::NAN)), FALLBACK_SAVED_DISTANCE_KM);
        assert_eq!(distance_key(&Some(0.0)), 0.0);

        // 4.9 < fallback 5.0 < 5.1
        let result = sequence_drops(keys(&[Some(1.0), Some(5.1), None, Some(4.9)]));
        assert_eq!(result.order, vec![0, 3, 2, 1]);

        // A missing value ties with an explicit 5.0 and loses to the earlier one
        let result = sequence_drops(keys(&[Some(1.0), Some(5.0), None]));
        assert_eq!(result.order, vec![0, 1, 2]);
    }

    #[test]
    fn test_score_is_clamped() {
        let zeros = sequence_drops(keys(&[Some(0.0), Some(0.0), Some(0.0)]));
        assert_eq!(zeros.score, 1.0);

        let far = sequence_drops(keys(&[Some(500.0), Some(250.0), Some(900.0)]));
        assert_eq!(far.score, 0.0);

        let huge = sequence_drops(keys(&[Some(f64::MAX), Some(f64::MAX), Some(f64::MAX)]));
        assert!((0.0..=1.0).contains(&huge.score));
    }

    #[test]
    fn test_negative_distance_is_a_plain_key() {
        assert_eq!(distance_key(&Some(-2.0)), -2.0);

        let result = sequence_drops(keys(&[Some(1.0), Some(-2.0), Some(3.0)]));
        assert_eq!(result.order, vec![0, 1, 2]);
        // 1 - avg(1, -2) / 10 = 1.05, clamped
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_non_finite_saved_distance_falls_back_to_base() {
        let drop = DropInput {
            saved_distance: Some(f64::INFINITY),
            base_distance_miles: Some(2.5),
            ..Default::default()
        };
        assert_eq!(distance_key(&drop), 2.5);

        let neither = DropInput { saved_distance: Some(f64::NAN), ..Default::default() };
        assert_eq!(distance_key(&neither), FALLBACK_SAVED_DISTANCE_KM);
    }

    #[test]
    fn test_all_fallback_score() {
        let result = sequence_drops(keys(&[None, None, None, None]));
        assert_eq!(result.order, vec![0, 1, 2, 3]);
        assert!((result.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_output_is_a_permutation() {
        let inputs = vec![
            keys(&[Some(3.0), None, Some(1.0), Some(1.0), Some(12.5), None, Some(0.0)]),
            keys(&[None, Some(2.0), Some(8.0), Some(4.0), Some(6.0)]),
            keys(&[Some(9.0), Some(8.0), Some(7.0), Some(6.0), Some(5.0), Some(4.0)]),
        ];

        for input in inputs {
            let n = input.len();
            let result = sequence_drops(input.clone());
            assert_eq!(result.drops.len(), n);
            assert!(is_permutation(&result.order, n));
            for (position, &index) in result.order.iter().enumerate() {
                assert_eq!(result.drops[position], input[index]);
            }
        }
    }

    #[test]
    fn test_sequencing_is_deterministic() {
        let input = keys(&[Some(4.0), None, Some(2.0), Some(2.0), Some(7.0)]);
        let first = sequence_drops(input.clone());
        let second = sequence_drops(input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_drop_input_key_uses_base_distance() {
        let drops = vec![
            DropInput { saved_distance: Some(6.0), ..Default::default() },
            DropInput { base_distance_miles: Some(9.0), ..Default::default() },
            DropInput { saved_distance: Some(3.0), base_distance_miles: Some(99.0), ..Default::default() },
            DropInput::default(),
        ];

        let result = sequence_drops(drops);
        assert_eq!(result.order, vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_score_of_ordered_list_ignores_last_drop() {
        let ordered = keys(&[Some(2.0), Some(4.0), Some(1000.0)]);
        assert!((optimization_score(&ordered) - 0.7).abs() < 1e-9);
    }
}
