//! Leaderboard ranking
//!
//! Orders items by a metric, highest first. The sort is stable: items with
//! equal metric values keep their relative input order, so the same input
//! list always yields the same ranking.

use serde::Serialize;

/// Number of leading positions flagged for podium treatment
pub const PODIUM_SIZE: usize = 3;

/// An item with its 1-based leaderboard position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranked<T> {
    pub rank: usize,
    pub podium: bool,
    #[serde(flatten)]
    pub item: T,
}

/// Rank items by `metric`, descending
///
/// NaN metrics sort last.
pub fn rank<T, F>(items: Vec<T>, metric: F) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> f64,
{
    let mut keyed: Vec<(f64, T)> = items
        .into_iter()
        .map(|item| {
            let value = metric(&item);
            (if value.is_nan() { f64::NEG_INFINITY } else { value }, item)
        })
        .collect();

    // sort_by is stable
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));

    keyed
        .into_iter()
        .enumerate()
        .map(|(index, (_, item))| Ranked {
            rank: index + 1,
            podium: index < PODIUM_SIZE,
            item,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_descending_with_one_based_positions() {
        let ranked = rank(vec![("a", 10.0), ("b", 30.0), ("c", 20.0)], |x| x.1);
        let order: Vec<_> = ranked.iter().map(|r| (r.item.0, r.rank)).collect();
        assert_eq!(order, vec![("b", 1), ("c", 2), ("a", 3)]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranked = rank(vec![("x", 5.0), ("y", 5.0), ("z", 5.0), ("w", 9.0)], |x| x.1);
        let names: Vec<_> = ranked.iter().map(|r| r.item.0).collect();
        assert_eq!(names, vec!["w", "x", "y", "z"]);
    }

    #[test]
    fn test_podium_flags_top_three_only() {
        let ranked = rank((0..5).map(|i| i as f64).collect(), |x| *x);
        let podium: Vec<_> = ranked.iter().map(|r| r.podium).collect();
        assert_eq!(podium, vec![true, true, true, false, false]);
    }

    #[test]
    fn test_nan_sorts_last() {
        let ranked = rank(vec![f64::NAN, 1.0], |x| *x);
        assert_eq!(ranked[0].item, 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank(Vec::<f64>::new(), |x| *x).is_empty());
    }
}
