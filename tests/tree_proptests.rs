//! Property-based tests for the `tree` module.
//!
//! These tests verify invariants and properties that should hold for all inputs.
//! Uses differential testing against `BTreeMap` as an oracle.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

use bpptree::BppTree;
use proptest::prelude::*;
use std::collections::BTreeMap;

// ============================================================================
//  Strategies
// ============================================================================

/// Strategy for valid tree shapes: fanout and initial leaf capacity.
fn tree_shape() -> impl Strategy<Value = (usize, usize)> {
    (3..=12usize, 4..=32usize)
}

/// Keys from a small domain so sequences collide, overwrite, and split.
fn key() -> impl Strategy<Value = i64> {
    -200..=200i64
}

/// Strategy for generating a set of unique keys.
fn unique_keys(max_count: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(key(), 0..=max_count)
        .prop_map(|set| set.into_iter().collect())
}

/// Operations for random testing.
#[derive(Debug, Clone)]
enum Op {
    Insert(i64, u64),
    Get(i64),
    Remove(i64),
}

/// Strategy for generating random operation sequences.
fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            4 => (key(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
            2 => key().prop_map(Op::Get),
            1 => key().prop_map(Op::Remove),
        ],
        0..=max_ops,
    )
}

// ============================================================================
//  Basic Insert/Get Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every inserted key should be retrievable.
    #[test]
    fn insert_then_get_returns_value((order, cap) in tree_shape(), k in key(), value: u64) {
        let mut tree: BppTree<i64, u64> = BppTree::new(order, cap).unwrap();
        prop_assert!(tree.insert(k, value).is_none());

        prop_assert_eq!(tree.get(k).copied(), Some(value));
        prop_assert_eq!(tree.len(), 1);
    }

    /// Inserting a duplicate key overwrites and returns the old value.
    #[test]
    fn insert_duplicate_returns_old_value(k in key(), v1: u64, v2: u64) {
        let mut tree: BppTree<i64, u64> = BppTree::new(4, 16).unwrap();

        prop_assert!(tree.insert(k, v1).is_none());
        prop_assert_eq!(tree.insert(k, v2), Some(v1));

        prop_assert_eq!(tree.get(k).copied(), Some(v2));
        prop_assert_eq!(tree.len(), 1);
    }

    /// Get on a non-existent key returns None.
    #[test]
    fn get_missing_returns_none(inserted in key(), missing in key(), value: u64) {
        prop_assume!(inserted != missing);

        let mut tree: BppTree<i64, u64> = BppTree::new(4, 16).unwrap();
        tree.insert(inserted, value);

        prop_assert!(tree.get(missing).is_none());
    }

    /// Removal reports presence and actually removes.
    #[test]
    fn remove_is_accurate(keys in unique_keys(64), victim in key()) {
        let mut tree: BppTree<i64, i64> = BppTree::new(4, 8).unwrap();
        for &k in &keys {
            tree.insert(k, k);
        }

        let present = keys.contains(&victim);
        prop_assert_eq!(tree.remove(victim), present.then_some(victim));
        prop_assert!(tree.get(victim).is_none());
        prop_assert!(!tree.iter().any(|(k, _)| k == victim));
    }
}

// ============================================================================
//  Ordering and Range Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Iteration yields strictly ascending keys, all of them.
    #[test]
    fn iter_is_sorted_and_complete((order, cap) in tree_shape(), keys in unique_keys(256)) {
        let mut tree: BppTree<i64, i64> = BppTree::new(order, cap).unwrap();
        // Descending inserts are the worst case for gap placement.
        for &k in keys.iter().rev() {
            tree.insert(k, -k);
        }

        let walked: Vec<i64> = tree.iter().map(|(k, _)| k).collect();
        prop_assert_eq!(walked, keys);
        tree.validate().unwrap();
    }

    /// The range law: `range(lo, hi)` is the inclusive filter of `iter()`.
    #[test]
    fn range_equals_filtered_iter(
        (order, cap) in tree_shape(),
        keys in unique_keys(128),
        lo in key(),
        hi in key(),
    ) {
        let mut tree: BppTree<i64, i64> = BppTree::new(order, cap).unwrap();
        for &k in &keys {
            tree.insert(k, k * 3);
        }

        let ranged: Vec<(i64, i64)> = tree.range(lo, hi).map(|(k, v)| (k, *v)).collect();
        let filtered: Vec<(i64, i64)> = tree
            .iter()
            .filter(|(k, _)| (lo..=hi).contains(k))
            .map(|(k, v)| (k, *v))
            .collect();

        prop_assert_eq!(ranged, filtered);
    }

    /// An inverted range is empty.
    #[test]
    fn inverted_range_is_empty(keys in unique_keys(64), lo in key(), hi in key()) {
        prop_assume!(lo > hi);

        let mut tree: BppTree<i64, i64> = BppTree::new(4, 16).unwrap();
        for &k in &keys {
            tree.insert(k, k);
        }

        prop_assert_eq!(tree.range(lo, hi).count(), 0);
    }
}

// ============================================================================
//  Differential Testing
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(192))]

    /// Any operation interleaving agrees with `BTreeMap`, op by op and in
    /// the final state.
    #[test]
    fn differential_against_btreemap((order, cap) in tree_shape(), ops in operations(400)) {
        let mut tree: BppTree<i64, u64> = BppTree::new(order, cap).unwrap();
        let mut oracle: BTreeMap<i64, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    prop_assert_eq!(tree.insert(k, v), oracle.insert(k, v));
                }
                Op::Get(k) => {
                    prop_assert_eq!(tree.get(k), oracle.get(&k));
                }
                Op::Remove(k) => {
                    prop_assert_eq!(tree.remove(k), oracle.remove(&k));
                }
            }
        }

        prop_assert_eq!(tree.len(), oracle.len());

        let walked: Vec<(i64, u64)> = tree.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(i64, u64)> = oracle.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(walked, expected);

        tree.validate().unwrap();
    }

    /// Insert-then-remove returns to an iteration-equivalent state.
    #[test]
    fn insert_remove_round_trips(keys in unique_keys(128), extra in key(), value: u64) {
        prop_assume!(!keys.contains(&extra));

        let mut tree: BppTree<i64, u64> = BppTree::new(4, 8).unwrap();
        for &k in &keys {
            tree.insert(k, 1);
        }
        let before: Vec<i64> = tree.iter().map(|(k, _)| k).collect();

        tree.insert(extra, value);
        prop_assert_eq!(tree.remove(extra), Some(value));

        let after: Vec<i64> = tree.iter().map(|(k, _)| k).collect();
        prop_assert_eq!(before, after);
        tree.validate().unwrap();
    }
}

// ============================================================================
//  Predictor Soundness
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Lookups return the same results with every model cleared: the
    /// predictor is advisory, binary search is the authority.
    #[test]
    fn lookups_agree_with_models_cleared((order, cap) in tree_shape(), ops in operations(300)) {
        let mut tree: BppTree<i64, u64> = BppTree::new(order, cap).unwrap();
        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    tree.insert(k, v);
                }
                Op::Remove(k) => {
                    tree.remove(k);
                }
                Op::Get(_) => {}
            }
        }

        let with_models: Vec<Option<u64>> =
            (-200..=200).map(|k| tree.get(k).copied()).collect();

        tree.clear_models();

        let without_models: Vec<Option<u64>> =
            (-200..=200).map(|k| tree.get(k).copied()).collect();

        prop_assert_eq!(with_models, without_models);
    }
}
