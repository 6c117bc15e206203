//! Property tests for the order-statistic tree.
//!
//! Every test drives the tree and a `BTreeMap` model with the same
//! operations and compares them after each step:
//! 1. Element count equals the number of live (score, member) pairs
//! 2. `rank`, `at_rank`, `first`, `last` agree with the model
//! 3. `top(n)` is highest score first, FIFO within a score, and `remove`
//!    reports the bucket position the member held
//! 4. Red-black and subtree-count invariants hold
//!
//! ## Running
//!
//! ```bash
//! cargo test --release --test tree_properties
//! ```

use std::collections::BTreeMap;

use dv_auction::tree::{OrderStatisticTree, TreeError};

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// MODEL
// ============================================================================

/// Reference model: score -> members in insertion order.
#[derive(Default)]
struct Model {
    buckets: BTreeMap<u128, Vec<u64>>,
}

impl Model {
    fn insert(&mut self, key: u128, member: u64) -> bool {
        let bucket = self.buckets.entry(key).or_default();
        if bucket.contains(&member) {
            return false;
        }
        bucket.push(member);
        true
    }

    /// Returns the position the member held in its bucket.
    fn remove(&mut self, key: u128, member: u64) -> Option<usize> {
        let bucket = self.buckets.get_mut(&key)?;
        let pos = bucket.iter().position(|m| *m == member)?;
        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&key);
        }
        Some(pos)
    }

    fn count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    fn rank(&self, key: u128) -> usize {
        self.buckets.range(..=key).map(|(_, b)| b.len()).sum()
    }

    fn at_rank(&self, rank: usize) -> Option<u128> {
        if rank == 0 {
            return None;
        }
        let mut seen = 0;
        for (key, bucket) in &self.buckets {
            seen += bucket.len();
            if seen >= rank {
                return Some(*key);
            }
        }
        None
    }

    fn descending(&self) -> Vec<(u128, u64)> {
        self.buckets
            .iter()
            .rev()
            .flat_map(|(key, bucket)| bucket.iter().map(move |m| (*key, *m)))
            .collect()
    }
}

/// Compare every query of the tree against the model.
fn assert_matches(tree: &OrderStatisticTree<u64>, model: &Model) {
    assert!(tree.is_valid(), "red-black invariants violated");
    assert_eq!(tree.count(), model.count());
    assert_eq!(tree.distinct_keys(), model.buckets.len());
    assert_eq!(tree.first(), model.buckets.keys().next().copied());
    assert_eq!(tree.last(), model.buckets.keys().next_back().copied());

    for rank in 0..=model.count() + 1 {
        assert_eq!(tree.at_rank(rank), model.at_rank(rank), "at_rank({})", rank);
    }
    for key in model.buckets.keys() {
        assert_eq!(tree.rank(*key), model.rank(*key), "rank({})", key);
        assert_eq!(tree.rank(key + 1), model.rank(key + 1));
    }

    assert_eq!(tree.iter_desc().collect::<Vec<_>>(), model.descending());
}

// ============================================================================
// SEEDED RANDOM WALK
// ============================================================================

/// Long mixed insert/remove walk with a seeded RNG; same seed, same walk.
#[test]
fn random_walk_matches_model() {
    const STEPS: usize = 5_000;
    const SEED: u64 = 42;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut tree = OrderStatisticTree::new();
    let mut model = Model::default();
    let mut live: Vec<(u128, u64)> = Vec::new();

    for step in 0..STEPS {
        if !live.is_empty() && rng.gen_bool(0.4) {
            let idx = rng.gen_range(0..live.len());
            let (key, member) = live.swap_remove(idx);
            let pos = tree.remove(key, member).unwrap();
            assert_eq!(model.remove(key, member), Some(pos));
        } else {
            // Narrow key range forces plenty of duplicate keys
            let key: u128 = rng.gen_range(0..200);
            let member: u64 = step as u64;
            tree.insert(key, member).unwrap();
            assert!(model.insert(key, member));
            live.push((key, member));
        }

        if step % 250 == 0 {
            assert_matches(&tree, &model);
        }
    }

    assert_matches(&tree, &model);
}

/// Draining a tree in top order leaves it empty and valid.
#[test]
fn drain_in_top_order() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut tree = OrderStatisticTree::new();

    for member in 0..1_000u64 {
        tree.insert(rng.gen_range(0..50u128), member).unwrap();
    }

    let mut previous = u128::MAX;
    while let Some((key, member)) = tree.top(1).first().copied() {
        assert!(key <= previous);
        previous = key;
        tree.remove(key, member).unwrap();
    }

    assert!(tree.is_empty());
    assert!(tree.is_valid());
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Insert(u128, u64),
    Remove(u128, u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u128..40, 0u64..30).prop_map(|(k, m)| Op::Insert(k, m)),
        2 => (0u128..40, 0u64..30).prop_map(|(k, m)| Op::Remove(k, m)),
    ]
}

proptest! {
    #[test]
    fn tree_agrees_with_model(ops in prop::collection::vec(op_strategy(), 1..300)) {
        let mut tree = OrderStatisticTree::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Insert(key, member) => {
                    let expected = model.insert(key, member);
                    let result = tree.insert(key, member);
                    prop_assert_eq!(result.is_ok(), expected);
                    if !expected {
                        prop_assert_eq!(result, Err(TreeError::DuplicateMember(key)));
                    }
                }
                Op::Remove(key, member) => {
                    let expected = model.remove(key, member);
                    prop_assert_eq!(tree.remove(key, member).ok(), expected);
                }
            }
            prop_assert!(tree.is_valid());
            prop_assert_eq!(tree.count(), model.count());
        }

        assert_matches(&tree, &model);
    }

    #[test]
    fn rank_inverts_at_rank_for_distinct_keys(keys in prop::collection::btree_set(any::<u128>(), 1..200)) {
        let mut tree = OrderStatisticTree::new();
        for (member, key) in keys.iter().enumerate() {
            tree.insert(*key, member as u64).unwrap();
        }

        for r in 1..=tree.count() {
            let key = tree.at_rank(r).unwrap();
            prop_assert_eq!(tree.rank(key), r);
        }
    }

    #[test]
    fn rank_is_stable_with_duplicates(entries in prop::collection::vec(0u128..20, 1..200)) {
        let mut tree = OrderStatisticTree::new();
        for (member, key) in entries.iter().enumerate() {
            tree.insert(*key, member as u64).unwrap();
        }

        for r in 1..=tree.count() {
            let key = tree.at_rank(r).unwrap();
            let rank = tree.rank(key);
            prop_assert!(rank >= r);
            prop_assert_eq!(tree.at_rank(rank), Some(key));
        }
    }

    #[test]
    fn percentile_and_permil_bounds(entries in prop::collection::vec(any::<u64>(), 1..100)) {
        let mut tree = OrderStatisticTree::new();
        for (member, key) in entries.iter().enumerate() {
            tree.insert(u128::from(*key), member as u64).unwrap();
        }

        let last = tree.last().unwrap();
        prop_assert_eq!(tree.percentile(last), 100);
        prop_assert_eq!(tree.permil(last), 1000);
        prop_assert_eq!(tree.at_percentile(100), Some(last));
        prop_assert!(tree.median().is_some());
    }
}
