//! Property tests for the disjoint-set structure.
//!
//! Random union sequences are checked against a naive relabelling oracle:
//! after any sequence, two indices must be connected exactly when the oracle
//! gives them the same label, whether the unions were applied to one
//! structure or split across two and merged.

use proptest::{prelude::*, test_runner::TestCaseResult};

use super::*;
use crate::{Untracked, test_utils::suite_proptest_config};

/// Largest capacity drawn by the strategies.
const MAX_CAPACITY: u64 = 48;

const PAGE: u64 = crate::paging::PAGE_SIZE as u64;
const SPANNING_CAPACITY: u64 = 3 * PAGE + 5;
/// Indices on either side of every page boundary of `SPANNING_CAPACITY`.
const BOUNDARY_INDICES: [u64; 10] = [
    0,
    1,
    PAGE - 1,
    PAGE,
    PAGE + 1,
    2 * PAGE - 1,
    2 * PAGE,
    3 * PAGE - 1,
    3 * PAGE,
    3 * PAGE + 4,
];

fn boundary_unions_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    let slots = BOUNDARY_INDICES.len();
    proptest::collection::vec((0..slots, 0..slots), 0..24)
}

fn unions_strategy() -> impl Strategy<Value = (u64, Vec<(u64, u64)>)> {
    (1..=MAX_CAPACITY).prop_flat_map(|capacity| {
        let pair = (0..capacity, 0..capacity);
        (Just(capacity), proptest::collection::vec(pair, 0..64))
    })
}

fn oracle_labels(capacity: u64, unions: &[(u64, u64)]) -> Vec<u64> {
    let mut labels: Vec<u64> = (0..capacity).collect();
    for &(p, q) in unions {
        let from = labels[q as usize];
        let to = labels[p as usize];
        for label in &mut labels {
            if *label == from {
                *label = to;
            }
        }
    }
    labels
}

fn build(capacity: u64, unions: &[(u64, u64)]) -> core::result::Result<DisjointSetStruct, TestCaseError> {
    let mut dss = DisjointSetStruct::new(capacity, Arc::new(Untracked))
        .map_err(|err| TestCaseError::fail(err.to_string()))?;
    for &(p, q) in unions {
        dss.union(p, q)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
    }
    Ok(dss)
}

fn assert_matches_oracle(dss: &mut DisjointSetStruct, labels: &[u64]) -> TestCaseResult {
    let capacity = dss.capacity();
    for p in 0..capacity {
        for q in 0..capacity {
            let connected = dss
                .connected(p, q)
                .map_err(|err| TestCaseError::fail(err.to_string()))?;
            prop_assert_eq!(
                connected,
                labels[p as usize] == labels[q as usize],
                "p={}, q={}",
                p,
                q
            );
        }
    }
    let mut distinct = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let count = dss
        .set_count()
        .map_err(|err| TestCaseError::fail(err.to_string()))?;
    prop_assert_eq!(count, distinct.len() as u64);
    Ok(())
}

proptest! {
    #![proptest_config(suite_proptest_config(128))]

    #[test]
    fn unions_match_oracle((capacity, unions) in unions_strategy()) {
        let mut dss = build(capacity, &unions)?;
        assert_matches_oracle(&mut dss, &oracle_labels(capacity, &unions))?;
    }

    #[test]
    fn applying_unions_twice_changes_nothing((capacity, unions) in unions_strategy()) {
        let mut once = build(capacity, &unions)?;
        let doubled: Vec<_> = unions.iter().chain(unions.iter()).copied().collect();
        let mut twice = build(capacity, &doubled)?;
        for p in 0..capacity {
            for q in 0..capacity {
                let a = once.connected(p, q).map_err(|err| TestCaseError::fail(err.to_string()))?;
                let b = twice.connected(p, q).map_err(|err| TestCaseError::fail(err.to_string()))?;
                prop_assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn split_then_merge_matches_sequential(
        (capacity, unions) in unions_strategy(),
        split in 0.0_f64..=1.0,
    ) {
        let cut = ((unions.len() as f64) * split) as usize;
        let (head, tail) = unions.split_at(cut.min(unions.len()));
        let mut left = build(capacity, head)?;
        let right = build(capacity, tail)?;
        left.merge(&right).map_err(|err| TestCaseError::fail(err.to_string()))?;
        assert_matches_oracle(&mut left, &oracle_labels(capacity, &unions))?;
    }

    #[test]
    fn find_no_opt_agrees_with_find((capacity, unions) in unions_strategy()) {
        let mut dss = build(capacity, &unions)?;
        for index in 0..capacity {
            let stable = dss.find_no_opt(index).map_err(|err| TestCaseError::fail(err.to_string()))?;
            let compressed = dss.find(index).map_err(|err| TestCaseError::fail(err.to_string()))?;
            prop_assert_eq!(stable, compressed);
        }
    }

    #[test]
    fn split_merge_across_pages_matches_sequential(
        slots in boundary_unions_strategy(),
        split in 0.0_f64..=1.0,
    ) {
        let unions: Vec<(u64, u64)> = slots
            .iter()
            .map(|&(p, q)| (BOUNDARY_INDICES[p], BOUNDARY_INDICES[q]))
            .collect();
        let slot_unions: Vec<(u64, u64)> =
            slots.iter().map(|&(p, q)| (p as u64, q as u64)).collect();
        let labels = oracle_labels(BOUNDARY_INDICES.len() as u64, &slot_unions);
        let cut = ((unions.len() as f64) * split) as usize;
        let (head, tail) = unions.split_at(cut.min(unions.len()));
        let mut left = build(SPANNING_CAPACITY, head)?;
        let right = build(SPANNING_CAPACITY, tail)?;
        left.merge(&right).map_err(|err| TestCaseError::fail(err.to_string()))?;

        for (a, &p) in BOUNDARY_INDICES.iter().enumerate() {
            for (b, &q) in BOUNDARY_INDICES.iter().enumerate() {
                let connected = left.connected(p, q).map_err(|err| TestCaseError::fail(err.to_string()))?;
                prop_assert_eq!(connected, labels[a] == labels[b], "p={}, q={}", p, q);
            }
        }
        let mut distinct = labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        let merged_away = (BOUNDARY_INDICES.len() - distinct.len()) as u64;
        let count = left.set_count().map_err(|err| TestCaseError::fail(err.to_string()))?;
        prop_assert_eq!(count, SPANNING_CAPACITY - merged_away);
    }
}
