//! Size distribution of the sets held by a disjoint-set structure.
//!
//! Percentiles use the nearest-rank method: the reported value is the
//! smallest set size such that at least that share of all sets is no larger.

use crate::{error::Result, paged_array::PagedArray};

/// Percentile ranks reported by [`SetSizeSummary`], in field order.
pub const SET_SIZE_PERCENTILES: [usize; 10] = [1, 5, 10, 25, 50, 75, 90, 95, 99, 100];

/// Number of sets and their size percentiles.
///
/// A structure without elements yields a summary of zeros.
///
/// # Examples
/// ```
/// use colmena_core::SetSizeSummary;
///
/// let summary = SetSizeSummary::from_sizes(vec![1, 4, 0, 2, 1]);
/// assert_eq!(summary.community_count, 4);
/// assert_eq!(summary.p50, 1);
/// assert_eq!(summary.p100, 4);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SetSizeSummary {
    /// Number of non-empty sets.
    pub community_count: u64,
    /// Size at the 1st percentile.
    pub p1: u64,
    /// Size at the 5th percentile.
    pub p5: u64,
    /// Size at the 10th percentile.
    pub p10: u64,
    /// Size at the 25th percentile.
    pub p25: u64,
    /// Median set size.
    pub p50: u64,
    /// Size at the 75th percentile.
    pub p75: u64,
    /// Size at the 90th percentile.
    pub p90: u64,
    /// Size at the 95th percentile.
    pub p95: u64,
    /// Size at the 99th percentile.
    pub p99: u64,
    /// Size of the largest set.
    pub p100: u64,
}

impl SetSizeSummary {
    /// Summarises a list of set sizes; zero entries are ignored.
    #[must_use]
    pub fn from_sizes(mut sizes: Vec<u64>) -> Self {
        sizes.retain(|&size| size > 0);
        sizes.sort_unstable();
        let [p1, p5, p10, p25, p50, p75, p90, p95, p99, p100] =
            SET_SIZE_PERCENTILES.map(|percentile| nearest_rank(&sizes, percentile));
        Self {
            community_count: sizes.len() as u64,
            p1,
            p5,
            p10,
            p25,
            p50,
            p75,
            p90,
            p95,
            p99,
            p100,
        }
    }

    /// Summarises the per-root counts produced by
    /// [`crate::DisjointSetStruct::set_sizes`].
    ///
    /// # Errors
    /// Returns [`crate::PagedError::Released`] when `sizes` has been released.
    pub fn from_set_sizes(sizes: &PagedArray<u64>) -> Result<Self> {
        let mut non_empty = Vec::new();
        let mut cursor = sizes.cursor()?;
        while cursor.next() {
            non_empty.extend(cursor.slice().iter().copied().filter(|&size| size > 0));
        }
        Ok(Self::from_sizes(non_empty))
    }

    /// Returns the size at `percentile`, which must be one of
    /// [`SET_SIZE_PERCENTILES`].
    #[must_use]
    pub const fn percentile(&self, percentile: usize) -> Option<u64> {
        match percentile {
            1 => Some(self.p1),
            5 => Some(self.p5),
            10 => Some(self.p10),
            25 => Some(self.p25),
            50 => Some(self.p50),
            75 => Some(self.p75),
            90 => Some(self.p90),
            95 => Some(self.p95),
            99 => Some(self.p99),
            100 => Some(self.p100),
            _ => None,
        }
    }
}

fn nearest_rank(sorted: &[u64], percentile: usize) -> u64 {
    let rank = percentile.saturating_mul(sorted.len()).div_ceil(100).max(1);
    sorted.get(rank - 1).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Untracked;
    use rstest::rstest;
    use std::sync::Arc;

    #[test]
    fn empty_input_summarises_to_zeros() {
        assert_eq!(SetSizeSummary::from_sizes(Vec::new()), SetSizeSummary::default());
        assert_eq!(SetSizeSummary::from_sizes(vec![0, 0]), SetSizeSummary::default());
    }

    #[rstest]
    #[case::smallest(1, 1)]
    #[case::quarter(25, 25)]
    #[case::median(50, 50)]
    #[case::tail(99, 99)]
    #[case::largest(100, 100)]
    fn hundred_sizes_rank_exactly(#[case] percentile: usize, #[case] expected: u64) {
        let summary = SetSizeSummary::from_sizes((1..=100).rev().collect());
        assert_eq!(summary.community_count, 100);
        assert_eq!(summary.percentile(percentile), Some(expected));
    }

    #[test]
    fn single_set_fills_every_percentile() {
        let summary = SetSizeSummary::from_sizes(vec![7]);
        for percentile in SET_SIZE_PERCENTILES {
            assert_eq!(summary.percentile(percentile), Some(7));
        }
        assert_eq!(summary.percentile(42), None);
    }

    #[test]
    fn skewed_sizes_keep_the_giant_in_the_tail() {
        let mut sizes = vec![1; 9];
        sizes.push(91);
        let summary = SetSizeSummary::from_sizes(sizes);
        assert_eq!(summary.community_count, 10);
        assert_eq!(summary.p90, 1);
        assert_eq!(summary.p95, 91);
        assert_eq!(summary.p100, 91);
    }

    #[test]
    fn paged_counts_match_plain_counts() {
        let mut counts = PagedArray::new(6, Arc::new(Untracked)).expect("allocation");
        for (index, size) in [(0, 3), (4, 2), (5, 1)] {
            counts.set(index, size).expect("in range");
        }
        assert_eq!(
            SetSizeSummary::from_set_sizes(&counts).expect("live"),
            SetSizeSummary::from_sizes(vec![3, 2, 1])
        );
    }
}
