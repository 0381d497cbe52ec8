//! Contiguous index-range partitioning for parallel workers.

use std::num::{NonZeroU64, NonZeroUsize};

/// Half-open range `[start, start + len)` of node indices owned by one worker.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Partition {
    start: u64,
    len: u64,
}

impl Partition {
    /// Creates a partition.
    #[must_use]
    pub const fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// Returns the first index.
    #[rustfmt::skip]
    #[must_use]
    pub const fn start(&self) -> u64 { self.start }

    /// Returns the number of indices.
    #[rustfmt::skip]
    #[must_use]
    pub const fn len(&self) -> u64 { self.len }

    /// Returns `true` for an empty partition.
    #[rustfmt::skip]
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.len == 0 }

    /// Returns the exclusive end index.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.len
    }

    /// Iterates the indices of the partition.
    pub fn indices(&self) -> std::ops::Range<u64> {
        self.start..self.end()
    }
}

/// Splits `[0, node_count)` into contiguous partitions.
///
/// Each partition holds `max(min_batch_size, ceil(node_count / concurrency))`
/// indices except the last, which takes the remainder. An empty range yields
/// no partitions.
///
/// # Examples
/// ```
/// use std::num::{NonZeroU64, NonZeroUsize};
/// use colmena_core::range_partitions;
///
/// let four = NonZeroUsize::new(4).expect("non-zero");
/// let batch = NonZeroU64::new(10).expect("non-zero");
/// let parts = range_partitions(four, 25, batch);
/// let lens: Vec<_> = parts.iter().map(|p| p.len()).collect();
/// assert_eq!(lens, vec![10, 10, 5]);
/// ```
#[must_use]
pub fn range_partitions(
    concurrency: NonZeroUsize,
    node_count: u64,
    min_batch_size: NonZeroU64,
) -> Vec<Partition> {
    let batch = node_count
        .div_ceil(concurrency.get() as u64)
        .max(min_batch_size.get());
    let mut partitions = Vec::with_capacity(usize::try_from(node_count.div_ceil(batch)).unwrap_or(0));
    let mut start = 0;
    while start < node_count {
        let len = batch.min(node_count - start);
        partitions.push(Partition::new(start, len));
        start += len;
    }
    partitions
}
