//! Partition-then-merge union-find on the rayon pool.
//!
//! Every partition gets a private [`DisjointSetStruct`] over the full
//! capacity, so workers never share mutable state. The private structures are
//! then folded into the first one with sequential merges on the calling
//! thread.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::{
    dss::DisjointSetStruct,
    error::{PagedError, Result},
    memory::{AllocationTracker, TaskId},
    partition::Partition,
    termination::{Completion, TerminationFlag},
};

/// Runs `worker` once per partition on a private structure and merges the
/// results.
///
/// The combined footprint of all private structures is checked against
/// `tracker.available_memory()` before anything is allocated. `flag` is
/// polled before each worker starts and between the pages of every merge; a
/// terminated run releases all partial structures and reports how many
/// partition indices had been folded in.
///
/// # Errors
/// Returns [`PagedError::AllocationRefused`] when the private structures do
/// not fit the budget, and propagates the first error returned by a worker.
///
/// # Examples
/// ```
/// use std::{num::{NonZeroU64, NonZeroUsize}, sync::Arc};
/// use colmena_core::{
///     AllocationTracker, MemoryBudget, RunningForever, parallel_union, range_partitions,
/// };
///
/// let edges = [(0_u64, 1_u64), (2, 3), (1, 2), (6, 7)];
/// let tracker: Arc<dyn AllocationTracker> = Arc::new(MemoryBudget::new(1 << 20));
/// let parts = range_partitions(
///     NonZeroUsize::new(2).expect("non-zero"),
///     edges.len() as u64,
///     NonZeroU64::new(1).expect("non-zero"),
/// );
/// let outcome = parallel_union(8, &parts, &tracker, &RunningForever, |part, dss| {
///     for (p, q) in &edges[part.start() as usize..part.end() as usize] {
///         dss.union(*p, *q)?;
///     }
///     Ok(())
/// })?;
/// let mut dss = outcome.completed().expect("never terminated");
/// assert!(dss.connected(0, 3)?);
/// assert_eq!(dss.set_count()?, 4);
/// # Ok::<(), colmena_core::PagedError>(())
/// ```
#[instrument(
    name = "colmena.parallel_union",
    err,
    skip_all,
    fields(capacity = capacity, partitions = partitions.len()),
)]
pub fn parallel_union<W>(
    capacity: u64,
    partitions: &[Partition],
    tracker: &Arc<dyn AllocationTracker>,
    flag: &dyn TerminationFlag,
    worker: W,
) -> Result<Completion<DisjointSetStruct>>
where
    W: Fn(Partition, &mut DisjointSetStruct) -> Result<()> + Sync,
{
    let tasks = partitions.len().max(1) as u64;
    let requested = DisjointSetStruct::memory_requirements(capacity).saturating_mul(tasks);
    let available = tracker.available_memory();
    if requested > available {
        warn!(requested, available, "parallel union exceeds memory budget");
        return Err(PagedError::AllocationRefused {
            owner: format!("parallel union ({tasks} tasks)"),
            requested,
            available,
        });
    }

    info!(
        tasks,
        usage = %tracker.usage_summary(),
        "starting partition-then-merge union"
    );

    let partials = partitions
        .par_iter()
        .enumerate()
        .map(|(task, partition)| {
            let task = TaskId::new(task as u64 + 1);
            let mut dss = DisjointSetStruct::new_for_task(capacity, Arc::clone(tracker), task)?;
            let ran = flag.running();
            if ran {
                worker(*partition, &mut dss)?;
            }
            Ok((partition.len(), ran, dss))
        })
        .collect::<Result<Vec<_>>>()?;

    if !flag.running() {
        let visited = partials
            .iter()
            .filter(|(_, ran, _)| *ran)
            .map(|(len, _, _)| *len)
            .sum::<u64>();
        info!(visited, "parallel union terminated before merging");
        return Ok(Completion::Terminated { visited });
    }

    let mut partials = partials.into_iter();
    let Some((mut visited, _, mut merged)) = partials.next() else {
        return DisjointSetStruct::new(capacity, Arc::clone(tracker)).map(Completion::Completed);
    };
    for (len, _, mut partial) in partials {
        if let Completion::Terminated { .. } = merged.merge_with(&partial, flag)? {
            info!(visited, "parallel union terminated while merging");
            return Ok(Completion::Terminated { visited });
        }
        partial.release();
        visited += len;
    }

    info!(visited, usage = %tracker.usage_summary(), "partition-then-merge union completed");
    Ok(Completion::Completed(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MemoryBudget, RunningForever, TerminationToken, Untracked, partition::range_partitions,
    };
    use std::num::{NonZeroU64, NonZeroUsize};

    fn chain_worker(partition: Partition, dss: &mut DisjointSetStruct) -> Result<()> {
        for index in partition.indices() {
            if index + 1 < dss.capacity() && index % 10 != 9 {
                dss.union(index, index + 1)?;
            }
        }
        Ok(())
    }

    fn parts(concurrency: usize, nodes: u64) -> Vec<Partition> {
        range_partitions(
            NonZeroUsize::new(concurrency).expect("non-zero"),
            nodes,
            NonZeroU64::new(1).expect("non-zero"),
        )
    }

    #[test]
    fn parallel_matches_sequential() {
        let tracker: Arc<dyn AllocationTracker> = Arc::new(Untracked);
        let partitions = parts(4, 100);
        let mut parallel = parallel_union(100, &partitions, &tracker, &RunningForever, chain_worker)
            .expect("run succeeds")
            .completed()
            .expect("not terminated");

        let mut sequential = DisjointSetStruct::new(100, Arc::clone(&tracker)).expect("allocation");
        chain_worker(Partition::new(0, 100), &mut sequential).expect("in range");

        assert_eq!(parallel.set_count().expect("live"), 10);
        for index in 0..100 {
            assert_eq!(
                parallel.connected(index, index / 10 * 10).expect("live"),
                sequential.connected(index, index / 10 * 10).expect("live"),
            );
        }
    }

    #[test]
    fn refuses_runs_beyond_budget_before_allocating() {
        let budget = Arc::new(MemoryBudget::new(DisjointSetStruct::memory_requirements(50) * 3));
        let tracker: Arc<dyn AllocationTracker> = budget.clone();
        let err = parallel_union(50, &parts(4, 50), &tracker, &RunningForever, chain_worker)
            .expect_err("four private structures exceed three structures of budget");
        assert!(err.is_budget_error());
        assert_eq!(budget.tracked(), 0);
    }

    #[test]
    fn partial_memory_is_released_after_merge() {
        let budget = Arc::new(MemoryBudget::unbounded());
        let tracker: Arc<dyn AllocationTracker> = budget.clone();
        let merged = parallel_union(64, &parts(4, 64), &tracker, &RunningForever, chain_worker)
            .expect("run succeeds")
            .completed()
            .expect("not terminated");
        assert_eq!(budget.tracked(), DisjointSetStruct::memory_requirements(64));
        drop(merged);
        assert_eq!(budget.tracked(), 0);
    }

    #[test]
    fn worker_errors_propagate() {
        let tracker: Arc<dyn AllocationTracker> = Arc::new(Untracked);
        let err = parallel_union(10, &parts(2, 10), &tracker, &RunningForever, |_, dss| {
            dss.union(0, 10).map(drop)
        })
        .expect_err("index 10 is out of range");
        assert_eq!(err, PagedError::IndexOutOfBounds { index: 10, capacity: 10 });
    }

    #[test]
    fn terminated_run_is_reported() {
        let tracker: Arc<dyn AllocationTracker> = Arc::new(MemoryBudget::unbounded());
        let token = TerminationToken::new();
        token.terminate();
        let outcome = parallel_union(20, &parts(2, 20), &tracker, &token, chain_worker)
            .expect("termination is not an error");
        assert!(!outcome.is_completed());
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn no_partitions_yields_singletons() {
        let tracker: Arc<dyn AllocationTracker> = Arc::new(Untracked);
        let mut dss = parallel_union(3, &[], &tracker, &RunningForever, chain_worker)
            .expect("run succeeds")
            .completed()
            .expect("not terminated");
        assert_eq!(dss.set_count().expect("live"), 3);
    }
}
