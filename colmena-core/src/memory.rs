//! Allocation tracking and byte formatting.
//!
//! Every paged structure registers its footprint with an [`AllocationTracker`]
//! before it allocates and deregisters exactly that amount when it is
//! released. A [`MemoryBudget`] refuses registrations that would exceed its
//! limit, which lets algorithm factories reject oversized work before any page
//! is committed.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::{debug, warn};

use crate::error::{PagedError, Result};

// ---------------------------------------------------------------------------
// Task identifiers
// ---------------------------------------------------------------------------

/// Identifier of the worker task on whose behalf memory is tracked.
///
/// # Examples
/// ```
/// use colmena_core::TaskId;
///
/// assert_eq!(TaskId::new(3).get(), 3);
/// assert_eq!(TaskId::UNASSIGNED.get(), 0);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Task id used by allocations made outside any worker.
    pub const UNASSIGNED: Self = Self(0);

    /// Creates a task identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// Returns the numeric identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tracker contract
// ---------------------------------------------------------------------------

/// Counter that paged structures register their memory against.
///
/// Implementations are shared between worker threads, so every method takes
/// `&self` and must update its counters atomically.
pub trait AllocationTracker: fmt::Debug + Send + Sync {
    /// Registers `bytes` for `owner` running as `task`.
    ///
    /// # Errors
    /// Returns [`PagedError::AllocationRefused`] when the request does not fit
    /// into the remaining budget. Nothing is registered in that case.
    fn track(&self, owner: &str, task: TaskId, bytes: u64) -> Result<()>;

    /// Deregisters `bytes` previously registered with [`Self::track`].
    fn release(&self, bytes: u64);

    /// Returns the number of bytes currently registered.
    fn tracked(&self) -> u64;

    /// Returns how many more bytes the tracker would accept.
    fn available_memory(&self) -> u64;

    /// Renders the current usage for log lines.
    fn usage_summary(&self) -> String {
        format!(
            "{} tracked, {} available",
            format_bytes(self.tracked()),
            format_bytes(self.available_memory())
        )
    }
}

/// Tracker that accepts every request and records nothing.
///
/// Useful for tests and for callers that enforce memory limits elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct Untracked;

impl AllocationTracker for Untracked {
    fn track(&self, _owner: &str, _task: TaskId, _bytes: u64) -> Result<()> {
        Ok(())
    }

    fn release(&self, _bytes: u64) {}

    fn tracked(&self) -> u64 {
        0
    }

    fn available_memory(&self) -> u64 {
        u64::MAX
    }

    fn usage_summary(&self) -> String {
        "untracked".to_owned()
    }
}

/// Budget-enforcing tracker backed by an atomic running total.
///
/// The limit is fixed at construction. Registrations use a compare-and-swap
/// loop so concurrent workers never observe or produce a total above the
/// limit.
///
/// # Examples
/// ```
/// use colmena_core::{AllocationTracker, MemoryBudget, TaskId};
///
/// let budget = MemoryBudget::new(1024);
/// budget.track("scratch", TaskId::UNASSIGNED, 1000)?;
/// assert_eq!(budget.available_memory(), 24);
/// assert!(budget.track("scratch", TaskId::UNASSIGNED, 100).is_err());
/// budget.release(1000);
/// assert_eq!(budget.tracked(), 0);
/// # Ok::<(), colmena_core::PagedError>(())
/// ```
#[derive(Debug)]
pub struct MemoryBudget {
    limit: u64,
    tracked: AtomicU64,
}

impl MemoryBudget {
    /// Creates a tracker that refuses to register more than `limit` bytes.
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self {
            limit,
            tracked: AtomicU64::new(0),
        }
    }

    /// Creates a tracker that counts allocations without limiting them.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(u64::MAX)
    }

    /// Returns the configured limit in bytes.
    #[rustfmt::skip]
    #[must_use]
    pub const fn limit(&self) -> u64 { self.limit }
}

impl AllocationTracker for MemoryBudget {
    fn track(&self, owner: &str, task: TaskId, bytes: u64) -> Result<()> {
        let limit = self.limit;
        match self
            .tracked
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(bytes).filter(|total| *total <= limit)
            }) {
            Ok(previous) => {
                debug!(owner, %task, bytes, tracked = previous.saturating_add(bytes), "memory tracked");
                Ok(())
            }
            Err(current) => {
                let available = limit.saturating_sub(current);
                warn!(
                    owner,
                    %task,
                    requested = bytes,
                    available,
                    "allocation refused by memory budget"
                );
                Err(PagedError::AllocationRefused {
                    owner: owner.to_owned(),
                    requested: bytes,
                    available,
                })
            }
        }
    }

    fn release(&self, bytes: u64) {
        let previous = self
            .tracked
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(bytes))
            })
            .unwrap_or_else(|current| current);
        if bytes > previous {
            warn!(
                released = bytes,
                tracked = previous,
                "released more memory than was tracked"
            );
        }
    }

    fn tracked(&self) -> u64 {
        self.tracked.load(Ordering::Acquire)
    }

    fn available_memory(&self) -> u64 {
        self.limit.saturating_sub(self.tracked())
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

const UNITS: [(u64, &str); 4] = [
    (1 << 40, "TiB"),
    (1 << 30, "GiB"),
    (1 << 20, "MiB"),
    (1 << 10, "KiB"),
];

/// Formats a byte count using binary units and one truncated decimal place.
///
/// # Examples
/// ```
/// use colmena_core::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1536), "1.5 KiB");
/// assert_eq!(format_bytes(1_073_741_824), "1.0 GiB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    for (unit, suffix) in UNITS {
        if bytes >= unit {
            let whole = bytes / unit;
            let tenths = (bytes % unit).saturating_mul(10) / unit;
            return format!("{whole}.{tenths} {suffix}");
        }
    }
    format!("{bytes} B")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::suite_proptest_config;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::{sync::Arc, thread};

    #[rstest]
    #[case::zero(0, "0 B")]
    #[case::small(512, "512 B")]
    #[case::just_below_kib(1023, "1023 B")]
    #[case::one_kib(1024, "1.0 KiB")]
    #[case::one_and_half_kib(1536, "1.5 KiB")]
    #[case::one_mib(1_048_576, "1.0 MiB")]
    #[case::one_gib(1_073_741_824, "1.0 GiB")]
    #[case::one_tib(1_099_511_627_776, "1.0 TiB")]
    #[case::two_point_four_gib(2_576_980_378, "2.4 GiB")]
    fn format_bytes_produces_expected_output(#[case] input: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(input), expected);
    }

    #[test]
    fn budget_refuses_requests_beyond_limit() {
        let budget = MemoryBudget::new(100);
        budget
            .track("parent", TaskId::UNASSIGNED, 60)
            .expect("first request fits");
        let err = budget
            .track("depth", TaskId::new(1), 60)
            .expect_err("second request must not fit");
        assert_eq!(
            err,
            PagedError::AllocationRefused {
                owner: "depth".into(),
                requested: 60,
                available: 40,
            }
        );
        assert_eq!(budget.tracked(), 60, "refusals must not register memory");
    }

    #[test]
    fn budget_accepts_exact_fit() {
        let budget = MemoryBudget::new(64);
        budget
            .track("page", TaskId::UNASSIGNED, 64)
            .expect("exact fit is accepted");
        assert_eq!(budget.available_memory(), 0);
    }

    #[test]
    fn unbounded_budget_still_counts() {
        let budget = MemoryBudget::unbounded();
        budget
            .track("page", TaskId::UNASSIGNED, u64::MAX - 1)
            .expect("unbounded accepts large requests");
        assert_eq!(budget.tracked(), u64::MAX - 1);
        assert!(budget.track("page", TaskId::UNASSIGNED, 2).is_err());
    }

    #[test]
    fn over_release_clamps_and_warns() {
        use colmena_test_support::tracing::RecordingLayer;
        use tracing::Level;
        use tracing_subscriber::layer::SubscriberExt;

        let layer = RecordingLayer::default();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        let budget = MemoryBudget::new(10);
        tracing::subscriber::with_default(subscriber, || {
            budget.track("scratch", TaskId::UNASSIGNED, 3).expect("fits");
            budget.release(3);
            budget.release(5);
        });
        assert_eq!(budget.tracked(), 0);

        let warnings: Vec<_> = layer
            .events()
            .into_iter()
            .filter(|event| event.level == Level::WARN)
            .collect();
        assert_eq!(warnings.len(), 1, "only the unmatched release warns");
        assert_eq!(warnings[0].fields["released"], "5");
        assert_eq!(warnings[0].fields["tracked"], "0");
    }

    #[test]
    fn untracked_accepts_everything() {
        let tracker = Untracked;
        tracker
            .track("anything", TaskId::UNASSIGNED, u64::MAX)
            .expect("untracked never refuses");
        assert_eq!(tracker.tracked(), 0);
        assert_eq!(tracker.usage_summary(), "untracked");
    }

    #[test]
    fn usage_summary_reports_both_sides() {
        let budget = MemoryBudget::new(2048);
        budget
            .track("page", TaskId::UNASSIGNED, 1024)
            .expect("fits");
        assert_eq!(budget.usage_summary(), "1.0 KiB tracked, 1.0 KiB available");
    }

    #[test]
    fn concurrent_tracking_never_exceeds_limit() {
        let budget = Arc::new(MemoryBudget::new(1_000));
        let handles: Vec<_> = (0..8)
            .map(|task| {
                let budget = Arc::clone(&budget);
                thread::spawn(move || {
                    (0..100)
                        .filter(|_| budget.track("worker", TaskId::new(task), 3).is_ok())
                        .count()
                })
            })
            .collect();
        let accepted: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("worker must not panic"))
            .sum();
        assert_eq!(accepted, 333);
        assert_eq!(budget.tracked(), 999);
    }

    proptest! {
        #![proptest_config(suite_proptest_config(256))]

        #[test]
        fn matching_release_restores_tracked_total(
            baseline in 0_u64..1_000,
            requests in proptest::collection::vec(0_u64..10_000, 0..32),
        ) {
            let budget = MemoryBudget::unbounded();
            budget.track("baseline", TaskId::UNASSIGNED, baseline).map_err(|e| TestCaseError::fail(e.to_string()))?;
            for bytes in &requests {
                budget.track("request", TaskId::UNASSIGNED, *bytes).map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
            for bytes in requests.iter().rev() {
                budget.release(*bytes);
            }
            prop_assert_eq!(budget.tracked(), baseline);
        }
    }
}
