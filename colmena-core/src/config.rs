//! Validated configuration for partition-then-merge component runs.

use std::{
    num::{NonZeroU64, NonZeroUsize},
    sync::Arc,
    thread,
};

use crate::{
    error::{PagedError, Result},
    memory::{AllocationTracker, MemoryBudget},
    partition::{Partition, range_partitions},
};

/// Default lower bound on the number of indices handed to one worker.
pub const DEFAULT_MIN_BATCH_SIZE: u64 = 10_000;

/// Collects and validates [`ComponentsConfig`] settings.
///
/// # Examples
/// ```
/// use colmena_core::ComponentsBuilder;
///
/// let config = ComponentsBuilder::new()
///     .with_concurrency(4)
///     .with_min_batch_size(1_000)
///     .with_memory_budget(64 << 20)
///     .build()
///     .expect("configuration is valid");
/// assert_eq!(config.concurrency().get(), 4);
/// assert_eq!(config.memory_budget(), Some(64 << 20));
/// assert!(ComponentsBuilder::new().with_concurrency(0).build().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct ComponentsBuilder {
    concurrency: Option<usize>,
    min_batch_size: u64,
    memory_budget: Option<u64>,
}

impl Default for ComponentsBuilder {
    fn default() -> Self {
        Self {
            concurrency: None,
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            memory_budget: None,
        }
    }
}

impl ComponentsBuilder {
    /// Creates a builder populated with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the number of worker threads. Defaults to the available
    /// parallelism of the host.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Overrides the smallest partition handed to a worker.
    #[must_use]
    pub fn with_min_batch_size(mut self, min_batch_size: u64) -> Self {
        self.min_batch_size = min_batch_size;
        self
    }

    /// Caps the bytes the run may register with its tracker.
    #[must_use]
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns [`PagedError::InvalidConfiguration`] for a zero concurrency or
    /// a zero batch size.
    pub fn build(self) -> Result<ComponentsConfig> {
        let concurrency = match self.concurrency {
            Some(requested) => {
                NonZeroUsize::new(requested).ok_or_else(|| PagedError::InvalidConfiguration {
                    field: "concurrency",
                    reason: "must be at least 1".to_owned(),
                })?
            }
            None => thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        };
        let min_batch_size =
            NonZeroU64::new(self.min_batch_size).ok_or_else(|| PagedError::InvalidConfiguration {
                field: "min_batch_size",
                reason: "must be at least 1".to_owned(),
            })?;
        Ok(ComponentsConfig {
            concurrency,
            min_batch_size,
            memory_budget: self.memory_budget,
        })
    }
}

/// Settings for one partition-then-merge run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ComponentsConfig {
    concurrency: NonZeroUsize,
    min_batch_size: NonZeroU64,
    memory_budget: Option<u64>,
}

impl ComponentsConfig {
    /// Returns the number of worker threads.
    #[rustfmt::skip]
    #[must_use]
    pub const fn concurrency(&self) -> NonZeroUsize { self.concurrency }

    /// Returns the smallest partition handed to a worker.
    #[rustfmt::skip]
    #[must_use]
    pub const fn min_batch_size(&self) -> NonZeroU64 { self.min_batch_size }

    /// Returns the byte cap, if one was configured.
    #[rustfmt::skip]
    #[must_use]
    pub const fn memory_budget(&self) -> Option<u64> { self.memory_budget }

    /// Creates the tracker for a run: a [`MemoryBudget`] capped at the
    /// configured budget, or an unbounded one that still counts bytes.
    #[must_use]
    pub fn tracker(&self) -> Arc<dyn AllocationTracker> {
        match self.memory_budget {
            Some(limit) => Arc::new(MemoryBudget::new(limit)),
            None => Arc::new(MemoryBudget::unbounded()),
        }
    }

    /// Splits `[0, node_count)` according to the configured concurrency and
    /// batch size.
    #[must_use]
    pub fn partitions(&self, node_count: u64) -> Vec<Partition> {
        range_partitions(self.concurrency, node_count, self.min_batch_size)
    }
}

#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
impl ComponentsConfig {
    /// Builds a dedicated rayon pool with the configured thread count.
    ///
    /// # Errors
    /// Returns [`PagedError::InvalidConfiguration`] when the pool cannot be
    /// created.
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency.get())
            .build()
            .map_err(|err| PagedError::InvalidConfiguration {
                field: "concurrency",
                reason: err.to_string(),
            })
    }

    /// Runs [`crate::parallel_union`] over `[0, node_count)` inside a pool
    /// sized by this configuration.
    ///
    /// # Errors
    /// Fails when the pool cannot be built or the run itself fails.
    pub fn run<W>(
        &self,
        capacity: u64,
        node_count: u64,
        tracker: &Arc<dyn AllocationTracker>,
        flag: &dyn crate::TerminationFlag,
        worker: W,
    ) -> Result<crate::Completion<crate::DisjointSetStruct>>
    where
        W: Fn(Partition, &mut crate::DisjointSetStruct) -> Result<()> + Send + Sync,
    {
        let pool = self.thread_pool()?;
        let partitions = self.partitions(node_count);
        pool.install(|| crate::parallel_union(capacity, &partitions, tracker, flag, worker))
    }
}
