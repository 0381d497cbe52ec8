//! Disjoint-set (union-find) structure over paged storage.
//!
//! The structure keeps two paged arrays: `parent` maps an index to its parent
//! or to the root sentinel, and `depth` holds the union-by-rank weight of each
//! root. Following parents from any index always ends at a root; `find`
//! shortens those chains as it goes.
//!
//! A seeded structure carries a third array naming the set id reported for
//! each root. Seeds group indices before any union runs and keep caller ids
//! stable across incremental runs.
//!
//! Instances are not safe to mutate from several threads at once because path
//! compression writes on read. Parallel callers give every worker a private
//! instance over the same capacity and fold them together with
//! [`DisjointSetStruct::merge`].

use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    fmt,
    sync::Arc,
};

use tracing::{debug, info, instrument};

use crate::{
    error::{PagedError, Result},
    memory::{AllocationTracker, TaskId},
    paged_array::PagedArray,
    paging::{PAGE_SIZE, number_of_pages, page_start},
    statistics::SetSizeSummary,
    termination::{Completion, RunningForever, TerminationFlag},
};

/// Parent value marking an index as the root of its own set.
pub(crate) const ROOT: u64 = u64::MAX;

const STRUCTURE: &str = "disjoint-set structure";

/// Seed value marking an index that starts without a caller-supplied set id.
pub const UNSEEDED: u64 = u64::MAX;

/// Union-find over `capacity` elements with path compression and union by
/// rank.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use colmena_core::{DisjointSetStruct, Untracked};
///
/// let mut dss = DisjointSetStruct::new(5, Arc::new(Untracked))?;
/// dss.union(0, 1)?;
/// dss.union(1, 2)?;
/// dss.union(3, 4)?;
/// assert!(dss.connected(0, 2)?);
/// assert!(!dss.connected(0, 3)?);
/// assert_eq!(dss.set_count()?, 2);
/// # Ok::<(), colmena_core::PagedError>(())
/// ```
pub struct DisjointSetStruct {
    parent: PagedArray<u64>,
    depth: PagedArray<u64>,
    set_ids: Option<PagedArray<u64>>,
}

impl DisjointSetStruct {
    /// Creates a structure in which every index is a singleton set.
    ///
    /// # Errors
    /// Returns [`PagedError::AllocationRefused`] when the tracker refuses
    /// either backing array. Memory registered for the first array is handed
    /// back before the error is returned.
    pub fn new(capacity: u64, tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        Self::new_for_task(capacity, tracker, TaskId::UNASSIGNED)
    }

    /// Creates a structure whose memory is tracked on behalf of `task`.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::new`].
    pub fn new_for_task(
        capacity: u64,
        tracker: Arc<dyn AllocationTracker>,
        task: TaskId,
    ) -> Result<Self> {
        let parent = PagedArray::allocate(capacity, ROOT, Arc::clone(&tracker), task)?;
        let depth = PagedArray::allocate(capacity, 0, tracker, task)?;
        Ok(Self {
            parent,
            depth,
            set_ids: None,
        })
    }

    /// Creates a structure whose indices start grouped by `seeds`.
    ///
    /// Indices sharing a seed value begin in one set that reports the seed
    /// as its id. An index seeded with [`UNSEEDED`] starts alone and reports
    /// `max_seed + 1 + index`, so fresh ids never collide with caller ids.
    /// After a union the surviving root's id wins.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use colmena_core::{DisjointSetStruct, PagedArray, UNSEEDED, Untracked};
    ///
    /// let mut seeds = PagedArray::with_fill(4, UNSEEDED, Arc::new(Untracked))?;
    /// seeds.set(0, 42)?;
    /// seeds.set(2, 42)?;
    /// let mut dss = DisjointSetStruct::with_seeds(4, &seeds, Arc::new(Untracked))?;
    /// assert!(dss.connected(0, 2)?);
    /// assert_eq!(dss.set_id_of(2)?, 42);
    /// assert_eq!(dss.set_id_of(3)?, 46);
    /// # Ok::<(), colmena_core::PagedError>(())
    /// ```
    ///
    /// # Errors
    /// Returns [`PagedError::CapacityMismatch`] when `seeds` does not cover
    /// exactly `capacity` elements, [`PagedError::InvalidConfiguration`] when
    /// fresh ids would overflow `u64`, and the errors of [`Self::new`].
    #[instrument(
        name = "colmena.seed",
        level = "debug",
        err,
        skip(seeds, tracker),
    )]
    pub fn with_seeds(
        capacity: u64,
        seeds: &PagedArray<u64>,
        tracker: Arc<dyn AllocationTracker>,
    ) -> Result<Self> {
        if seeds.capacity() != capacity {
            return Err(PagedError::CapacityMismatch {
                left: capacity,
                right: seeds.capacity(),
            });
        }
        let mut dss = Self::new(capacity, Arc::clone(&tracker))?;
        let mut set_ids =
            PagedArray::allocate(capacity, UNSEEDED, tracker, TaskId::UNASSIGNED)?;

        let mut max_seed = None;
        let mut scan = seeds.cursor()?;
        while scan.next() {
            for &seed in scan.slice().iter().filter(|&&seed| seed != UNSEEDED) {
                max_seed = max_seed.max(Some(seed));
            }
        }
        // `UNSEEDED` is excluded above, so the increment cannot overflow.
        let fresh = max_seed.map_or(0, |seed| seed + 1);

        let mut holders = HashMap::new();
        let mut cursor = seeds.cursor()?;
        while cursor.next() {
            let first = cursor.base() + cursor.offset() as u64;
            for (index, &seed) in (first..).zip(cursor.slice()) {
                if seed == UNSEEDED {
                    let id = fresh.checked_add(index).ok_or_else(|| {
                        PagedError::InvalidConfiguration {
                            field: "seeds",
                            reason: format!("seed {fresh} leaves no room for fresh set ids"),
                        }
                    })?;
                    set_ids.set(index, id)?;
                    continue;
                }
                match holders.entry(seed) {
                    Entry::Occupied(holder) => {
                        dss.union(*holder.get(), index)?;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(index);
                        set_ids.set(index, seed)?;
                    }
                }
            }
        }
        debug!(seeded_sets = holders.len(), fresh, "seeds applied");
        dss.set_ids = Some(set_ids);
        Ok(dss)
    }

    /// Returns the bytes [`Self::new`] registers for `capacity` elements.
    #[must_use]
    pub fn memory_requirements(capacity: u64) -> u64 {
        PagedArray::<u64>::memory_requirements(capacity).saturating_mul(2)
    }

    /// Returns the bytes [`Self::with_seeds`] registers for `capacity`
    /// elements.
    #[must_use]
    pub fn memory_requirements_with_seeds(capacity: u64) -> u64 {
        PagedArray::<u64>::memory_requirements(capacity).saturating_mul(3)
    }

    /// Returns `true` when the structure was built by [`Self::with_seeds`].
    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        self.set_ids.is_some()
    }

    /// Returns the number of elements.
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.parent.capacity()
    }

    /// Returns `true` once [`Self::release`] has been called.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.parent.is_released()
    }

    /// Returns the bytes currently held by both backing arrays.
    #[must_use]
    pub const fn size_of(&self) -> u64 {
        let set_ids = match &self.set_ids {
            Some(set_ids) => set_ids.size_of(),
            None => 0,
        };
        self.parent.size_of() + self.depth.size_of() + set_ids
    }

    /// Returns the root of the set containing `p`, compressing the path.
    ///
    /// # Errors
    /// Returns [`PagedError::IndexOutOfBounds`] for indices outside the
    /// capacity and [`PagedError::Released`] after release.
    pub fn find(&mut self, p: u64) -> Result<u64> {
        let root = self.find_no_opt(p)?;
        let mut node = p;
        loop {
            let parent = self.parent.get(node)?;
            if parent == ROOT || parent == root {
                return Ok(root);
            }
            self.parent.set(node, root)?;
            node = parent;
        }
    }

    /// Returns the root of the set containing `p` without modifying the tree.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::find`].
    pub fn find_no_opt(&self, p: u64) -> Result<u64> {
        self.ensure_live()?;
        let mut node = p;
        loop {
            let parent = self.parent.get(node)?;
            if parent == ROOT {
                return Ok(node);
            }
            node = parent;
        }
    }

    /// Returns the set id of `p`.
    ///
    /// Unseeded structures report the index of the set's root; seeded ones
    /// report the id recorded for that root.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::find`].
    pub fn set_id_of(&mut self, p: u64) -> Result<u64> {
        let root = self.find(p)?;
        self.root_set_id(root)
    }

    /// Returns the set id of `p` without modifying the tree.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::find`].
    pub fn set_id_no_opt(&self, p: u64) -> Result<u64> {
        self.root_set_id(self.find_no_opt(p)?)
    }

    /// Returns `true` when `p` and `q` belong to the same set.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::find`].
    pub fn connected(&mut self, p: u64, q: u64) -> Result<bool> {
        Ok(self.find(p)? == self.find(q)?)
    }

    /// Joins the sets containing `p` and `q`.
    ///
    /// The shallower root is attached under the deeper one. On a tie the root
    /// of `q` is attached under the root of `p`, whose depth grows by the
    /// absorbed depth plus one. Returns `false` when both were already in the
    /// same set.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::find`].
    pub fn union(&mut self, p: u64, q: u64) -> Result<bool> {
        let p_root = self.find(p)?;
        let q_root = self.find(q)?;
        if p_root == q_root {
            return Ok(false);
        }

        let p_depth = self.depth.get(p_root)?;
        let q_depth = self.depth.get(q_root)?;
        if p_depth < q_depth {
            self.parent.set(p_root, q_root)?;
        } else if p_depth > q_depth {
            self.parent.set(q_root, p_root)?;
        } else {
            self.parent.set(q_root, p_root)?;
            self.depth.add_to(p_root, q_depth + 1)?;
        }
        Ok(true)
    }

    /// Folds every union recorded in `other` into `self`.
    ///
    /// Set ids recorded by a seeded `self` are kept; those of `other` are
    /// ignored.
    ///
    /// # Errors
    /// Returns [`PagedError::CapacityMismatch`] when the capacities differ and
    /// [`PagedError::Released`] when either structure has been released.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        self.merge_with(other, &RunningForever).map(drop)
    }

    /// Folds `other` into `self`, polling `flag` before every page.
    ///
    /// `other` is scanned once with a cursor; every non-root index `i` is
    /// joined with the root `other` assigns it. A terminated merge leaves
    /// `self` valid but holding only part of `other`'s unions.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::merge`].
    #[instrument(
        name = "colmena.merge",
        level = "debug",
        err,
        skip_all,
        fields(capacity = self.capacity()),
    )]
    pub fn merge_with(
        &mut self,
        other: &Self,
        flag: &dyn TerminationFlag,
    ) -> Result<Completion<()>> {
        if other.capacity() != self.capacity() {
            return Err(PagedError::CapacityMismatch {
                left: self.capacity(),
                right: other.capacity(),
            });
        }
        self.ensure_live()?;
        other.ensure_live()?;

        let mut cursor = other.parent.cursor()?;
        let mut visited = 0_u64;
        while cursor.next() {
            if !flag.running() {
                info!(visited, "merge terminated");
                return Ok(Completion::Terminated { visited });
            }
            let first = cursor.base() + cursor.offset() as u64;
            for (index, &parent) in (first..).zip(cursor.slice()) {
                if parent != ROOT {
                    let root = other.find_no_opt(parent)?;
                    self.union(index, root)?;
                }
            }
            visited += cursor.slice().len() as u64;
        }
        Ok(Completion::Completed(()))
    }

    /// Counts the distinct sets across the whole capacity.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release.
    pub fn set_count(&mut self) -> Result<u64> {
        // `RunningForever` never trips, so the scan always completes.
        self.set_count_with(&RunningForever)
            .map(|outcome| outcome.completed().unwrap_or_default())
    }

    /// Counts the distinct sets, polling `flag` before every page.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release.
    #[instrument(
        name = "colmena.set_count",
        level = "debug",
        err,
        skip_all,
        fields(capacity = self.capacity()),
    )]
    pub fn set_count_with(&mut self, flag: &dyn TerminationFlag) -> Result<Completion<u64>> {
        self.ensure_live()?;
        let capacity = self.capacity();
        let mut roots = HashSet::new();
        for page in 0..number_of_pages(capacity) {
            let start = page_start(page);
            if !flag.running() {
                info!(visited = start, "set count terminated");
                return Ok(Completion::Terminated { visited: start });
            }
            let end = capacity.min(start + PAGE_SIZE as u64);
            for index in start..end {
                roots.insert(self.find(index)?);
            }
        }
        Ok(Completion::Completed(roots.len() as u64))
    }

    /// Counts the distinct sets among `nodes` only.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::find`] for any node.
    pub fn set_count_in(&mut self, nodes: impl IntoIterator<Item = u64>) -> Result<u64> {
        let mut roots = HashSet::new();
        for node in nodes {
            roots.insert(self.find(node)?);
        }
        Ok(roots.len() as u64)
    }

    /// Counts the members of every set.
    ///
    /// The returned array holds, at each root index, the size of that root's
    /// set and zero everywhere else. It is tracked by the same tracker as the
    /// structure.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release and the allocation
    /// errors of [`PagedArray::new`].
    pub fn set_sizes(&self) -> Result<PagedArray<u64>> {
        self.ensure_live()?;
        let mut sizes = PagedArray::new(self.capacity(), self.parent.tracker())?;
        let mut cursor = self.parent.cursor()?;
        while cursor.next() {
            let first = cursor.base() + cursor.offset() as u64;
            for (index, &parent) in (first..).zip(cursor.slice()) {
                let root = if parent == ROOT {
                    index
                } else {
                    self.find_no_opt(parent)?
                };
                sizes.add_to(root, 1)?;
            }
        }
        Ok(sizes)
    }

    /// Summarises the distribution of set sizes.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::set_sizes`].
    #[instrument(
        name = "colmena.set_sizes",
        level = "debug",
        err,
        skip_all,
        fields(capacity = self.capacity()),
    )]
    pub fn set_size_summary(&self) -> Result<SetSizeSummary> {
        let sizes = self.set_sizes()?;
        let summary = SetSizeSummary::from_set_sizes(&sizes)?;
        debug!(
            community_count = summary.community_count,
            largest = summary.p100,
            "set sizes summarised"
        );
        Ok(summary)
    }

    /// Releases every backing array and returns the bytes freed.
    ///
    /// A second call returns zero.
    pub fn release(&mut self) -> u64 {
        let set_ids = self.set_ids.as_mut().map_or(0, PagedArray::release);
        self.parent.release() + self.depth.release() + set_ids
    }

    pub(crate) fn root_set_id(&self, root: u64) -> Result<u64> {
        match &self.set_ids {
            Some(set_ids) => set_ids.get(root),
            None => Ok(root),
        }
    }

    pub(crate) const fn parent(&self) -> &PagedArray<u64> {
        &self.parent
    }

    pub(crate) const fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(PagedError::Released {
                structure: STRUCTURE,
            })
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for DisjointSetStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisjointSetStruct")
            .field("capacity", &self.capacity())
            .field("bytes", &self.size_of())
            .field("seeded", &self.is_seeded())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod property;
