//! Streaming set assignments out of a finished disjoint-set structure.
//!
//! Projection never mutates the structure: roots are resolved with
//! [`DisjointSetStruct::find_no_opt`], so readers cannot race with path
//! compression.

use std::collections::{HashMap, hash_map::Entry};

use tracing::info;

use crate::{
    cursor::ArrayCursor,
    dss::{DisjointSetStruct, ROOT},
    error::Result,
    paged_array::PagedArray,
    paging::{PAGE_SIZE, number_of_pages, page_start},
    termination::{Completion, RunningForever, TerminationFlag},
};

/// Translates internal indices back into caller-facing identifiers.
pub trait IdMapping {
    /// Returns the original identifier of `internal`.
    ///
    /// # Errors
    /// Implementations backed by storage report lookup failures such as
    /// out-of-range indices.
    fn original_id(&self, internal: u64) -> Result<u64>;
}

/// Mapping for graphs whose internal indices already are the original ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityMapping;

impl IdMapping for IdentityMapping {
    fn original_id(&self, internal: u64) -> Result<u64> {
        Ok(internal)
    }
}

impl<F> IdMapping for F
where
    F: Fn(u64) -> u64,
{
    fn original_id(&self, internal: u64) -> Result<u64> {
        Ok(self(internal))
    }
}

impl IdMapping for PagedArray<u64> {
    fn original_id(&self, internal: u64) -> Result<u64> {
        self.get(internal)
    }
}

/// One `(original id, set id)` pair emitted by a [`ResultStream`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SetAssignment {
    original_id: u64,
    set_id: u64,
}

impl SetAssignment {
    /// Creates an assignment.
    #[must_use]
    pub const fn new(original_id: u64, set_id: u64) -> Self {
        Self {
            original_id,
            set_id,
        }
    }

    /// Returns the caller-facing identifier of the element.
    #[rustfmt::skip]
    #[must_use]
    pub const fn original_id(&self) -> u64 { self.original_id }

    /// Returns the set the element belongs to.
    #[rustfmt::skip]
    #[must_use]
    pub const fn set_id(&self) -> u64 { self.set_id }
}

/// Dense renumbering of root ids into `0..k` in order of first appearance.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use colmena_core::{ConsecutiveSetIds, DisjointSetStruct, Untracked};
///
/// let mut dss = DisjointSetStruct::new(4, Arc::new(Untracked))?;
/// dss.union(3, 2)?;
/// let ids = ConsecutiveSetIds::new(&dss)?;
/// assert_eq!(ids.len(), 3);
/// assert_eq!(ids.get(dss.find_no_opt(2)?), Some(2));
/// # Ok::<(), colmena_core::PagedError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConsecutiveSetIds {
    dense: HashMap<u64, u64>,
}

impl ConsecutiveSetIds {
    /// Numbers every set of `dss` by the lowest index it contains.
    ///
    /// # Errors
    /// Returns [`crate::PagedError::Released`] when `dss` has been released.
    pub fn new(dss: &DisjointSetStruct) -> Result<Self> {
        // `RunningForever` never trips, so the scan always completes.
        Self::new_with(dss, &RunningForever).map(|outcome| outcome.completed().unwrap_or_default())
    }

    /// Numbers every set of `dss`, polling `flag` before every page.
    ///
    /// # Errors
    /// Returns [`crate::PagedError::Released`] when `dss` has been released.
    pub fn new_with(dss: &DisjointSetStruct, flag: &dyn TerminationFlag) -> Result<Completion<Self>> {
        dss.ensure_live()?;
        let capacity = dss.capacity();
        let mut ids = Self::default();
        for page in 0..number_of_pages(capacity) {
            let start = page_start(page);
            if !flag.running() {
                info!(visited = start, "set numbering terminated");
                return Ok(Completion::Terminated { visited: start });
            }
            for index in start..capacity.min(start + PAGE_SIZE as u64) {
                ids.assign(dss.find_no_opt(index)?);
            }
        }
        Ok(Completion::Completed(ids))
    }

    /// Returns the dense id of `root`, allocating the next one on first use.
    pub fn assign(&mut self, root: u64) -> u64 {
        let next = self.dense.len() as u64;
        match self.dense.entry(root) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(next),
        }
    }

    /// Returns the dense id of `root` if it has been assigned.
    #[must_use]
    pub fn get(&self, root: u64) -> Option<u64> {
        self.dense.get(&root).copied()
    }

    /// Returns the number of distinct sets numbered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` when no set has been numbered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StreamState {
    Active,
    Completed,
    Terminated,
    Failed,
}

/// Lazy, single-pass sequence of set assignments for every index.
///
/// The stream walks the parent array page by page with a cursor and resolves
/// each root on demand, so the first item is available without materialising
/// the result. When a termination flag is attached it is polled before each
/// page; a terminated stream simply ends, and [`ResultStream::completion`]
/// tells the two endings apart.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use colmena_core::{DisjointSetStruct, IdentityMapping, Untracked};
///
/// let mut dss = DisjointSetStruct::new(3, Arc::new(Untracked))?;
/// dss.union(0, 2)?;
/// let pairs: Vec<_> = dss
///     .result_stream(&IdentityMapping)?
///     .consecutive()
///     .map(|item| item.map(|a| (a.original_id(), a.set_id())))
///     .collect::<Result<_, _>>()?;
/// assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 0)]);
/// # Ok::<(), colmena_core::PagedError>(())
/// ```
pub struct ResultStream<'a, M: ?Sized> {
    dss: &'a DisjointSetStruct,
    mapping: &'a M,
    cursor: ArrayCursor<'a, u64>,
    local: usize,
    flag: Option<&'a dyn TerminationFlag>,
    consecutive: Option<ConsecutiveSetIds>,
    visited: u64,
    state: StreamState,
}

impl<'a, M: IdMapping + ?Sized> ResultStream<'a, M> {
    /// Starts a stream over every index of `dss`.
    ///
    /// # Errors
    /// Returns [`crate::PagedError::Released`] when `dss` has been released.
    pub fn new(dss: &'a DisjointSetStruct, mapping: &'a M) -> Result<Self> {
        dss.ensure_live()?;
        Ok(Self {
            dss,
            mapping,
            cursor: dss.parent().cursor()?,
            local: 0,
            flag: None,
            consecutive: None,
            visited: 0,
            state: StreamState::Active,
        })
    }

    /// Polls `flag` before every page.
    #[must_use]
    pub fn with_termination(mut self, flag: &'a dyn TerminationFlag) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Emits dense set ids `0..k` instead of root indices or seed ids.
    #[must_use]
    pub fn consecutive(mut self) -> Self {
        self.consecutive = Some(ConsecutiveSetIds::default());
        self
    }

    /// Reports how the stream ended, or `None` while it is still running or
    /// after it yielded an error.
    #[must_use]
    pub fn completion(&self) -> Option<Completion<()>> {
        match self.state {
            StreamState::Completed => Some(Completion::Completed(())),
            StreamState::Terminated => Some(Completion::Terminated {
                visited: self.visited,
            }),
            StreamState::Active | StreamState::Failed => None,
        }
    }

    fn assignment(&mut self, index: u64, parent: u64) -> Result<SetAssignment> {
        let root = if parent == ROOT {
            index
        } else {
            self.dss.find_no_opt(parent)?
        };
        let set_id = match &mut self.consecutive {
            Some(ids) => ids.assign(root),
            None => self.dss.root_set_id(root)?,
        };
        Ok(SetAssignment::new(self.mapping.original_id(index)?, set_id))
    }
}

impl<M: IdMapping + ?Sized> Iterator for ResultStream<'_, M> {
    type Item = Result<SetAssignment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state != StreamState::Active {
                return None;
            }
            if self.local < self.cursor.limit() {
                let local = self.local;
                let index = self.cursor.base() + local as u64;
                let parent = self.cursor.array().get(local).copied().unwrap_or(ROOT);
                self.local += 1;
                self.visited += 1;
                let item = self.assignment(index, parent);
                if item.is_err() {
                    self.state = StreamState::Failed;
                }
                return Some(item);
            }
            if !self.cursor.next() {
                self.state = StreamState::Completed;
                return None;
            }
            if self.flag.is_some_and(|flag| !flag.running()) {
                info!(visited = self.visited, "result stream terminated");
                self.state = StreamState::Terminated;
                return None;
            }
            self.local = self.cursor.offset();
        }
    }
}

impl DisjointSetStruct {
    /// Streams `(original id, set id)` for every index, in index order.
    ///
    /// Set ids are root indices, or the recorded seed ids of a seeded
    /// structure.
    ///
    /// # Errors
    /// Returns [`crate::PagedError::Released`] after release.
    pub fn result_stream<'a, M: IdMapping + ?Sized>(
        &'a self,
        mapping: &'a M,
    ) -> Result<ResultStream<'a, M>> {
        ResultStream::new(self, mapping)
    }

    /// Calls `consumer(node, set id)` for each of `nodes` until it returns
    /// `false`.
    ///
    /// Returns `true` when every node was visited and `false` when the
    /// consumer stopped early.
    ///
    /// # Errors
    /// Fails when a node is out of range or the structure has been released.
    pub fn for_each_assignment(
        &self,
        nodes: impl IntoIterator<Item = u64>,
        mut consumer: impl FnMut(u64, u64) -> bool,
    ) -> Result<bool> {
        self.ensure_live()?;
        for node in nodes {
            if !consumer(node, self.set_id_no_opt(node)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
