//! Colmena core library: paged primitive arrays and a partition-then-merge
//! disjoint-set engine built on top of them.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod cursor;
mod dss;
mod element;
mod error;
mod memory;
mod paged_array;
#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
mod parallel;
mod partition;
mod projection;
mod statistics;
mod termination;

pub mod paging;

#[cfg(test)]
mod test_utils;

pub use crate::{
    config::{ComponentsBuilder, ComponentsConfig, DEFAULT_MIN_BATCH_SIZE},
    cursor::ArrayCursor,
    dss::{DisjointSetStruct, UNSEEDED},
    element::{BitElement, Element},
    error::{PagedError, PagedErrorCode, Result},
    memory::{AllocationTracker, MemoryBudget, TaskId, Untracked, format_bytes},
    paged_array::PagedArray,
    partition::{Partition, range_partitions},
    projection::{ConsecutiveSetIds, IdMapping, IdentityMapping, ResultStream, SetAssignment},
    statistics::{SET_SIZE_PERCENTILES, SetSizeSummary},
    termination::{Completion, RunningForever, TerminationFlag, TerminationToken},
};

#[cfg(feature = "parallel")]
pub use crate::parallel::parallel_union;
