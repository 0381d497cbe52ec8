//! Benchmark parameter types.

use std::fmt;

/// Parameters for a union benchmark run.
#[derive(Clone, Copy, Debug)]
pub struct UnionBenchParams {
    /// Number of nodes in the structure.
    pub node_count: u64,
    /// Number of edges unioned per iteration.
    pub edge_count: usize,
}

impl fmt::Display for UnionBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},e={}", self.node_count, self.edge_count)
    }
}

/// Parameters for a parallel union run.
#[derive(Clone, Copy, Debug)]
pub struct ParallelBenchParams {
    /// Shape of the input.
    pub union: UnionBenchParams,
    /// Worker threads.
    pub concurrency: usize,
}

impl fmt::Display for ParallelBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},t={}", self.union, self.concurrency)
    }
}
