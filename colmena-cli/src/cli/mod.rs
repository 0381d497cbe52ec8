//! Command-line interface for running connected components over edge lists.
//!
//! `components` loads a whitespace-separated edge list, unions it with the
//! partition-then-merge engine under an optional memory budget and prints one
//! set assignment per node. `estimate` reports the memory a run would need
//! without allocating anything.

mod commands;
mod edges;

pub use commands::{
    Cli, CliError, Command, CommandOutput, ComponentsCommand, ComponentsSummary, EstimateCommand,
    EstimateSummary, parse_byte_size, render_output, run_cli,
};
pub use edges::{EdgeList, EdgeListError};
