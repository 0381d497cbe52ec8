//! Command implementations and argument parsing for the colmena CLI.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colmena_core::{
    Completion, ComponentsBuilder, ComponentsConfig, DEFAULT_MIN_BATCH_SIZE, DisjointSetStruct,
    IdentityMapping, PagedError, RunningForever, SetAssignment, format_bytes,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

use super::edges::{EdgeList, EdgeListError};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "colmena",
    about = "Compute connected components with a paged union-find."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Union an edge list and print the set of every node.
    Components(ComponentsCommand),
    /// Report the memory a components run would register.
    Estimate(EstimateCommand),
}

/// Options accepted by the `components` command.
#[derive(Debug, Args, Clone)]
pub struct ComponentsCommand {
    /// Path to a whitespace-separated edge list, one `source target` pair per
    /// line.
    pub path: PathBuf,

    /// Number of nodes; defaults to one past the largest id in the file.
    #[arg(long)]
    pub nodes: Option<u64>,

    /// Memory budget for all paged structures (e.g. `512MiB`, `2G`).
    #[arg(long, env = "COLMENA_MEMORY_BUDGET", value_parser = parse_byte_size)]
    pub budget: Option<u64>,

    /// Worker threads; defaults to the available parallelism.
    #[arg(long, env = "COLMENA_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Smallest number of edges handed to one worker.
    #[arg(long = "min-batch-size", default_value_t = DEFAULT_MIN_BATCH_SIZE)]
    pub min_batch_size: u64,

    /// Print dense set ids `0..k` instead of root node ids.
    #[arg(long)]
    pub consecutive: bool,
}

/// Options accepted by the `estimate` command.
#[derive(Debug, Args, Clone)]
pub struct EstimateCommand {
    /// Number of nodes the run would cover.
    #[arg(long)]
    pub nodes: u64,

    /// Worker threads; defaults to the available parallelism.
    #[arg(long, env = "COLMENA_CONCURRENCY")]
    pub concurrency: Option<usize>,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Opening an input file failed.
    #[error("failed to open `{}`: {source}", .path.display())]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The edge list could not be parsed.
    #[error("`{}`: {source}", .path.display())]
    EdgeList {
        /// File being parsed.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: EdgeListError,
    },
    /// The core engine refused or failed the run.
    #[error(transparent)]
    Core(#[from] PagedError),
    /// The run was stopped before it finished.
    #[error("run terminated after {visited} units of work")]
    Terminated {
        /// Units of work completed before termination.
        visited: u64,
    },
}

/// Outcome of a `components` run.
#[derive(Debug, Clone)]
pub struct ComponentsSummary {
    /// Node count the run covered.
    pub nodes: u64,
    /// Number of edges read.
    pub edges: usize,
    /// Number of distinct sets.
    pub sets: u64,
    /// One assignment per node in node order.
    pub assignments: Vec<SetAssignment>,
}

/// Outcome of an `estimate` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateSummary {
    /// Node count the estimate covers.
    pub nodes: u64,
    /// Worker structures a run would allocate.
    pub workers: u64,
    /// Bytes registered by one disjoint-set structure.
    pub per_structure: u64,
    /// Bytes registered by all worker structures together.
    pub total: u64,
}

/// Result of executing any command.
#[derive(Debug, Clone)]
pub enum CommandOutput {
    /// Output of `components`.
    Components(ComponentsSummary),
    /// Output of `estimate`.
    Estimate(EstimateSummary),
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading input or running the engine fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use colmena_cli::cli::{Cli, Command, CommandOutput, ComponentsCommand, run_cli};
/// # use tempfile::NamedTempFile;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let file = NamedTempFile::new()?;
/// std::fs::write(file.path(), "0 1\n2 3\n1 2\n5 6\n")?;
/// let cli = Cli {
///     command: Command::Components(ComponentsCommand {
///         path: file.path().to_path_buf(),
///         nodes: Some(8),
///         budget: None,
///         concurrency: Some(2),
///         min_batch_size: 1,
///         consecutive: true,
///     }),
/// };
/// let CommandOutput::Components(summary) = run_cli(cli)? else {
///     unreachable!("components command yields components output");
/// };
/// assert_eq!(summary.sets, 4);
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<CommandOutput, CliError> {
    match cli.command {
        Command::Components(command) => {
            Span::current().record("command", field::display("components"));
            run_components(&command).map(CommandOutput::Components)
        }
        Command::Estimate(command) => {
            Span::current().record("command", field::display("estimate"));
            run_estimate(&command).map(CommandOutput::Estimate)
        }
    }
}

#[instrument(
    name = "cli.components",
    err,
    skip(command),
    fields(path = %command.path.display(), nodes = field::Empty, edges = field::Empty),
)]
pub(super) fn run_components(command: &ComponentsCommand) -> Result<ComponentsSummary, CliError> {
    let config = configure(command.concurrency, command.min_batch_size, command.budget)?;
    let list = load_edges(&command.path)?;
    let nodes = command.nodes.unwrap_or_else(|| list.node_count());
    let edges = list.edges();

    let span = Span::current();
    span.record("nodes", nodes);
    span.record("edges", edges.len());

    let tracker = config.tracker();
    let outcome = config.run(
        nodes,
        edges.len() as u64,
        &tracker,
        &RunningForever,
        |partition, dss| {
            let bounds = usize::try_from(partition.start())
                .ok()
                .zip(usize::try_from(partition.end()).ok());
            let slice = bounds
                .and_then(|(start, end)| edges.get(start..end))
                .ok_or(PagedError::CapacityOverflow {
                    capacity: partition.end(),
                })?;
            for &(p, q) in slice {
                dss.union(p, q)?;
            }
            Ok(())
        },
    )?;
    let mut dss = match outcome {
        Completion::Completed(dss) => dss,
        Completion::Terminated { visited } => return Err(CliError::Terminated { visited }),
    };

    let sets = dss.set_count()?;
    let assignments = collect_assignments(&dss, command.consecutive)?;
    info!(
        nodes,
        edges = edges.len(),
        sets,
        usage = %tracker.usage_summary(),
        "components completed"
    );
    dss.release();
    Ok(ComponentsSummary {
        nodes,
        edges: edges.len(),
        sets,
        assignments,
    })
}

fn configure(
    concurrency: Option<usize>,
    min_batch_size: u64,
    budget: Option<u64>,
) -> Result<ComponentsConfig, CliError> {
    let mut builder = ComponentsBuilder::new().with_min_batch_size(min_batch_size);
    if let Some(concurrency) = concurrency {
        builder = builder.with_concurrency(concurrency);
    }
    if let Some(budget) = budget {
        builder = builder.with_memory_budget(budget);
    }
    Ok(builder.build()?)
}

fn collect_assignments(
    dss: &DisjointSetStruct,
    consecutive: bool,
) -> Result<Vec<SetAssignment>, CliError> {
    let raw = dss.result_stream(&IdentityMapping)?;
    let stream = if consecutive { raw.consecutive() } else { raw };
    Ok(stream.collect::<Result<_, _>>()?)
}

#[instrument(
    name = "cli.estimate",
    err,
    skip(command),
    fields(nodes = command.nodes),
)]
pub(super) fn run_estimate(command: &EstimateCommand) -> Result<EstimateSummary, CliError> {
    let config = configure(command.concurrency, DEFAULT_MIN_BATCH_SIZE, None)?;
    let workers = config.concurrency().get() as u64;
    let per_structure = DisjointSetStruct::memory_requirements(command.nodes);
    let summary = EstimateSummary {
        nodes: command.nodes,
        workers,
        per_structure,
        total: per_structure.saturating_mul(workers),
    };
    info!(total = %format_bytes(summary.total), "estimate completed");
    Ok(summary)
}

#[instrument(name = "cli.load_edges", err, fields(path = %path.display()))]
pub(super) fn load_edges(path: &Path) -> Result<EdgeList, CliError> {
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    EdgeList::from_reader(BufReader::new(file)).map_err(|source| CliError::EdgeList {
        path: path.to_path_buf(),
        source,
    })
}

const BYTE_UNITS: [(&str, u32); 4] = [("k", 1), ("m", 2), ("g", 3), ("t", 4)];

/// Parses a byte count such as `1024`, `100K`, `512MiB` or `2GB`.
///
/// Suffixes are binary and case-insensitive; `K`, `KB` and `KiB` all mean
/// 1024 bytes.
///
/// # Errors
/// Returns a message when the number is missing, negative, fractional,
/// carries an unknown suffix, or overflows `u64`.
///
/// # Examples
/// ```
/// use colmena_cli::cli::parse_byte_size;
///
/// assert_eq!(parse_byte_size("512MiB"), Ok(512 * 1024 * 1024));
/// assert!(parse_byte_size("1.5G").is_err());
/// ```
pub fn parse_byte_size(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(format!("`{raw}` does not start with a byte count"));
    }
    let value = digits
        .parse::<u64>()
        .map_err(|err| format!("`{digits}` is not a byte count: {err}"))?;

    let unit_name = suffix.to_ascii_lowercase();
    if unit_name.is_empty() || unit_name == "b" {
        return Ok(value);
    }
    let exponent = BYTE_UNITS
        .iter()
        .find(|(unit, _)| {
            unit_name == *unit
                || unit_name == format!("{unit}b")
                || unit_name == format!("{unit}ib")
        })
        .map(|(_, exponent)| *exponent)
        .ok_or_else(|| format!("unknown size suffix in `{raw}`"))?;
    1024_u64
        .checked_pow(exponent)
        .and_then(|unit| value.checked_mul(unit))
        .ok_or_else(|| format!("`{raw}` does not fit in 64 bits"))
}

/// Renders `output` to `writer` as plain text.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// # use std::io::Cursor;
/// # use colmena_cli::cli::{CommandOutput, EstimateSummary, render_output};
/// let output = CommandOutput::Estimate(EstimateSummary {
///     nodes: 10,
///     workers: 2,
///     per_structure: 160,
///     total: 320,
/// });
/// let mut buffer = Cursor::new(Vec::new());
/// render_output(&output, &mut buffer)?;
/// let text = String::from_utf8(buffer.into_inner()).expect("utf-8");
/// assert!(text.contains("total: 320 B"));
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn render_output(output: &CommandOutput, mut writer: impl Write) -> io::Result<()> {
    match output {
        CommandOutput::Components(summary) => {
            writeln!(writer, "nodes: {}", summary.nodes)?;
            writeln!(writer, "edges: {}", summary.edges)?;
            writeln!(writer, "sets: {}", summary.sets)?;
            for assignment in &summary.assignments {
                writeln!(writer, "{}\t{}", assignment.original_id(), assignment.set_id())?;
            }
        }
        CommandOutput::Estimate(summary) => {
            writeln!(writer, "nodes: {}", summary.nodes)?;
            writeln!(writer, "workers: {}", summary.workers)?;
            writeln!(
                writer,
                "per structure: {}",
                format_bytes(summary.per_structure)
            )?;
            writeln!(writer, "total: {}", format_bytes(summary.total))?;
        }
    }
    Ok(())
}
