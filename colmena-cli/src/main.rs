//! `colmena` binary.
//!
//! Reads an edge list, unions it with the parallel disjoint-set engine and
//! prints one `node<TAB>set` line per node. Failures are logged with their
//! stable error code and turn into a non-zero exit status.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use colmena_cli::{
    cli::{Cli, CliError, render_output, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let output = run_cli(cli).context("command failed")?;
    let mut writer = BufWriter::new(io::stdout().lock());
    render_output(&output, &mut writer).context("failed to write output")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.downcast_ref::<CliError>().and_then(|cli_error| match cli_error {
                CliError::Core(core) => Some(core.code()),
                _ => None,
            });
            error!(
                error = %format_args!("{err:#}"),
                code = code.map(|code| field::display(code.as_str())),
                "colmena failed"
            );
            ExitCode::FAILURE
        }
    }
}

#[expect(
    clippy::print_stderr,
    reason = "tracing is not available until logging is initialised"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialise logging: {err}");
}
