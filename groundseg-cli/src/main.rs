//! CLI entry point for the groundseg pipeline.
//!
//! Parses arguments with clap, executes the pipeline, renders the summary to
//! stdout and maps failures onto the documented exit codes: 0 on success,
//! 1 on usage or configuration errors, 2 on parse errors, 3 on numeric
//! failures. Logging is initialised eagerly so every later stage can emit
//! structured diagnostics via `tracing`.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::error;

use groundseg_cli::{
    cli::{Cli, ExecutionSummary, render_summary, run_cli},
    logging::{self, LoggingError},
};

fn emit(summary: &ExecutionSummary) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(summary, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    match run_cli(cli) {
        Ok(summary) => {
            if let Err(err) = emit(&summary) {
                error!(error = %err, "failed to write summary");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, exit_code = err.exit_code(), "command execution failed");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Emit a fallback diagnostic to stderr when tracing initialisation fails.
#[expect(
    clippy::print_stderr,
    reason = "one-off diagnostic before tracing is initialised"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
