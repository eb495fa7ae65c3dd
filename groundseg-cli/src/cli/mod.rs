//! Command-line interface for the groundseg pipeline.
//!
//! The CLI reads a whitespace-separated list of `x y z` triples, runs the
//! pipeline with parameters mirroring the core builder, and renders a run
//! summary. Exit codes: 0 on success, 1 on usage or configuration errors,
//! 2 on parse errors, 3 on numeric failures.

mod commands;

pub use commands::{Cli, CliError, ExecutionSummary, render_summary, run_cli};

#[cfg(test)]
mod tests;
