//! Library surface of the groundseg CLI.
//!
//! The binary in `main.rs` is a thin wrapper over [`cli::run_cli`] so the
//! argument parsing, file ingestion and summary rendering stay testable.

pub mod cli;
pub mod logging;
