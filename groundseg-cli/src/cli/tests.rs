//! Unit tests for CLI parsing, execution and rendering.

use std::io::Write as _;

use clap::Parser;
use groundseg_core::GroundsegError;
use rstest::rstest;
use tempfile::NamedTempFile;

use super::commands::parse_triples;
use super::{Cli, CliError, render_summary, run_cli};

fn cli_for(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments must parse")
}

fn temp_input(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file must be created");
    file.write_all(content.as_bytes())
        .expect("temp file must be writable");
    file
}

#[test]
fn parses_whitespace_separated_triples() {
    let cloud = parse_triples("1 2 3\n4.5 5 -6\t7 8 9").expect("triples must parse");
    assert_eq!(cloud.len(), 3);
    assert_eq!(cloud.points()[1].x, 4.5);
    assert_eq!(cloud.points()[1].z, -6.0);
}

#[test]
fn rejects_non_numeric_tokens() {
    let err = parse_triples("1 2 three").expect_err("token must fail to parse");
    assert!(err.contains("token 3"));
    assert!(err.contains("three"));
}

#[test]
fn rejects_incomplete_triples() {
    let err = parse_triples("1 2 3 4").expect_err("trailing coordinate must fail");
    assert!(err.contains("trailing"));
}

#[rstest]
#[case::invariant(GroundsegError::InvalidSegmentationParam { got: 0.0 }, 1)]
#[case::numeric(GroundsegError::NumericSingular { component: 0 }, 3)]
fn core_errors_map_to_exit_codes(#[case] error: GroundsegError, #[case] expected: u8) {
    assert_eq!(CliError::Core(error).exit_code(), expected);
}

#[test]
fn io_and_parse_errors_map_to_exit_codes() {
    let io = CliError::Io {
        path: "missing.txt".into(),
        source: std::io::Error::other("gone"),
    };
    assert_eq!(io.exit_code(), 1);

    let parse = CliError::Parse {
        path: "bad.txt".into(),
        detail: "token 1 (`x`) is not a number".into(),
    };
    assert_eq!(parse.exit_code(), 2);
}

#[test]
fn run_cli_processes_a_small_cloud() {
    let file = temp_input("1.0 1.0 0.5\n1.05 1.0 0.5\n1.0 1.05 0.5\n");
    let cli = cli_for(&["groundseg", file.path().to_str().expect("utf-8 path")]);

    let summary = run_cli(cli).expect("run must succeed");
    assert_eq!(summary.points, 3);
    assert!(summary.analysis.is_valid());

    let mut rendered = Vec::new();
    render_summary(&summary, &mut rendered).expect("rendering must succeed");
    let text = String::from_utf8(rendered).expect("summary is UTF-8");
    assert!(text.contains("valid: true"));
    assert!(text.contains("surfaces: 1"));
}

#[test]
fn run_cli_reports_missing_files_as_io_errors() {
    let cli = cli_for(&["groundseg", "/nonexistent/groundseg-input.txt"]);
    let err = run_cli(cli).expect_err("missing file must fail");
    assert!(matches!(err, CliError::Io { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn run_cli_reports_malformed_content_as_parse_errors() {
    let file = temp_input("1 2 not-a-number\n");
    let cli = cli_for(&["groundseg", file.path().to_str().expect("utf-8 path")]);
    let err = run_cli(cli).expect_err("malformed content must fail");
    assert!(matches!(err, CliError::Parse { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn run_cli_rejects_invalid_configuration() {
    let file = temp_input("1 1 0.5\n");
    let cli = cli_for(&[
        "groundseg",
        file.path().to_str().expect("utf-8 path"),
        "--cell-size",
        "0",
    ]);
    let err = run_cli(cli).expect_err("zero cell size must fail");
    assert!(matches!(err, CliError::Core(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn out_of_bounds_cloud_renders_an_invalid_summary() {
    let file = temp_input("10 10 0.5\n");
    let cli = cli_for(&["groundseg", file.path().to_str().expect("utf-8 path")]);
    let summary = run_cli(cli).expect("empty input is not an error");
    assert!(!summary.analysis.is_valid());

    let mut rendered = Vec::new();
    render_summary(&summary, &mut rendered).expect("rendering must succeed");
    let text = String::from_utf8(rendered).expect("summary is UTF-8");
    assert!(text.contains("valid: false"));
}
