//! Argument parsing, ingestion and summary rendering for the groundseg CLI.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use groundseg_core::{
    GridExtent, GroundsegBuilder, GroundsegError, GroundsegErrorCode, PointCloud,
    SurfaceAnalysis,
};
use nalgebra::{Point2, Point3, Vector2};
use thiserror::Error;

/// Command-line options, mirroring the core builder parameters.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "groundseg",
    about = "Segment a ground-surface point cloud into planar regions."
)]
pub struct Cli {
    /// Path to a whitespace-separated list of `x y z` triples.
    pub input: PathBuf,

    /// Minimum DEM corner, x coordinate.
    #[arg(long, default_value_t = 0.0)]
    pub min_x: f64,

    /// Minimum DEM corner, y coordinate.
    #[arg(long, default_value_t = 0.0)]
    pub min_y: f64,

    /// Maximum DEM corner, x coordinate (exclusive).
    #[arg(long, default_value_t = 4.0)]
    pub max_x: f64,

    /// Maximum DEM corner, y coordinate (exclusive).
    #[arg(long, default_value_t = 4.0)]
    pub max_y: f64,

    /// DEM cell size in metres, applied to both axes.
    #[arg(long, default_value_t = 0.1)]
    pub cell_size: f64,

    /// Per-cell sensor variance.
    #[arg(long, default_value_t = 1e-4)]
    pub sensor_variance: f64,

    /// Segmentation threshold scale k.
    #[arg(long = "segmentation-k", default_value_t = 300.0)]
    pub segmentation_param: f64,

    /// Merge segmentation components smaller than this size.
    #[arg(long)]
    pub min_component_size: Option<NonZeroUsize>,

    /// EM iteration cap.
    #[arg(long, default_value_t = 200)]
    pub ml_max_iter: usize,

    /// EM convergence tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub ml_tol: f64,

    /// Weight the M-step regression by responsibility.
    #[arg(long)]
    pub weighted: bool,

    /// BP sweep cap.
    #[arg(long, default_value_t = 200)]
    pub bp_max_iter: usize,

    /// BP convergence tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub bp_tol: f64,

    /// Propagate BP messages in the log domain.
    #[arg(long)]
    pub log_domain: bool,

    /// Potts smoothness coefficient.
    #[arg(long, default_value_t = 1.0)]
    pub smoothness: f64,
}

/// Errors surfaced while executing the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// The input file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The input file did not contain valid `x y z` triples.
    #[error("failed to parse `{path}`: {detail}")]
    Parse {
        /// Path that triggered the failure.
        path: PathBuf,
        /// What was wrong with the content.
        detail: String,
    },
    /// The core pipeline rejected the configuration or failed numerically.
    #[error(transparent)]
    Core(#[from] GroundsegError),
}

impl CliError {
    /// Maps the error onto the documented process exit codes.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Io { .. } => 1,
            Self::Parse { .. } => 2,
            Self::Core(error) => match error.code() {
                GroundsegErrorCode::Invariant => 1,
                GroundsegErrorCode::NumericSingular => 3,
                _ => 1,
            },
        }
    }
}

/// Summarises the outcome of one CLI invocation.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Path of the processed input file.
    pub input: PathBuf,
    /// Number of points read from the file.
    pub points: usize,
    /// The analysis produced by the pipeline.
    pub analysis: SurfaceAnalysis,
}

/// Executes the command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when the file cannot be read or parsed, the
/// configuration violates a core precondition, or the pipeline fails
/// numerically.
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    let groundseg = GroundsegBuilder::new()
        .with_extent(GridExtent::new(
            Point2::new(cli.min_x, cli.min_y),
            Point2::new(cli.max_x, cli.max_y),
        ))
        .with_cell_size(Vector2::new(cli.cell_size, cli.cell_size))
        .with_sensor_variance(cli.sensor_variance)
        .with_segmentation_param(cli.segmentation_param)
        .with_min_component_size(cli.min_component_size)
        .with_ml_max_iterations(cli.ml_max_iter)
        .with_ml_tolerance(cli.ml_tol)
        .with_weighted_regression(cli.weighted)
        .with_bp_max_iterations(cli.bp_max_iter)
        .with_bp_tolerance(cli.bp_tol)
        .with_log_domain(cli.log_domain)
        .with_smoothness(cli.smoothness)
        .build()?;

    let content = fs::read_to_string(&cli.input).map_err(|source| CliError::Io {
        path: cli.input.clone(),
        source,
    })?;
    let cloud = parse_triples(&content).map_err(|detail| CliError::Parse {
        path: cli.input.clone(),
        detail,
    })?;

    let points = cloud.len();
    let analysis = groundseg.process_point_cloud(&cloud)?;
    Ok(ExecutionSummary {
        input: cli.input,
        points,
        analysis,
    })
}

/// Parses whitespace-separated `x y z` triples into a point cloud.
pub(crate) fn parse_triples(content: &str) -> Result<PointCloud, String> {
    let mut values = Vec::new();
    for (position, token) in content.split_whitespace().enumerate() {
        let value: f64 = token
            .parse()
            .map_err(|_| format!("token {} (`{token}`) is not a number", position + 1))?;
        values.push(value);
    }
    if values.len() % 3 != 0 {
        return Err(format!(
            "expected complete x y z triples, found {} trailing coordinate(s)",
            values.len() % 3
        ));
    }
    Ok(values
        .chunks_exact(3)
        .map(|triple| Point3::new(triple[0], triple[1], triple[2]))
        .collect())
}

/// Renders the run summary to the provided writer.
///
/// # Errors
/// Propagates any write failure from the underlying stream.
pub fn render_summary(summary: &ExecutionSummary, writer: &mut impl Write) -> io::Result<()> {
    let analysis = &summary.analysis;
    writeln!(writer, "input: {}", summary.input.display())?;
    writeln!(writer, "points: {}", summary.points)?;
    writeln!(writer, "valid: {}", analysis.is_valid())?;
    if !analysis.is_valid() {
        return Ok(());
    }

    writeln!(writer, "dem vertices: {}", analysis.graph().vertex_count())?;
    writeln!(
        writer,
        "segments: {}",
        analysis.segmentation().component_count()
    )?;
    writeln!(writer, "surfaces: {}", analysis.mixture().len())?;
    for (id, component) in analysis.mixture().iter().enumerate() {
        writeln!(
            writer,
            "  surface {id}: weight {:.4}, z = {:.4} + {:.4}*x + {:.4}*y, variance {:.3e}",
            component.weight, component.plane.a, component.plane.b, component.plane.c,
            component.variance
        )?;
    }

    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for entry in analysis.labels().entries() {
        if let Some(label) = entry {
            *counts.entry(label.get()).or_insert(0) += 1;
        }
    }
    for (label, count) in counts {
        writeln!(writer, "  label {label}: {count} cell(s)")?;
    }
    if !analysis.ml_converged() || !analysis.bp_converged() {
        writeln!(writer, "warning: iteration cap reached before tolerance")?;
    }
    Ok(())
}
