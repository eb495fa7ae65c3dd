//! Pipeline facade.
//!
//! [`Groundseg`] owns the validated configuration and exposes the single
//! processing operation. Every call is independent: the facade holds no
//! mutable state, and the returned [`SurfaceAnalysis`] owns all intermediate
//! products of its invocation.

use std::num::NonZeroUsize;

use nalgebra::Vector2;
use tracing::instrument;

use crate::{
    PointCloud, Result, SurfaceAnalysis, dem::GridExtent, pipeline, pipeline::PipelineConfig,
};

/// Entry point for the ground-surface segmentation pipeline.
///
/// # Examples
/// ```
/// use groundseg_core::{GroundsegBuilder, PointCloud};
/// use nalgebra::Point3;
///
/// let groundseg = GroundsegBuilder::new()
///     .build()
///     .expect("builder configuration is valid");
/// let cloud = PointCloud::from_points(vec![
///     Point3::new(1.0, 1.0, 0.5),
///     Point3::new(1.05, 1.0, 0.5),
/// ]);
/// let analysis = groundseg
///     .process_point_cloud(&cloud)
///     .expect("processing succeeds");
/// assert!(analysis.is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct Groundseg {
    config: PipelineConfig,
}

impl Groundseg {
    pub(crate) fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Returns the DEM extent.
    #[must_use]
    pub fn extent(&self) -> GridExtent {
        self.config.extent
    }

    /// Returns the DEM cell size per axis.
    #[must_use]
    pub fn cell_size(&self) -> Vector2<f64> {
        self.config.cell_size
    }

    /// Returns the per-cell sensor variance.
    #[must_use]
    pub fn sensor_variance(&self) -> f64 {
        self.config.sensor_variance
    }

    /// Returns the segmentation threshold scale `k`.
    #[must_use]
    pub fn segmentation_param(&self) -> f64 {
        self.config.segmentation_param
    }

    /// Returns the minimum component size enforced by the post-pass, if any.
    #[must_use]
    pub fn min_component_size(&self) -> Option<NonZeroUsize> {
        self.config.min_component_size
    }

    /// Returns the EM iteration cap.
    #[must_use]
    pub fn ml_max_iterations(&self) -> usize {
        self.config.ml_max_iterations
    }

    /// Returns the EM convergence tolerance.
    #[must_use]
    pub fn ml_tolerance(&self) -> f64 {
        self.config.ml_tolerance
    }

    /// Returns whether the M-step regression weights by responsibility.
    #[must_use]
    pub fn weighted_regression(&self) -> bool {
        self.config.weighted
    }

    /// Returns the BP sweep cap.
    #[must_use]
    pub fn bp_max_iterations(&self) -> usize {
        self.config.bp_max_iterations
    }

    /// Returns the BP convergence tolerance.
    #[must_use]
    pub fn bp_tolerance(&self) -> f64 {
        self.config.bp_tolerance
    }

    /// Returns whether BP messages run in the log domain.
    #[must_use]
    pub fn log_domain(&self) -> bool {
        self.config.log_domain
    }

    /// Returns the Potts smoothness coefficient.
    #[must_use]
    pub fn smoothness(&self) -> f64 {
        self.config.smoothness
    }

    /// Processes one point cloud through the full pipeline.
    ///
    /// A cloud that leaves every DEM cell empty is not an error: the call
    /// succeeds with an invalid analysis and an empty label map. EM or BP
    /// hitting their iteration caps is advisory; the corresponding
    /// convergence flag on the result is cleared and a warning is logged.
    ///
    /// # Errors
    /// Returns [`crate::GroundsegError::NumericSingular`] when a mixture
    /// regression stays singular after pruning and retrying.
    #[instrument(
        name = "core.process_point_cloud",
        err,
        skip(self, cloud),
        fields(
            points = cloud.len(),
            k = self.config.segmentation_param,
            log_domain = self.config.log_domain,
        ),
    )]
    pub fn process_point_cloud(&self, cloud: &PointCloud) -> Result<SurfaceAnalysis> {
        pipeline::run(&self.config, cloud)
    }
}
