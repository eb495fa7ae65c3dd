//! Builder for configuring the ground-surface pipeline.
//!
//! All configuration preconditions are enforced in [`GroundsegBuilder::build`];
//! a successfully built [`Groundseg`] can no longer fail with an `INVARIANT`
//! error.

use std::num::NonZeroUsize;

use nalgebra::{Point2, Vector2};

use crate::{
    GroundsegError, Result,
    dem::{self, GridExtent},
    groundseg::Groundseg,
    pipeline::PipelineConfig,
};

/// Configures and constructs [`Groundseg`] instances.
///
/// # Examples
/// ```
/// use groundseg_core::GroundsegBuilder;
///
/// let groundseg = GroundsegBuilder::new()
///     .with_segmentation_param(150.0)
///     .with_log_domain(true)
///     .build()
///     .expect("builder configuration is valid");
/// assert_eq!(groundseg.segmentation_param(), 150.0);
/// assert!(groundseg.log_domain());
/// ```
#[derive(Debug, Clone)]
pub struct GroundsegBuilder {
    config: PipelineConfig,
}

impl Default for GroundsegBuilder {
    fn default() -> Self {
        Self {
            config: PipelineConfig {
                extent: GridExtent::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0)),
                cell_size: Vector2::new(0.1, 0.1),
                sensor_variance: 1e-4,
                segmentation_param: 300.0,
                min_component_size: None,
                ml_max_iterations: 200,
                ml_tolerance: 1e-6,
                weighted: false,
                bp_max_iterations: 200,
                bp_tolerance: 1e-6,
                log_domain: false,
                smoothness: 1.0,
            },
        }
    }
}

impl GroundsegBuilder {
    /// Creates a builder populated with the default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the DEM extent.
    #[must_use]
    pub fn with_extent(mut self, extent: GridExtent) -> Self {
        self.config.extent = extent;
        self
    }

    /// Sets the DEM cell size per axis.
    #[must_use]
    pub fn with_cell_size(mut self, cell_size: Vector2<f64>) -> Self {
        self.config.cell_size = cell_size;
        self
    }

    /// Sets the per-cell sensor variance.
    #[must_use]
    pub fn with_sensor_variance(mut self, sensor_variance: f64) -> Self {
        self.config.sensor_variance = sensor_variance;
        self
    }

    /// Sets the segmentation threshold scale `k`.
    #[must_use]
    pub fn with_segmentation_param(mut self, k: f64) -> Self {
        self.config.segmentation_param = k;
        self
    }

    /// Enables the post-segmentation merge of components smaller than
    /// `min_size`; disabled by default.
    #[must_use]
    pub fn with_min_component_size(mut self, min_size: Option<NonZeroUsize>) -> Self {
        self.config.min_component_size = min_size;
        self
    }

    /// Sets the EM iteration cap.
    #[must_use]
    pub fn with_ml_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.ml_max_iterations = max_iterations;
        self
    }

    /// Sets the EM convergence tolerance.
    #[must_use]
    pub fn with_ml_tolerance(mut self, tolerance: f64) -> Self {
        self.config.ml_tolerance = tolerance;
        self
    }

    /// Selects responsibility-weighted regression instead of hard
    /// assignments in the M-step.
    #[must_use]
    pub fn with_weighted_regression(mut self, weighted: bool) -> Self {
        self.config.weighted = weighted;
        self
    }

    /// Sets the BP sweep cap.
    #[must_use]
    pub fn with_bp_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.bp_max_iterations = max_iterations;
        self
    }

    /// Sets the BP convergence tolerance.
    #[must_use]
    pub fn with_bp_tolerance(mut self, tolerance: f64) -> Self {
        self.config.bp_tolerance = tolerance;
        self
    }

    /// Selects log-domain message passing.
    #[must_use]
    pub fn with_log_domain(mut self, log_domain: bool) -> Self {
        self.config.log_domain = log_domain;
        self
    }

    /// Sets the Potts smoothness coefficient.
    #[must_use]
    pub fn with_smoothness(mut self, smoothness: f64) -> Self {
        self.config.smoothness = smoothness;
        self
    }

    /// Validates the configuration and constructs a [`Groundseg`] instance.
    ///
    /// # Errors
    /// Returns an `INVARIANT` error when the extent is degenerate, a cell
    /// size or the sensor variance is not positive, `k` is not positive, an
    /// iteration cap is zero, a tolerance is not positive, or the smoothness
    /// coefficient is negative or non-finite.
    pub fn build(self) -> Result<Groundseg> {
        let config = self.config;
        config.extent.validate()?;
        dem::validate_cell_size(config.cell_size)?;
        dem::validate_sensor_variance(config.sensor_variance)?;

        if !config.segmentation_param.is_finite() || config.segmentation_param <= 0.0 {
            return Err(GroundsegError::InvalidSegmentationParam {
                got: config.segmentation_param,
            });
        }
        if config.ml_max_iterations < 1 {
            return Err(GroundsegError::InvalidIterationCap { stage: "ML" });
        }
        if config.bp_max_iterations < 1 {
            return Err(GroundsegError::InvalidIterationCap { stage: "BP" });
        }
        if !config.ml_tolerance.is_finite() || config.ml_tolerance <= 0.0 {
            return Err(GroundsegError::InvalidTolerance {
                stage: "ML",
                got: config.ml_tolerance,
            });
        }
        if !config.bp_tolerance.is_finite() || config.bp_tolerance <= 0.0 {
            return Err(GroundsegError::InvalidTolerance {
                stage: "BP",
                got: config.bp_tolerance,
            });
        }
        if !config.smoothness.is_finite() || config.smoothness < 0.0 {
            return Err(GroundsegError::InvalidSmoothness {
                got: config.smoothness,
            });
        }

        Ok(Groundseg::new(config))
    }
}
