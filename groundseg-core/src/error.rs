//! Error types for the groundseg core library.
//!
//! Defines the error enum exposed by the public API, the stable error-code
//! surface used by logging and the CLI, and a convenient result alias.

use std::fmt;

use thiserror::Error;

/// Stable codes describing [`GroundsegError`] variants.
///
/// Configuration preconditions all share the `INVARIANT` code; numeric
/// failures in the mixture regression report `NUMERIC_SINGULAR`. An empty
/// point cloud is not an error and therefore has no code: the pipeline
/// returns an invalid result instead.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum GroundsegErrorCode {
    /// A configuration parameter violated a precondition.
    Invariant,
    /// A weighted-regression normal-equation matrix was not invertible.
    NumericSingular,
}

impl GroundsegErrorCode {
    /// Return the stable machine-readable representation of this error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invariant => "INVARIANT",
            Self::NumericSingular => "NUMERIC_SINGULAR",
        }
    }
}

impl fmt::Display for GroundsegErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type produced when configuring or running the pipeline.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GroundsegError {
    /// The per-cell sensor variance must be strictly positive.
    #[error("sensor variance must be positive (got {got})")]
    InvalidSensorVariance { got: f64 },
    /// The segmentation threshold scale `k` must be finite and positive.
    #[error("segmentation parameter k must be finite and positive (got {got})")]
    InvalidSegmentationParam { got: f64 },
    /// The DEM extent must satisfy `min < max` on every axis.
    #[error("DEM extent is degenerate on the {axis} axis ({min} .. {max})")]
    InvalidGridExtent {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    /// DEM cell sizes must be finite and positive.
    #[error("DEM cell size on the {axis} axis must be finite and positive (got {got})")]
    InvalidCellSize { axis: &'static str, got: f64 },
    /// Iteration caps must allow at least one sweep.
    #[error("{stage} iteration cap must be at least 1")]
    InvalidIterationCap { stage: &'static str },
    /// Convergence tolerances must be finite and positive.
    #[error("{stage} tolerance must be finite and positive (got {got})")]
    InvalidTolerance { stage: &'static str, got: f64 },
    /// The Potts smoothness coefficient must be finite and non-negative.
    #[error("smoothness coefficient must be finite and non-negative (got {got})")]
    InvalidSmoothness { got: f64 },
    /// A normal-equation matrix stayed singular after pruning and retrying.
    #[error("normal equations for mixture component {component} are singular")]
    NumericSingular { component: usize },
}

impl GroundsegError {
    /// Retrieve the stable [`GroundsegErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> GroundsegErrorCode {
        match self {
            Self::InvalidSensorVariance { .. }
            | Self::InvalidSegmentationParam { .. }
            | Self::InvalidGridExtent { .. }
            | Self::InvalidCellSize { .. }
            | Self::InvalidIterationCap { .. }
            | Self::InvalidTolerance { .. }
            | Self::InvalidSmoothness { .. } => GroundsegErrorCode::Invariant,
            Self::NumericSingular { .. } => GroundsegErrorCode::NumericSingular,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, GroundsegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_share_the_invariant_code() {
        let errors = [
            GroundsegError::InvalidSensorVariance { got: 0.0 },
            GroundsegError::InvalidSegmentationParam { got: -1.0 },
            GroundsegError::InvalidGridExtent {
                axis: "x",
                min: 4.0,
                max: 0.0,
            },
            GroundsegError::InvalidCellSize { axis: "y", got: 0.0 },
            GroundsegError::InvalidIterationCap { stage: "ML" },
            GroundsegError::InvalidTolerance {
                stage: "BP",
                got: 0.0,
            },
            GroundsegError::InvalidSmoothness { got: f64::NAN },
        ];
        for error in errors {
            assert_eq!(error.code(), GroundsegErrorCode::Invariant);
            assert_eq!(error.code().as_str(), "INVARIANT");
        }
    }

    #[test]
    fn singular_regression_has_its_own_code() {
        let error = GroundsegError::NumericSingular { component: 3 };
        assert_eq!(error.code(), GroundsegErrorCode::NumericSingular);
        assert_eq!(error.code().as_str(), "NUMERIC_SINGULAR");
    }
}
