//! Per-cell Bayesian height estimation.
//!
//! Each DEM cell fuses the height samples that project into it with a
//! conjugate Normal-mean estimator under a known sensor variance. Only the
//! sufficient statistics are stored, so updates are O(1) and the posterior
//! queries are pure functions of the accumulated state.

/// A DEM cell holding the sufficient statistics of a Bayesian Normal-mean
/// height estimator with known observation variance.
///
/// The prior is `mean ~ N(prior_mean, sensor_variance / prior_count)`. The
/// default prior pseudo-count is zero (an improper flat prior), so the first
/// observed sample sets the posterior mean directly.
///
/// # Examples
/// ```
/// use groundseg_core::Cell;
///
/// let mut cell = Cell::new(1e-4);
/// assert!(cell.is_empty());
/// cell.add_point(0.25);
/// assert_eq!(cell.posterior_mean(), Some(0.25));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    sensor_variance: f64,
    prior_count: f64,
    prior_mean: f64,
    sum: f64,
    count: usize,
}

impl Cell {
    /// Creates an empty cell with the given sensor variance and the default
    /// improper prior.
    ///
    /// The caller is responsible for validating `sensor_variance > 0`; the
    /// pipeline builder rejects non-positive values before any cell exists.
    #[must_use]
    pub fn new(sensor_variance: f64) -> Self {
        Self::with_prior(sensor_variance, 0.0, 0.0)
    }

    /// Creates an empty cell with an informative Normal prior on the height,
    /// expressed as a mean and a pseudo-count of equivalent samples.
    #[must_use]
    pub fn with_prior(sensor_variance: f64, prior_mean: f64, prior_count: f64) -> Self {
        Self {
            sensor_variance,
            prior_count: prior_count.max(0.0),
            prior_mean,
            sum: 0.0,
            count: 0,
        }
    }

    /// Folds one height sample into the sufficient statistics.
    pub fn add_point(&mut self, height: f64) {
        self.sum += height;
        self.count += 1;
    }

    /// Returns the number of samples observed by this cell.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns whether the cell has observed no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.prior_count == 0.0
    }

    /// Posterior mean of the ground height, or `None` for an empty cell.
    #[must_use]
    pub fn posterior_mean(&self) -> Option<f64> {
        let effective = self.prior_count + self.count as f64;
        (effective > 0.0).then(|| (self.prior_count * self.prior_mean + self.sum) / effective)
    }

    /// Posterior variance of the ground height, or `None` for an empty cell.
    ///
    /// Precision grows by `1 / sensor_variance` per sample, so the posterior
    /// variance is `sensor_variance / (prior_count + count)`.
    #[must_use]
    pub fn posterior_variance(&self) -> Option<f64> {
        let effective = self.prior_count + self.count as f64;
        (effective > 0.0).then(|| self.sensor_variance / effective)
    }

    /// Returns the fixed sensor variance used by this cell.
    #[must_use]
    pub fn sensor_variance(&self) -> f64 {
        self.sensor_variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[test]
    fn empty_cell_has_no_posterior() {
        let cell = Cell::new(1e-4);
        assert!(cell.is_empty());
        assert_eq!(cell.count(), 0);
        assert_eq!(cell.posterior_mean(), None);
        assert_eq!(cell.posterior_variance(), None);
    }

    #[test]
    fn first_point_sets_the_posterior_mean() {
        let mut cell = Cell::new(1e-4);
        cell.add_point(0.42);
        assert_eq!(cell.posterior_mean(), Some(0.42));
        assert_eq!(cell.posterior_variance(), Some(1e-4));
    }

    #[rstest]
    #[case(vec![0.1, 0.3], 0.2)]
    #[case(vec![1.0, 2.0, 3.0, 4.0], 2.5)]
    fn posterior_mean_is_the_sample_mean_under_flat_prior(
        #[case] samples: Vec<f64>,
        #[case] expected: f64,
    ) {
        let mut cell = Cell::new(1e-4);
        for sample in &samples {
            cell.add_point(*sample);
        }
        let mean = cell.posterior_mean().expect("cell has samples");
        assert!((mean - expected).abs() < 1e-12);
    }

    #[test]
    fn informative_prior_pulls_the_posterior_towards_its_mean() {
        let mut cell = Cell::with_prior(1e-2, 1.0, 2.0);
        assert!(!cell.is_empty());
        assert_eq!(cell.posterior_mean(), Some(1.0));

        cell.add_point(4.0);
        // (2 * 1.0 + 4.0) / (2 + 1)
        let mean = cell.posterior_mean().expect("cell has mass");
        assert!((mean - 2.0).abs() < 1e-12);
        let variance = cell.posterior_variance().expect("cell has mass");
        assert!((variance - 1e-2 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn posterior_variance_shrinks_with_sample_count() {
        let mut cell = Cell::new(1e-2);
        cell.add_point(0.0);
        let single = cell.posterior_variance().expect("one sample");
        cell.add_point(0.0);
        cell.add_point(0.0);
        cell.add_point(0.0);
        let fused = cell.posterior_variance().expect("four samples");
        assert!((single - 1e-2).abs() < 1e-15);
        assert!((fused - 2.5e-3).abs() < 1e-15);
    }
}
