//! Digital Elevation Map (DEM) over a regular 2-D grid.
//!
//! The DEM covers a half-open rectangular extent with fixed-size cells laid
//! out row-major. Each cell fuses the heights of the points that project into
//! it with the Bayesian estimator in [`cell`]. Points outside the extent and
//! points with non-finite coordinates are dropped silently; the ingest count
//! lets callers detect an entirely out-of-range cloud.

mod cell;

pub use cell::Cell;

use nalgebra::{Point2, Vector2};
use tracing::debug;

use crate::{GroundsegError, PointCloud, Result};

/// Half-open rectangular extent `(min_x, min_y) .. (max_x, max_y)`.
///
/// Points on the minimum edge are inside; points on the maximum edge are not.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridExtent {
    min: Point2<f64>,
    max: Point2<f64>,
}

impl GridExtent {
    /// Creates an extent from its corner coordinates.
    #[must_use]
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> Self {
        Self { min, max }
    }

    /// Returns the inclusive minimum corner.
    #[must_use]
    pub fn min(&self) -> Point2<f64> {
        self.min
    }

    /// Returns the exclusive maximum corner.
    #[must_use]
    pub fn max(&self) -> Point2<f64> {
        self.max
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (axis, min, max) in [
            ("x", self.min.x, self.max.x),
            ("y", self.min.y, self.max.y),
        ] {
            if !min.is_finite() || !max.is_finite() || max <= min {
                return Err(GroundsegError::InvalidGridExtent { axis, min, max });
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_cell_size(cell_size: Vector2<f64>) -> Result<()> {
    for (axis, got) in [("x", cell_size.x), ("y", cell_size.y)] {
        if !got.is_finite() || got <= 0.0 {
            return Err(GroundsegError::InvalidCellSize { axis, got });
        }
    }
    Ok(())
}

pub(crate) fn validate_sensor_variance(got: f64) -> Result<()> {
    if !got.is_finite() || got <= 0.0 {
        return Err(GroundsegError::InvalidSensorVariance { got });
    }
    Ok(())
}

/// A dense, row-major Digital Elevation Map.
///
/// # Examples
/// ```
/// use groundseg_core::{DemGrid, GridExtent, PointCloud};
/// use nalgebra::{Point2, Point3, Vector2};
///
/// let extent = GridExtent::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
/// let mut dem = DemGrid::new(extent, Vector2::new(0.5, 0.5), 1e-4)?;
/// let cloud = PointCloud::from_points(vec![Point3::new(0.25, 0.25, 2.0)]);
/// assert_eq!(dem.ingest(&cloud), 1);
/// let cell = dem.cell_at_index(0, 0).expect("index in range");
/// assert_eq!(cell.posterior_mean(), Some(2.0));
/// # Ok::<(), groundseg_core::GroundsegError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemGrid {
    extent: GridExtent,
    cell_size: Vector2<f64>,
    nx: usize,
    ny: usize,
    cells: Vec<Cell>,
}

impl DemGrid {
    /// Creates an empty DEM covering `extent` with the given cell size.
    ///
    /// # Errors
    /// Returns an `INVARIANT` error when the extent is degenerate, the cell
    /// size is not positive, or the sensor variance is not positive.
    pub fn new(extent: GridExtent, cell_size: Vector2<f64>, sensor_variance: f64) -> Result<Self> {
        extent.validate()?;
        validate_cell_size(cell_size)?;
        validate_sensor_variance(sensor_variance)?;

        let span = extent.max() - extent.min();
        let nx = (span.x / cell_size.x).ceil() as usize;
        let ny = (span.y / cell_size.y).ceil() as usize;
        let cells = vec![Cell::new(sensor_variance); nx * ny];

        Ok(Self {
            extent,
            cell_size,
            nx,
            ny,
            cells,
        })
    }

    /// Returns the grid extent.
    #[must_use]
    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    /// Returns the cell size per axis.
    #[must_use]
    pub fn cell_size(&self) -> Vector2<f64> {
        self.cell_size
    }

    /// Returns the grid dimensions `(Nx, Ny)`.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Returns whether a world point lies inside the half-open extent.
    ///
    /// Non-finite coordinates are never inside.
    #[must_use]
    pub fn contains(&self, point: Point2<f64>) -> bool {
        point.x >= self.extent.min.x
            && point.x < self.extent.max.x
            && point.y >= self.extent.min.y
            && point.y < self.extent.max.y
    }

    /// Maps a world point to its cell index, or `None` when out of range.
    #[must_use]
    pub fn cell_index(&self, point: Point2<f64>) -> Option<(usize, usize)> {
        if !self.contains(point) {
            return None;
        }
        // The clamp guards against floating rounding when max is not an
        // exact multiple of the cell size.
        let ix = (((point.x - self.extent.min.x) / self.cell_size.x).floor() as usize)
            .min(self.nx - 1);
        let iy = (((point.y - self.extent.min.y) / self.cell_size.y).floor() as usize)
            .min(self.ny - 1);
        Some((ix, iy))
    }

    /// Mutable access to the cell containing a world point.
    pub fn cell_at(&mut self, point: Point2<f64>) -> Option<&mut Cell> {
        let (ix, iy) = self.cell_index(point)?;
        let linear = self.linear(ix, iy);
        self.cells.get_mut(linear)
    }

    /// Returns the cell at a grid index, or `None` when out of range.
    #[must_use]
    pub fn cell_at_index(&self, ix: usize, iy: usize) -> Option<&Cell> {
        (ix < self.nx && iy < self.ny).then(|| &self.cells[self.linear(ix, iy)])
    }

    /// Returns the world coordinates of a cell centre.
    #[must_use]
    pub fn cell_centre(&self, ix: usize, iy: usize) -> Point2<f64> {
        Point2::new(
            self.extent.min.x + (ix as f64 + 0.5) * self.cell_size.x,
            self.extent.min.y + (iy as f64 + 0.5) * self.cell_size.y,
        )
    }

    /// Iterates over all cells with their grid indices, row-major.
    pub fn cells(&self) -> impl Iterator<Item = ((usize, usize), &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(linear, cell)| ((linear % self.nx, linear / self.nx), cell))
    }

    /// Projects every cloud point onto the grid and folds its height into the
    /// matching cell. Returns the number of accepted points.
    ///
    /// Out-of-range points and points with any non-finite coordinate are
    /// dropped silently.
    pub fn ingest(&mut self, cloud: &PointCloud) -> usize {
        let mut accepted = 0usize;
        for point in cloud.iter() {
            if !point.z.is_finite() {
                continue;
            }
            if let Some(cell) = self.cell_at(Point2::new(point.x, point.y)) {
                cell.add_point(point.z);
                accepted += 1;
            }
        }
        debug!(
            accepted,
            dropped = cloud.len() - accepted,
            "point cloud ingested"
        );
        accepted
    }

    pub(crate) fn linear(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx + ix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::Point3;
    use proptest::prelude::*;
    use rstest::rstest;

    fn unit_grid() -> DemGrid {
        let extent = GridExtent::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0));
        DemGrid::new(extent, Vector2::new(0.1, 0.1), 1e-4).expect("grid parameters are valid")
    }

    #[test]
    fn dimensions_round_up_to_cover_the_extent() {
        let extent = GridExtent::new(Point2::new(0.0, 0.0), Point2::new(1.0, 0.5));
        let dem = DemGrid::new(extent, Vector2::new(0.3, 0.3), 1e-4).expect("valid grid");
        assert_eq!(dem.dimensions(), (4, 2));
    }

    #[rstest]
    #[case(Point2::new(0.0, 0.0), true)]
    #[case(Point2::new(3.999, 3.999), true)]
    #[case(Point2::new(4.0, 2.0), false)]
    #[case(Point2::new(2.0, 4.0), false)]
    #[case(Point2::new(-0.001, 2.0), false)]
    fn extent_is_half_open(#[case] point: Point2<f64>, #[case] inside: bool) {
        assert_eq!(unit_grid().contains(point), inside);
    }

    #[test]
    fn nan_points_are_outside() {
        assert!(!unit_grid().contains(Point2::new(f64::NAN, 1.0)));
    }

    #[test]
    fn degenerate_extent_is_rejected() {
        let extent = GridExtent::new(Point2::new(0.0, 0.0), Point2::new(0.0, 4.0));
        let err = DemGrid::new(extent, Vector2::new(0.1, 0.1), 1e-4)
            .expect_err("zero-width extent must be rejected");
        assert!(matches!(
            err,
            GroundsegError::InvalidGridExtent { axis: "x", .. }
        ));
    }

    #[test]
    fn non_positive_sensor_variance_is_rejected() {
        let extent = GridExtent::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0));
        let err = DemGrid::new(extent, Vector2::new(0.1, 0.1), 0.0)
            .expect_err("zero sensor variance must be rejected");
        assert!(matches!(
            err,
            GroundsegError::InvalidSensorVariance { got } if got == 0.0
        ));
    }

    #[test]
    fn ingest_drops_out_of_range_and_non_finite_points() {
        let mut dem = unit_grid();
        let cloud = PointCloud::from_points(vec![
            Point3::new(1.0, 1.0, 0.5),
            Point3::new(9.0, 1.0, 0.5),
            Point3::new(1.0, 1.0, f64::NAN),
        ]);
        assert_eq!(dem.ingest(&cloud), 1);
        let (ix, iy) = dem.cell_index(Point2::new(1.0, 1.0)).expect("in range");
        let cell = dem.cell_at_index(ix, iy).expect("index valid");
        assert_eq!(cell.count(), 1);
    }

    #[test]
    fn cell_centres_sit_midway() {
        let dem = unit_grid();
        let centre = dem.cell_centre(0, 0);
        assert!((centre.x - 0.05).abs() < 1e-12);
        assert!((centre.y - 0.05).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn in_range_points_map_to_valid_indices(
            x in 0.0f64..4.0,
            y in 0.0f64..4.0,
        ) {
            let dem = unit_grid();
            let (ix, iy) = dem
                .cell_index(Point2::new(x, y))
                .expect("point is inside the extent");
            prop_assert!(ix < 40 && iy < 40);
            let centre = dem.cell_centre(ix, iy);
            prop_assert!((centre.x - x).abs() <= 0.05 + 1e-9);
            prop_assert!((centre.y - y).abs() <= 0.05 + 1e-9);
        }

        #[test]
        fn cell_statistics_are_permutation_invariant(
            samples in proptest::collection::vec(-10.0f64..10.0, 1..32).prop_shuffle(),
        ) {
            let mut sorted = samples.clone();
            sorted.sort_by(f64::total_cmp);

            let mut shuffled_cell = Cell::new(1e-4);
            let mut sorted_cell = Cell::new(1e-4);
            for sample in &samples {
                shuffled_cell.add_point(*sample);
            }
            for sample in &sorted {
                sorted_cell.add_point(*sample);
            }

            let lhs = shuffled_cell.posterior_mean().expect("non-empty");
            let rhs = sorted_cell.posterior_mean().expect("non-empty");
            prop_assert!((lhs - rhs).abs() < 1e-9);
            prop_assert_eq!(
                shuffled_cell.posterior_variance(),
                sorted_cell.posterior_variance()
            );
        }
    }
}
