//! Point-cloud input type for the pipeline.

use nalgebra::Point3;

/// A finite sequence of 3-D sample points from a downward-facing sensor.
///
/// The pipeline treats the cloud as unordered: permuting the points changes
/// neither the DEM posteriors nor the final labelling.
///
/// # Examples
/// ```
/// use groundseg_core::PointCloud;
/// use nalgebra::Point3;
///
/// let mut cloud = PointCloud::new();
/// cloud.push(Point3::new(0.5, 0.5, 0.1));
/// assert_eq!(cloud.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point3<f64>>,
}

impl PointCloud {
    /// Creates an empty point cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing collection of points.
    #[must_use]
    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Appends a point to the cloud.
    pub fn push(&mut self, point: Point3<f64>) {
        self.points.push(point);
    }

    /// Returns the number of points in the cloud.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns whether the cloud contains no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the points as a slice.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Iterates over the points.
    pub fn iter(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.points.iter()
    }
}

impl FromIterator<Point3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl Extend<Point3<f64>> for PointCloud {
    fn extend<I: IntoIterator<Item = Point3<f64>>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}
