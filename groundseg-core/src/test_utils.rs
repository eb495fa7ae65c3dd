//! Shared helpers for unit tests.

use nalgebra::{Point2, Point3, Vector2};

use crate::{DemGraph, DemGrid, GridExtent, PointCloud};

/// Builds a DEM graph over a `width x height` field of unit cells, one
/// sample per cell centre, with heights supplied per cell index.
pub(crate) fn height_field_graph(
    width: usize,
    height: usize,
    z: impl Fn(usize, usize) -> f64,
) -> DemGraph {
    let extent = GridExtent::new(
        Point2::new(0.0, 0.0),
        Point2::new(width as f64, height as f64),
    );
    let mut dem =
        DemGrid::new(extent, Vector2::new(1.0, 1.0), 1e-4).expect("grid parameters are valid");
    let cloud: PointCloud = (0..height)
        .flat_map(|iy| {
            let z = &z;
            (0..width).map(move |ix| Point3::new(ix as f64 + 0.5, iy as f64 + 0.5, z(ix, iy)))
        })
        .collect();
    dem.ingest(&cloud);
    DemGraph::from_dem(&dem)
}
