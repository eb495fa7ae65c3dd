#![cfg(feature = "serde")]
//! Round-trip tests for the serializable result types.

use groundseg_core::{DemGrid, GridExtent, LabelMap, Plane, PlaneComponent, PointCloud};
use nalgebra::{Point2, Point3, Vector2};

#[test]
fn plane_components_round_trip_through_json() {
    let component = PlaneComponent {
        weight: 0.25,
        plane: Plane {
            a: 0.5,
            b: 0.05,
            c: -0.01,
        },
        variance: 1e-6,
    };
    let encoded = serde_json::to_string(&component).expect("component serialises");
    let decoded: PlaneComponent = serde_json::from_str(&encoded).expect("component deserialises");
    assert_eq!(decoded, component);
}

#[test]
fn dem_round_trips_with_its_cell_statistics() {
    let extent = GridExtent::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
    let mut dem = DemGrid::new(extent, Vector2::new(0.5, 0.5), 1e-4).expect("valid grid");
    dem.ingest(&PointCloud::from_points(vec![
        Point3::new(0.25, 0.25, 2.0),
        Point3::new(0.75, 0.75, 3.0),
    ]));

    let encoded = serde_json::to_string(&dem).expect("DEM serialises");
    let decoded: DemGrid = serde_json::from_str(&encoded).expect("DEM deserialises");
    assert_eq!(decoded, dem);
    assert_eq!(
        decoded.cell_at_index(0, 0).and_then(|c| c.posterior_mean()),
        Some(2.0)
    );
}

#[test]
fn label_maps_round_trip_including_unlabelled_entries() {
    let map = LabelMap::from_assignments(vec![Some(0), None, Some(1)]);
    let encoded = serde_json::to_string(&map).expect("label map serialises");
    let decoded: LabelMap = serde_json::from_str(&encoded).expect("label map deserialises");
    assert_eq!(decoded, map);
}
