//! Groundseg core library.
//!
//! Segments the ground surface observed by a downward-facing 3-D sensor into
//! coherent planar regions (road, curb, sidewalk). One
//! [`Groundseg::process_point_cloud`] call runs the full pipeline: Bayesian
//! DEM accumulation, an 8-connected dissimilarity graph, adaptive graph
//! segmentation, planar-mixture EM refinement and loopy belief propagation
//! over the region adjacency graph.

mod bp;
mod builder;
mod dem;
mod error;
mod graph;
mod groundseg;
mod mixture;
mod pipeline;
mod point_cloud;
mod result;
mod segment;

pub use crate::{
    bp::{BpConfig, BpOutcome, run_belief_propagation},
    builder::GroundsegBuilder,
    dem::{Cell, DemGrid, GridExtent},
    error::{GroundsegError, GroundsegErrorCode, Result},
    graph::{DemEdge, DemGraph, DemVertex},
    groundseg::Groundseg,
    mixture::{MixtureConfig, MixtureFit, Plane, PlaneComponent, fit_planar_mixture},
    point_cloud::PointCloud,
    result::{LabelMap, SurfaceAnalysis, SurfaceLabel},
    segment::{SegmentComponent, Segmentation, segment_graph},
};

#[cfg(test)]
pub(crate) mod test_utils;
