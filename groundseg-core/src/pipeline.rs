//! Stage sequencing for one pipeline invocation.
//!
//! Kept separate from the [`crate::Groundseg`] facade so the stages can be
//! exercised directly by tests: DEM accumulation, graph construction,
//! segmentation, mixture refinement and belief propagation.

use std::num::NonZeroUsize;

use nalgebra::Vector2;
use tracing::{debug, warn};

use crate::{
    PointCloud, Result,
    bp::{BpConfig, run_belief_propagation},
    dem::{DemGrid, GridExtent},
    graph::DemGraph,
    mixture::{MixtureConfig, fit_planar_mixture},
    result::{LabelMap, SurfaceAnalysis},
    segment::segment_graph,
};

/// Validated pipeline parameters shared by the builder and the facade.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PipelineConfig {
    pub(crate) extent: GridExtent,
    pub(crate) cell_size: Vector2<f64>,
    pub(crate) sensor_variance: f64,
    pub(crate) segmentation_param: f64,
    pub(crate) min_component_size: Option<NonZeroUsize>,
    pub(crate) ml_max_iterations: usize,
    pub(crate) ml_tolerance: f64,
    pub(crate) weighted: bool,
    pub(crate) bp_max_iterations: usize,
    pub(crate) bp_tolerance: f64,
    pub(crate) log_domain: bool,
    pub(crate) smoothness: f64,
}

pub(crate) fn run(config: &PipelineConfig, cloud: &PointCloud) -> Result<SurfaceAnalysis> {
    let mut dem = DemGrid::new(config.extent, config.cell_size, config.sensor_variance)?;
    let accepted = dem.ingest(cloud);

    let graph = DemGraph::from_dem(&dem);
    debug!(
        accepted,
        vertices = graph.vertex_count(),
        edges = graph.edges().len(),
        "DEM graph built"
    );
    if graph.vertex_count() == 0 {
        warn!("no points fell inside the DEM extent; returning an invalid result");
        let segmentation = segment_graph(&graph, config.segmentation_param, None);
        return Ok(SurfaceAnalysis::invalid(dem, graph, segmentation));
    }

    let segmentation = segment_graph(
        &graph,
        config.segmentation_param,
        config.min_component_size,
    );

    let ml_config = MixtureConfig::new(
        config.ml_max_iterations,
        config.ml_tolerance,
        config.weighted,
    );
    let fit = fit_planar_mixture(&graph, &segmentation, &ml_config)?;
    if !fit.converged() {
        warn!(
            iterations = fit.iterations(),
            "EM reached its iteration cap before meeting tolerance"
        );
    }
    if fit.components().is_empty() {
        return Ok(SurfaceAnalysis::invalid(dem, graph, segmentation));
    }

    let bp_config = BpConfig::new(
        config.bp_max_iterations,
        config.bp_tolerance,
        config.log_domain,
        config.smoothness,
    );
    let outcome = run_belief_propagation(&graph, &fit, &bp_config);
    if !outcome.converged() {
        warn!(
            iterations = outcome.iterations(),
            "BP reached its sweep cap before meeting tolerance"
        );
    }

    let labels = LabelMap::from_assignments(outcome.labels().to_vec());
    Ok(SurfaceAnalysis::new(
        dem,
        graph,
        segmentation,
        fit.components().to_vec(),
        labels,
        fit.converged(),
        outcome.converged(),
    ))
}
