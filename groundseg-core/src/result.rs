//! Result types for a pipeline invocation.
//!
//! A [`SurfaceAnalysis`] owns everything one `process_point_cloud` call
//! produced: the DEM, the DEM graph, the segmentation, the surviving mixture
//! components, the label map and the validity and convergence flags. All
//! accessors are read-only; each invocation builds a fresh result.

use crate::{
    dem::DemGrid,
    graph::DemGraph,
    mixture::PlaneComponent,
    segment::Segmentation,
};

/// Identifier of a surface region label.
///
/// Labels index the surviving mixture components of the analysis that
/// produced them.
///
/// # Examples
/// ```
/// use groundseg_core::SurfaceLabel;
///
/// let label = SurfaceLabel::new(2);
/// assert_eq!(label.get(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceLabel(usize);

impl SurfaceLabel {
    /// Creates a label from a component ordinal.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the underlying component ordinal.
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Mapping from DEM vertex id to a surface label.
///
/// A `None` entry marks an unlabelled vertex; the map is empty when the
/// analysis is invalid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelMap {
    labels: Vec<Option<SurfaceLabel>>,
}

impl LabelMap {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Builds a map from per-vertex label assignments; `None` entries stay
    /// unlabelled.
    #[must_use]
    pub fn from_assignments(assignments: Vec<Option<usize>>) -> Self {
        Self {
            labels: assignments
                .into_iter()
                .map(|label| label.map(SurfaceLabel::new))
                .collect(),
        }
    }

    /// Returns the label of a DEM vertex, or `None` when the vertex is
    /// unlabelled or out of range.
    #[must_use]
    pub fn label(&self, vertex: usize) -> Option<SurfaceLabel> {
        self.labels.get(vertex).copied().flatten()
    }

    /// Returns the number of entries in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns all entries, indexed by vertex id.
    #[must_use]
    pub fn entries(&self) -> &[Option<SurfaceLabel>] {
        &self.labels
    }
}

/// The complete output of one `process_point_cloud` invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceAnalysis {
    dem: DemGrid,
    graph: DemGraph,
    segmentation: Segmentation,
    mixture: Vec<PlaneComponent>,
    labels: LabelMap,
    valid: bool,
    ml_converged: bool,
    bp_converged: bool,
}

impl SurfaceAnalysis {
    pub(crate) fn new(
        dem: DemGrid,
        graph: DemGraph,
        segmentation: Segmentation,
        mixture: Vec<PlaneComponent>,
        labels: LabelMap,
        ml_converged: bool,
        bp_converged: bool,
    ) -> Self {
        let valid = !mixture.is_empty();
        Self {
            dem,
            graph,
            segmentation,
            mixture,
            labels,
            valid,
            ml_converged,
            bp_converged,
        }
    }

    pub(crate) fn invalid(dem: DemGrid, graph: DemGraph, segmentation: Segmentation) -> Self {
        Self {
            dem,
            graph,
            segmentation,
            mixture: Vec::new(),
            labels: LabelMap::empty(),
            valid: false,
            ml_converged: true,
            bp_converged: true,
        }
    }

    /// Returns the Digital Elevation Map.
    #[must_use]
    pub fn dem(&self) -> &DemGrid {
        &self.dem
    }

    /// Returns the DEM graph.
    #[must_use]
    pub fn graph(&self) -> &DemGraph {
        &self.graph
    }

    /// Returns the segmentation of the DEM graph.
    #[must_use]
    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    /// Returns the surviving mixture components.
    #[must_use]
    pub fn mixture(&self) -> &[PlaneComponent] {
        &self.mixture
    }

    /// Returns the label map; empty when the analysis is invalid.
    #[must_use]
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Returns whether at least one mixture component survived.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns whether EM met its tolerance before the iteration cap.
    #[must_use]
    pub fn ml_converged(&self) -> bool {
        self.ml_converged
    }

    /// Returns whether BP met its tolerance before the sweep cap.
    #[must_use]
    pub fn bp_converged(&self) -> bool {
        self.bp_converged
    }
}
