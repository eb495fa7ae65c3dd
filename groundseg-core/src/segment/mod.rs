//! Felzenszwalb-Huttenlocher segmentation of the DEM graph.
//!
//! Edges are processed in ascending weight order and two components merge
//! when the connecting weight does not exceed either side's internal
//! difference plus the adaptive slack `k / |C|`. Larger `k` favours larger
//! components. The edge order is total (weight, then the lexicographic
//! endpoint pair), so repeated runs over the same graph produce identical
//! partitions.

mod union_find;

use std::collections::HashMap;
use std::num::NonZeroUsize;

use rayon::prelude::*;
use tracing::debug;

use crate::graph::{DemEdge, DemGraph};

use self::union_find::DisjointSet;

/// One component of the segmentation.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentComponent {
    representative: usize,
    members: Vec<usize>,
    internal_difference: f64,
}

impl SegmentComponent {
    /// Returns the union-find representative vertex of this component.
    #[must_use]
    pub fn representative(&self) -> usize {
        self.representative
    }

    /// Returns the member vertex ids in ascending order.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Returns the component cardinality.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns whether the component has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the internal difference, the weight of the last edge merged
    /// into the component (zero for singletons).
    #[must_use]
    pub fn internal_difference(&self) -> f64 {
        self.internal_difference
    }
}

/// The partition of the DEM graph produced by [`segment_graph`].
#[derive(Clone, Debug, PartialEq)]
pub struct Segmentation {
    component_of: Vec<usize>,
    components: Vec<SegmentComponent>,
}

impl Segmentation {
    /// Returns the number of components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Returns the components, indexed by component ordinal.
    #[must_use]
    pub fn components(&self) -> &[SegmentComponent] {
        &self.components
    }

    /// Returns the component ordinal of a vertex.
    #[must_use]
    pub fn component_of(&self, vertex: usize) -> usize {
        self.component_of[vertex]
    }

    /// Returns the vertex-to-component mapping for all vertices.
    #[must_use]
    pub fn assignments(&self) -> &[usize] {
        &self.component_of
    }
}

/// Segments the DEM graph with threshold scale `k`.
///
/// When `min_component_size` is set, a post-pass re-scans the edges in
/// ascending order and merges any pair where either side is still smaller
/// than the minimum.
///
/// The caller validates `k` (finite, positive); the pipeline builder rejects
/// anything else before segmentation runs.
#[must_use]
pub fn segment_graph(
    graph: &DemGraph,
    k: f64,
    min_component_size: Option<NonZeroUsize>,
) -> Segmentation {
    let n = graph.vertex_count();
    let mut order: Vec<DemEdge> = graph.edges().to_vec();
    order.par_sort_unstable_by(|a, b| {
        a.weight()
            .total_cmp(&b.weight())
            .then_with(|| a.source().cmp(&b.source()))
            .then_with(|| a.target().cmp(&b.target()))
    });

    let mut sets = DisjointSet::new(n);
    for edge in &order {
        let left = sets.find(edge.source());
        let right = sets.find(edge.target());
        if left == right {
            continue;
        }
        let slack_left = sets.internal(left) + k / sets.size(left) as f64;
        let slack_right = sets.internal(right) + k / sets.size(right) as f64;
        if edge.weight() <= slack_left.min(slack_right) {
            sets.union(left, right, edge.weight());
        }
    }

    if let Some(min_size) = min_component_size {
        for edge in &order {
            let left = sets.find(edge.source());
            let right = sets.find(edge.target());
            if left != right
                && (sets.size(left) < min_size.get() || sets.size(right) < min_size.get())
            {
                sets.union(left, right, edge.weight());
            }
        }
    }

    let segmentation = collect_components(n, &mut sets);
    debug!(
        vertices = n,
        components = segmentation.component_count(),
        "graph segmented"
    );
    segmentation
}

fn collect_components(n: usize, sets: &mut DisjointSet) -> Segmentation {
    let mut ordinal_of_root: HashMap<usize, usize> = HashMap::new();
    let mut component_of = vec![0usize; n];
    let mut components: Vec<SegmentComponent> = Vec::new();

    for vertex in 0..n {
        let root = sets.find(vertex);
        let ordinal = *ordinal_of_root.entry(root).or_insert_with(|| {
            components.push(SegmentComponent {
                representative: root,
                members: Vec::new(),
                internal_difference: sets.internal(root),
            });
            components.len() - 1
        });
        component_of[vertex] = ordinal;
        components[ordinal].members.push(vertex);
    }

    Segmentation {
        component_of,
        components,
    }
}

#[cfg(test)]
mod tests;
