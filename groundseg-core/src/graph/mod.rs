//! Weighted 8-connected graph over the non-empty DEM cells.
//!
//! Vertices are the cells that received at least one point, in row-major
//! order. Each unordered pair of 8-neighbouring vertices contributes exactly
//! one edge in canonical `source < target` form; the weight is the
//! standardised difference of the two posterior height distributions. Cells
//! without a non-empty neighbour remain as isolated vertices. Adjacency is
//! stored CSR-style so segmentation and belief propagation can walk
//! neighbourhoods without chasing pointers.

use nalgebra::Point2;

use crate::dem::DemGrid;

/// A vertex of the DEM graph: one non-empty cell with its posterior summary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemVertex {
    grid_index: (usize, usize),
    centre: Point2<f64>,
    height: f64,
    variance: f64,
}

impl DemVertex {
    /// Returns the `(ix, iy)` grid index of the underlying cell.
    #[must_use]
    pub fn grid_index(&self) -> (usize, usize) {
        self.grid_index
    }

    /// Returns the world coordinates of the cell centre.
    #[must_use]
    pub fn centre(&self) -> Point2<f64> {
        self.centre
    }

    /// Returns the posterior mean height of the cell.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Returns the posterior height variance of the cell.
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

/// An undirected DEM edge in canonical form (`source < target`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemEdge {
    source: usize,
    target: usize,
    weight: f64,
}

impl DemEdge {
    /// Returns the smaller endpoint id.
    #[must_use]
    pub fn source(&self) -> usize {
        self.source
    }

    /// Returns the larger endpoint id.
    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Returns the dissimilarity weight.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// The weighted 8-connected graph over non-empty DEM cells.
#[derive(Clone, Debug, PartialEq)]
pub struct DemGraph {
    vertices: Vec<DemVertex>,
    edges: Vec<DemEdge>,
    offsets: Vec<usize>,
    adjacency: Vec<(usize, usize)>,
}

// Forward half of the 8-neighbourhood; scanning row-major with these offsets
// visits every unordered neighbour pair exactly once.
const FORWARD_NEIGHBOURS: [(isize, isize); 4] = [(1, 0), (-1, 1), (0, 1), (1, 1)];

impl DemGraph {
    /// Builds the graph from the non-empty cells of a DEM.
    #[must_use]
    pub fn from_dem(dem: &DemGrid) -> Self {
        let (nx, ny) = dem.dimensions();
        let mut vertices = Vec::new();
        let mut vertex_of: Vec<Option<usize>> = vec![None; nx * ny];

        for ((ix, iy), cell) in dem.cells() {
            let (Some(height), Some(variance)) = (cell.posterior_mean(), cell.posterior_variance())
            else {
                continue;
            };
            vertex_of[dem.linear(ix, iy)] = Some(vertices.len());
            vertices.push(DemVertex {
                grid_index: (ix, iy),
                centre: dem.cell_centre(ix, iy),
                height,
                variance,
            });
        }

        let mut edges = Vec::new();
        for (source, vertex) in vertices.iter().enumerate() {
            let (ix, iy) = vertex.grid_index;
            for (dx, dy) in FORWARD_NEIGHBOURS {
                let (jx, jy) = (ix as isize + dx, iy as isize + dy);
                if jx < 0 || jy < 0 || jx as usize >= nx || jy as usize >= ny {
                    continue;
                }
                let Some(target) = vertex_of[dem.linear(jx as usize, jy as usize)] else {
                    continue;
                };
                let other = &vertices[target];
                let weight =
                    (vertex.height - other.height).abs() / (vertex.variance + other.variance).sqrt();
                edges.push(DemEdge {
                    source,
                    target,
                    weight,
                });
            }
        }

        let (offsets, adjacency) = build_adjacency(vertices.len(), &edges);
        Self {
            vertices,
            edges,
            offsets,
            adjacency,
        }
    }

    /// Returns the number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns all vertices, indexed by vertex id.
    #[must_use]
    pub fn vertices(&self) -> &[DemVertex] {
        &self.vertices
    }

    /// Returns the vertex with the given id, or `None` when out of range.
    #[must_use]
    pub fn vertex(&self, id: usize) -> Option<&DemVertex> {
        self.vertices.get(id)
    }

    /// Returns all edges in canonical form.
    #[must_use]
    pub fn edges(&self) -> &[DemEdge] {
        &self.edges
    }

    /// Returns the `(neighbour, edge id)` pairs incident to a vertex.
    #[must_use]
    pub fn neighbours(&self, vertex: usize) -> &[(usize, usize)] {
        &self.adjacency[self.offsets[vertex]..self.offsets[vertex + 1]]
    }
}

fn build_adjacency(vertex_count: usize, edges: &[DemEdge]) -> (Vec<usize>, Vec<(usize, usize)>) {
    let mut offsets = vec![0usize; vertex_count + 1];
    for edge in edges {
        offsets[edge.source + 1] += 1;
        offsets[edge.target + 1] += 1;
    }
    for i in 1..offsets.len() {
        offsets[i] += offsets[i - 1];
    }

    let mut cursor = offsets.clone();
    let mut adjacency = vec![(0usize, 0usize); edges.len() * 2];
    for (edge_id, edge) in edges.iter().enumerate() {
        adjacency[cursor[edge.source]] = (edge.target, edge_id);
        cursor[edge.source] += 1;
        adjacency[cursor[edge.target]] = (edge.source, edge_id);
        cursor[edge.target] += 1;
    }
    (offsets, adjacency)
}
