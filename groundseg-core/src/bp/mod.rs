//! Loopy belief propagation over the region adjacency graph.
//!
//! Regions are the surviving mixture components; two regions are adjacent
//! when at least one DEM edge crosses between them. Sum-product messages run
//! synchronously with double buffering, so no update observes a partially
//! written sweep, and are normalised after every sweep. The pairwise factor
//! is Potts: agreement costs nothing, disagreement costs `exp(-smoothness)`.
//!
//! The same schedule runs in either the linear or the log domain. The log
//! domain replaces products by sums and marginalisation by logsumexp, which
//! keeps long unary products finite on large regions; in the linear domain a
//! vertex whose belief underflows in every label stays unlabelled.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    graph::DemGraph,
    mixture::{MixtureFit, log_normal, logsumexp},
};

/// Configuration of the belief-propagation sweep.
#[derive(Clone, Copy, Debug)]
pub struct BpConfig {
    max_iterations: usize,
    tolerance: f64,
    log_domain: bool,
    smoothness: f64,
}

impl BpConfig {
    /// Creates a configuration; parameters are validated by the pipeline
    /// builder.
    #[must_use]
    pub fn new(max_iterations: usize, tolerance: f64, log_domain: bool, smoothness: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
            log_domain,
            smoothness,
        }
    }

    /// Returns the sweep cap.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Returns the convergence tolerance on message change.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns whether messages are propagated in the log domain.
    #[must_use]
    pub fn log_domain(&self) -> bool {
        self.log_domain
    }

    /// Returns the Potts smoothness coefficient.
    #[must_use]
    pub fn smoothness(&self) -> f64 {
        self.smoothness
    }
}

/// The outcome of a belief-propagation run.
#[derive(Clone, Debug, PartialEq)]
pub struct BpOutcome {
    labels: Vec<Option<usize>>,
    converged: bool,
    iterations: usize,
}

impl BpOutcome {
    /// Returns the per-vertex labels; `None` marks an unlabelled vertex.
    #[must_use]
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Returns whether the messages met the tolerance before the sweep cap.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Returns the number of sweeps performed.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Adjacency entry of a region: the neighbouring region plus the directed
/// message slots into and out of this region along the shared edge.
#[derive(Clone, Copy, Debug)]
struct RegionLink {
    incoming: usize,
    outgoing: usize,
}

struct RegionGraph {
    /// Per region, the links to its neighbours.
    links: Vec<Vec<RegionLink>>,
    directed_edges: usize,
}

impl RegionGraph {
    fn build(graph: &DemGraph, region_of: &[usize], region_count: usize) -> Self {
        let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
        for edge in graph.edges() {
            let (u, v) = (region_of[edge.source()], region_of[edge.target()]);
            if u != v {
                pairs.insert((u.min(v), u.max(v)));
            }
        }

        let mut links = vec![Vec::new(); region_count];
        for (edge_id, &(u, v)) in pairs.iter().enumerate() {
            // Directed slots: 2*edge_id carries u -> v, its twin v -> u.
            links[u].push(RegionLink {
                incoming: 2 * edge_id + 1,
                outgoing: 2 * edge_id,
            });
            links[v].push(RegionLink {
                incoming: 2 * edge_id,
                outgoing: 2 * edge_id + 1,
            });
        }
        Self {
            directed_edges: pairs.len() * 2,
            links,
        }
    }
}

/// Runs loopy sum-product BP and derives the final per-vertex labels.
#[must_use]
pub fn run_belief_propagation(
    graph: &DemGraph,
    fit: &MixtureFit,
    config: &BpConfig,
) -> BpOutcome {
    let k_count = fit.components().len();
    let n = graph.vertex_count();
    if k_count == 0 || n == 0 {
        return BpOutcome {
            labels: vec![None; n],
            converged: true,
            iterations: 0,
        };
    }

    let region_of = fit.assignments();
    let vertex_log_unary = vertex_log_unaries(graph, fit);
    let region_log_unary = region_log_unaries(&vertex_log_unary, region_of, k_count, n);
    let regions = RegionGraph::build(graph, region_of, k_count);

    let slots = regions.directed_edges * k_count;
    let initial = if config.log_domain { 0.0 } else { 1.0 / k_count as f64 };
    let mut messages = vec![initial; slots];
    let mut next = vec![0.0; slots];

    let mut converged = false;
    let mut iterations = 0;
    while iterations < config.max_iterations {
        iterations += 1;
        sweep(
            &regions,
            &region_log_unary,
            &messages,
            &mut next,
            k_count,
            config,
        );
        let delta = messages
            .iter()
            .zip(&next)
            .map(|(old, new)| (old - new).abs())
            .fold(0.0f64, f64::max);
        std::mem::swap(&mut messages, &mut next);
        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    let labels = final_labels(
        &vertex_log_unary,
        region_of,
        &regions,
        &messages,
        k_count,
        config.log_domain,
    );
    debug!(
        regions = k_count,
        region_edges = regions.directed_edges / 2,
        iterations,
        converged,
        "belief propagation finished"
    );

    BpOutcome {
        labels,
        converged,
        iterations,
    }
}

/// Log of the mixture posterior `pi_l * N(z_i; plane_l(x, y), var_l)` for
/// every vertex and label.
fn vertex_log_unaries(graph: &DemGraph, fit: &MixtureFit) -> Vec<f64> {
    let k_count = fit.components().len();
    let mut unaries = Vec::with_capacity(graph.vertex_count() * k_count);
    for vertex in graph.vertices() {
        let (x, y, z) = (vertex.centre().x, vertex.centre().y, vertex.height());
        for component in fit.components() {
            unaries.push(
                component.weight.ln()
                    + log_normal(z, component.plane.height_at(x, y), component.variance),
            );
        }
    }
    unaries
}

/// Per-region sum of member log unaries, normalised per region so the sweep
/// arithmetic stays in range. Normalisation only rescales messages.
fn region_log_unaries(
    vertex_log_unary: &[f64],
    region_of: &[usize],
    k_count: usize,
    n: usize,
) -> Vec<f64> {
    let mut region_unary = vec![0.0; k_count * k_count];
    for i in 0..n {
        let u = region_of[i];
        for label in 0..k_count {
            region_unary[u * k_count + label] += vertex_log_unary[i * k_count + label];
        }
    }
    for row in region_unary.chunks_mut(k_count) {
        let lse = logsumexp(row);
        if lse.is_finite() {
            for value in row.iter_mut() {
                *value -= lse;
            }
        }
    }
    region_unary
}

fn sweep(
    regions: &RegionGraph,
    region_log_unary: &[f64],
    messages: &[f64],
    next: &mut [f64],
    k_count: usize,
    config: &BpConfig,
) {
    let mut base = vec![0.0; k_count];
    for (u, links) in regions.links.iter().enumerate() {
        for link in links {
            // Combine the region potential with every incoming message except
            // the one flowing back along this edge.
            for (label, slot) in base.iter_mut().enumerate() {
                *slot = region_log_unary[u * k_count + label];
                for other in links {
                    if other.incoming != link.incoming {
                        let incoming = messages[other.incoming * k_count + label];
                        *slot += if config.log_domain {
                            incoming
                        } else {
                            incoming.ln()
                        };
                    }
                }
            }

            let out = &mut next[link.outgoing * k_count..(link.outgoing + 1) * k_count];
            if config.log_domain {
                let mut scratch = vec![0.0; k_count];
                for (to, slot) in out.iter_mut().enumerate() {
                    for (from, value) in scratch.iter_mut().enumerate() {
                        *value = base[from] + if from == to { 0.0 } else { -config.smoothness };
                    }
                    *slot = logsumexp(&scratch);
                }
                let lse = logsumexp(out);
                if lse.is_finite() {
                    for slot in out.iter_mut() {
                        *slot -= lse;
                    }
                }
            } else {
                let disagreement = (-config.smoothness).exp();
                for (to, slot) in out.iter_mut().enumerate() {
                    *slot = (0..k_count)
                        .map(|from| {
                            base[from].exp() * if from == to { 1.0 } else { disagreement }
                        })
                        .sum();
                }
                let total: f64 = out.iter().sum();
                if total > 0.0 {
                    for slot in out.iter_mut() {
                        *slot /= total;
                    }
                } else {
                    for slot in out.iter_mut() {
                        *slot = 1.0 / k_count as f64;
                    }
                }
            }
        }
    }
}

/// Per-vertex argmax of the vertex unary combined with the messages entering
/// the vertex's region; ties resolve to the lowest label id.
fn final_labels(
    vertex_log_unary: &[f64],
    region_of: &[usize],
    regions: &RegionGraph,
    messages: &[f64],
    k_count: usize,
    log_domain: bool,
) -> Vec<Option<usize>> {
    region_of
        .iter()
        .enumerate()
        .map(|(i, &u)| {
            let mut best: Option<(usize, f64)> = None;
            for label in 0..k_count {
                let unary = vertex_log_unary[i * k_count + label];
                let belief = if log_domain {
                    let mut value = unary;
                    for link in &regions.links[u] {
                        value += messages[link.incoming * k_count + label];
                    }
                    value
                } else {
                    let mut value = unary.exp();
                    for link in &regions.links[u] {
                        value *= messages[link.incoming * k_count + label];
                    }
                    value
                };
                let improves = match best {
                    Some((_, current)) => belief > current,
                    None => log_domain || belief > 0.0,
                };
                if improves {
                    best = Some((label, belief));
                }
            }
            best.map(|(label, _)| label)
        })
        .collect()
}
