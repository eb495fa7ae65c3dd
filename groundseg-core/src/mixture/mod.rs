//! Maximum-likelihood refinement of the segmentation with a mixture of
//! planes.
//!
//! Each segmentation component seeds one mixture component: a plane
//! `z = a + b*x + c*y`, a residual variance and a mixture weight. EM then
//! alternates responsibility updates with weighted plane regressions until
//! the log-likelihood and the plane parameters stop moving. Responsibilities
//! are computed in log space and normalised with logsumexp; the values match
//! the usual linear formulation.
//!
//! Components starve in two ways. A component whose total responsibility
//! falls below a floor is pruned and the mixture weights renormalised, except
//! that the final surviving component is never pruned. A component whose
//! normal-equation matrix is singular despite sufficient support is pruned
//! once per sweep and the sweep retried; a second singularity fails the fit.

mod regression;


use rayon::prelude::*;
use tracing::debug;

use crate::{
    GroundsegError, Result,
    graph::DemGraph,
    segment::Segmentation,
};

pub use regression::Plane;

use regression::{fit_plane, solve_weighted_normal_equations};

/// Residual variances never drop below this floor.
const VARIANCE_FLOOR: f64 = 1e-9;

/// Components whose total responsibility falls below this floor are pruned.
const RESPONSIBILITY_FLOOR: f64 = 3.0;

/// Weights at or below this threshold do not count as plane support.
const SUPPORT_EPS: f64 = 1e-9;

/// A plane needs at least this many supporting cells to be determined.
const MIN_PLANE_SUPPORT: usize = 3;

/// One surviving component of the planar mixture.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaneComponent {
    /// Mixture weight; the weights of all surviving components sum to one.
    pub weight: f64,
    /// Fitted plane parameters.
    pub plane: Plane,
    /// Residual variance around the plane, floored to a small positive value.
    pub variance: f64,
}

/// Configuration of the EM loop.
#[derive(Clone, Copy, Debug)]
pub struct MixtureConfig {
    max_iterations: usize,
    tolerance: f64,
    weighted: bool,
}

impl MixtureConfig {
    /// Creates a configuration; parameters are validated by the pipeline
    /// builder.
    #[must_use]
    pub fn new(max_iterations: usize, tolerance: f64, weighted: bool) -> Self {
        Self {
            max_iterations,
            tolerance,
            weighted,
        }
    }

    /// Returns the iteration cap.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Returns the convergence tolerance.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns whether the M-step regression weights by responsibility
    /// rather than by hard assignment.
    #[must_use]
    pub fn weighted(&self) -> bool {
        self.weighted
    }
}

/// The fitted planar mixture.
#[derive(Clone, Debug, PartialEq)]
pub struct MixtureFit {
    components: Vec<PlaneComponent>,
    responsibilities: Vec<f64>,
    assignments: Vec<usize>,
    log_likelihood: f64,
    converged: bool,
    iterations: usize,
}

impl MixtureFit {
    /// Returns the surviving mixture components.
    #[must_use]
    pub fn components(&self) -> &[PlaneComponent] {
        &self.components
    }

    /// Returns the hard assignment (most responsible component) per vertex.
    #[must_use]
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    /// Returns the responsibility of component `component` for vertex
    /// `vertex`.
    #[must_use]
    pub fn responsibility(&self, vertex: usize, component: usize) -> f64 {
        self.responsibilities[vertex * self.components.len() + component]
    }

    /// Returns the final observed-data log-likelihood.
    #[must_use]
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Returns whether EM met its tolerance before the iteration cap.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Returns the number of EM sweeps performed.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Log-density of `z` under `N(mean, variance)`.
pub(crate) fn log_normal(z: f64, mean: f64, variance: f64) -> f64 {
    let residual = z - mean;
    -0.5 * (residual * residual / variance + (std::f64::consts::TAU * variance).ln())
}

pub(crate) fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Fits the planar mixture seeded by the segmentation.
///
/// # Errors
/// Returns [`GroundsegError::NumericSingular`] when a normal-equation matrix
/// stays singular after the one-shot prune-and-retry recovery.
pub fn fit_planar_mixture(
    graph: &DemGraph,
    segmentation: &Segmentation,
    config: &MixtureConfig,
) -> Result<MixtureFit> {
    let n = graph.vertex_count();
    if n == 0 {
        return Ok(MixtureFit {
            components: Vec::new(),
            responsibilities: Vec::new(),
            assignments: Vec::new(),
            log_likelihood: 0.0,
            converged: true,
            iterations: 0,
        });
    }

    let data: Vec<(f64, f64, f64)> = graph
        .vertices()
        .iter()
        .map(|v| (v.centre().x, v.centre().y, v.height()))
        .collect();

    let mut components: Vec<PlaneComponent> = segmentation
        .components()
        .iter()
        .map(|component| {
            let (plane, variance) = initial_plane(&data, component.members());
            PlaneComponent {
                weight: component.len() as f64 / n as f64,
                plane,
                variance,
            }
        })
        .collect();

    let mut responsibilities = vec![0.0; n * components.len()];
    let mut row_lse = vec![0.0; n];
    let mut log_likelihood = f64::NEG_INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < config.max_iterations {
        iterations += 1;

        expectation(&data, &components, &mut responsibilities, &mut row_lse);
        let swept_ll: f64 = row_lse.iter().sum();

        let floored = prune_starved(&mut components, &mut responsibilities, n);
        let previous: Vec<Plane> = components.iter().map(|c| c.plane).collect();
        maximisation(&data, &mut components, &mut responsibilities, config.weighted)?;

        let delta_theta = if components.len() == previous.len() {
            components
                .iter()
                .zip(&previous)
                .map(|(component, before)| component.plane.max_abs_delta(before))
                .fold(0.0f64, f64::max)
        } else {
            f64::INFINITY
        };
        let delta_ll = (swept_ll - log_likelihood).abs();
        log_likelihood = swept_ll;

        if !floored && delta_ll.max(delta_theta) < config.tolerance {
            converged = true;
            break;
        }
    }

    // One closing E-step so the reported responsibilities, assignments and
    // likelihood agree with the returned parameters.
    expectation(&data, &components, &mut responsibilities, &mut row_lse);
    log_likelihood = row_lse.iter().sum();
    let assignments = hard_assignments(&responsibilities, components.len());

    debug!(
        components = components.len(),
        iterations, converged, "planar mixture fitted"
    );

    Ok(MixtureFit {
        components,
        responsibilities,
        assignments,
        log_likelihood,
        converged,
        iterations,
    })
}

fn initial_plane(data: &[(f64, f64, f64)], members: &[usize]) -> (Plane, f64) {
    let plane = fit_plane(data, members, MIN_PLANE_SUPPORT);
    let variance = members
        .iter()
        .map(|&i| {
            let (x, y, z) = data[i];
            let residual = z - plane.height_at(x, y);
            residual * residual
        })
        .sum::<f64>()
        / members.len() as f64;
    (plane, variance.max(VARIANCE_FLOOR))
}

fn expectation(
    data: &[(f64, f64, f64)],
    components: &[PlaneComponent],
    responsibilities: &mut [f64],
    row_lse: &mut [f64],
) {
    let k_count = components.len();
    responsibilities
        .par_chunks_mut(k_count)
        .zip(row_lse.par_iter_mut())
        .zip(data.par_iter())
        .for_each(|((row, lse), &(x, y, z))| {
            for (slot, component) in row.iter_mut().zip(components) {
                *slot = component.weight.ln()
                    + log_normal(z, component.plane.height_at(x, y), component.variance);
            }
            *lse = logsumexp(row);
            for slot in row.iter_mut() {
                *slot = (*slot - *lse).exp();
            }
        });
}

/// Prunes components whose total responsibility fell below the floor and
/// renormalises. The last component always survives. Returns whether any
/// component was removed.
fn prune_starved(
    components: &mut Vec<PlaneComponent>,
    responsibilities: &mut Vec<f64>,
    n: usize,
) -> bool {
    let totals = column_totals(responsibilities, components.len(), n);
    let mut keep: Vec<bool> = totals.iter().map(|&t| t >= RESPONSIBILITY_FLOOR).collect();
    if keep.iter().all(|&k| !k) {
        // Everything starved; retain the strongest component.
        let best = totals
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(k, _)| k)
            .unwrap_or(0);
        keep[best] = true;
    }
    if keep.iter().all(|&k| k) {
        return false;
    }

    retain_columns(components, responsibilities, n, &keep);
    let weight_sum: f64 = components.iter().map(|c| c.weight).sum();
    for component in components.iter_mut() {
        component.weight /= weight_sum;
    }
    true
}

fn maximisation(
    data: &[(f64, f64, f64)],
    components: &mut Vec<PlaneComponent>,
    responsibilities: &mut Vec<f64>,
    weighted: bool,
) -> Result<()> {
    let n = data.len();
    let mut retried = false;
    loop {
        let k_count = components.len();
        let assignments = (!weighted).then(|| hard_assignments(responsibilities, k_count));
        let mut updated = Vec::with_capacity(k_count);
        let mut singular = None;

        for k in 0..k_count {
            let weights: Vec<f64> = (0..n)
                .map(|i| match &assignments {
                    Some(hard) => f64::from(u8::from(hard[i] == k)),
                    None => responsibilities[i * k_count + k],
                })
                .collect();
            let support = weights.iter().filter(|&&w| w > SUPPORT_EPS).count();

            let plane = if support < MIN_PLANE_SUPPORT {
                constant_plane(data, &weights).unwrap_or(components[k].plane)
            } else {
                match solve_weighted_normal_equations(data, &weights) {
                    Some(plane) => plane,
                    None => {
                        singular = Some(k);
                        break;
                    }
                }
            };

            let total: f64 = (0..n).map(|i| responsibilities[i * k_count + k]).sum();
            let weighted_residual: f64 = (0..n)
                .map(|i| {
                    let (x, y, z) = data[i];
                    let residual = z - plane.height_at(x, y);
                    responsibilities[i * k_count + k] * residual * residual
                })
                .sum();
            let variance = if total > 0.0 {
                (weighted_residual / total).max(VARIANCE_FLOOR)
            } else {
                VARIANCE_FLOOR
            };
            updated.push(PlaneComponent {
                weight: total / n as f64,
                plane,
                variance,
            });
        }

        match singular {
            Some(k) => {
                if retried || components.len() == 1 {
                    return Err(GroundsegError::NumericSingular { component: k });
                }
                let mut keep = vec![true; components.len()];
                keep[k] = false;
                retain_columns(components, responsibilities, n, &keep);
                retried = true;
            }
            None => {
                *components = updated;
                return Ok(());
            }
        }
    }
}

/// Weighted mean height as a degenerate plane for underdetermined
/// components.
fn constant_plane(data: &[(f64, f64, f64)], weights: &[f64]) -> Option<Plane> {
    let total: f64 = weights.iter().sum();
    (total > 0.0).then(|| {
        let mean = data
            .iter()
            .zip(weights)
            .map(|(&(_, _, z), &w)| w * z)
            .sum::<f64>()
            / total;
        Plane {
            a: mean,
            b: 0.0,
            c: 0.0,
        }
    })
}

fn column_totals(responsibilities: &[f64], k_count: usize, n: usize) -> Vec<f64> {
    let mut totals = vec![0.0; k_count];
    for i in 0..n {
        for (k, total) in totals.iter_mut().enumerate() {
            *total += responsibilities[i * k_count + k];
        }
    }
    totals
}

/// Drops the columns flagged `false` and renormalises each responsibility
/// row over the survivors.
fn retain_columns(
    components: &mut Vec<PlaneComponent>,
    responsibilities: &mut Vec<f64>,
    n: usize,
    keep: &[bool],
) {
    let old_k = components.len();
    let survivors = keep.iter().filter(|&&k| k).count();
    let mut compact = Vec::with_capacity(n * survivors);
    for i in 0..n {
        let row = &responsibilities[i * old_k..(i + 1) * old_k];
        let start = compact.len();
        for (k, &value) in row.iter().enumerate() {
            if keep[k] {
                compact.push(value);
            }
        }
        let row_sum: f64 = compact[start..].iter().sum();
        if row_sum > 0.0 {
            for value in &mut compact[start..] {
                *value /= row_sum;
            }
        } else {
            for value in &mut compact[start..] {
                *value = 1.0 / survivors as f64;
            }
        }
    }
    *responsibilities = compact;

    let mut index = 0;
    components.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
}

/// Most responsible component per vertex, ties to the lowest component id.
fn hard_assignments(responsibilities: &[f64], k_count: usize) -> Vec<usize> {
    responsibilities
        .chunks(k_count)
        .map(|row| {
            let mut best = 0;
            for (k, &value) in row.iter().enumerate() {
                if value > row[best] {
                    best = k;
                }
            }
            best
        })
        .collect()
}
