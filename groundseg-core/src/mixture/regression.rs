//! Plane regression over cell centres and posterior heights.
//!
//! Planes are fitted by solving the 3x3 weighted normal equations
//! `(X'WX) theta = X'Wz` with the design row `[1, x, y]`. The determinant
//! check treats near-singular systems (collinear support) as singular rather
//! than returning a numerically meaningless inverse.

use nalgebra::{Matrix3, Vector3};

/// Near-zero determinant threshold below which the normal equations are
/// treated as singular.
const SINGULARITY_EPS: f64 = 1e-10;

/// A ground plane `z = a + b*x + c*y`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Plane {
    /// Height offset at the origin.
    pub a: f64,
    /// Slope along the x axis.
    pub b: f64,
    /// Slope along the y axis.
    pub c: f64,
}

impl Plane {
    /// Evaluates the plane height at `(x, y)`.
    #[must_use]
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        self.a + self.b * x + self.c * y
    }

    pub(crate) fn max_abs_delta(&self, other: &Self) -> f64 {
        (self.a - other.a)
            .abs()
            .max((self.b - other.b).abs())
            .max((self.c - other.c).abs())
    }
}

fn solve(samples: impl Iterator<Item = (f64, f64, f64, f64)>) -> Option<Plane> {
    let mut xtx = Matrix3::<f64>::zeros();
    let mut xtz = Vector3::<f64>::zeros();
    for (x, y, z, w) in samples {
        let phi = Vector3::new(1.0, x, y);
        xtx += w * phi * phi.transpose();
        xtz += w * z * phi;
    }

    if xtx.determinant().abs() < SINGULARITY_EPS {
        return None;
    }
    let theta = xtx.try_inverse()? * xtz;
    Some(Plane {
        a: theta[0],
        b: theta[1],
        c: theta[2],
    })
}

/// Weighted least squares over the full data set; `None` when singular.
pub(super) fn solve_weighted_normal_equations(
    data: &[(f64, f64, f64)],
    weights: &[f64],
) -> Option<Plane> {
    solve(
        data.iter()
            .zip(weights)
            .filter(|&(_, &w)| w > 0.0)
            .map(|(&(x, y, z), &w)| (x, y, z, w)),
    )
}

/// Ordinary least squares over a member subset, degrading to the constant
/// plane at the mean height when the subset is too small or degenerate.
pub(super) fn fit_plane(data: &[(f64, f64, f64)], members: &[usize], min_support: usize) -> Plane {
    if members.len() >= min_support {
        if let Some(plane) = solve(members.iter().map(|&i| {
            let (x, y, z) = data[i];
            (x, y, z, 1.0)
        })) {
            return plane;
        }
    }
    let mean = members.iter().map(|&i| data[i].2).sum::<f64>() / members.len() as f64;
    Plane {
        a: mean,
        b: 0.0,
        c: 0.0,
    }
}
