// src/fit/cvx.rs
//! Constrained reconstruction: minimize ‖W(Ax − b)‖² over the
//! positive-semidefinite cone intersected with the trace constraint
//! (unit trace for states, partial-trace-to-identity for channels).
//!
//! The solve is accelerated projected gradient descent (FISTA with restart
//! on objective increase). The step size comes from a power-iteration
//! estimate of the Lipschitz constant. Projections are spectral: eigenvalue
//! simplex projection for states, and Dykstra alternation between the PSD
//! cone and the affine trace-preserving subspace for channels. On hitting
//! the iteration cap without meeting the tolerance the solver reports
//! failure; it never falls back to the unconstrained answer and never
//! clips.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::design::DesignMatrix;
use super::{FitConstraint, FitOptions};
use crate::error::{Result, TomographyError};
use crate::linalg::{
    eigen, hermitian_coordinates, hermitian_from_coordinates, identity, kron,
    partial_trace_output, solve,
};

const DYKSTRA_ITERATIONS: usize = 200;
const DYKSTRA_TOLERANCE: f64 = 1e-12;
/// Consecutive small objective changes required before declaring
/// convergence.
const SETTLE_STREAK: usize = 3;

/// Converged constrained estimate.
#[derive(Debug, Clone)]
pub struct CvxSolution {
    pub matrix: Array2<Complex64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Run the constrained solve.
pub fn solve(
    design: &DesignMatrix,
    weights: Option<&Array1<f64>>,
    constraint: FitConstraint,
    options: &FitOptions,
) -> Result<CvxSolution> {
    let rows = design.a.shape()[0];
    let columns = design.a.shape()[1];

    // Fold weights into the model: rows scaled by √w keep the objective
    // equal to the weighted sum of squares.
    let mut a = design.a.clone();
    let mut b = design.b.clone();
    if let Some(w) = weights {
        for row in 0..rows {
            let scale = w[row].max(0.0).sqrt();
            for col in 0..columns {
                a[[row, col]] *= scale;
            }
            b[row] *= scale;
        }
    }

    // Lipschitz constant of the gradient: 2 λ_max(AᵀA)
    let normal = a.t().dot(&a);
    let lipschitz = 2.0 * solve::power_iteration(&normal);
    if lipschitz <= 0.0 {
        return Err(TomographyError::InvalidValue(
            "degenerate design matrix: zero Lipschitz constant".to_string(),
        ));
    }
    let step = 1.0 / lipschitz;

    // Warm start from the projected unconstrained solution when it exists;
    // the maximally mixed point otherwise.
    let mut x = match solve::least_squares(&a, &b, None) {
        Ok((coordinates, _)) => project(&coordinates, design.dimension, constraint)?,
        Err(_) => project(
            &maximally_mixed_coordinates(design.dimension, constraint),
            design.dimension,
            constraint,
        )?,
    };

    let mut momentum = x.clone();
    let mut t: f64 = 1.0;
    let mut objective = objective_value(&a, &b, &x);
    let mut streak = 0;
    let mut iterations = 0;

    for iteration in 0..options.max_iterations {
        iterations = iteration + 1;

        let residual = a.dot(&momentum) - &b;
        let gradient = a.t().dot(&residual) * 2.0;
        let candidate = &momentum - &(gradient * step);
        let next = project(&candidate, design.dimension, constraint)?;

        let next_objective = objective_value(&a, &b, &next);
        if next_objective > objective {
            // Restart the momentum sequence from the last accepted point
            momentum = x.clone();
            t = 1.0;
            streak = 0;
            continue;
        }

        let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
        momentum = &next + &((&next - &x) * ((t - 1.0) / t_next));
        t = t_next;

        let change = objective - next_objective;
        x = next;
        objective = next_objective;

        if change <= options.convergence_tolerance * objective.max(1.0) {
            streak += 1;
            if streak >= SETTLE_STREAK {
                let matrix = hermitian_from_coordinates(&x, design.dimension)?;
                let residual_norm = unweighted_residual(design, &x);
                return Ok(CvxSolution {
                    matrix,
                    residual_norm,
                    iterations,
                });
            }
        } else {
            streak = 0;
        }
    }

    Err(TomographyError::FitConvergence {
        status: format!(
            "projected gradient hit the iteration cap with objective {:.6e}",
            objective
        ),
        iterations,
        residual: unweighted_residual(design, &x),
    })
}

fn objective_value(a: &Array2<f64>, b: &Array1<f64>, x: &Array1<f64>) -> f64 {
    let residual = a.dot(x) - b;
    residual.dot(&residual)
}

fn unweighted_residual(design: &DesignMatrix, x: &Array1<f64>) -> f64 {
    let residual = design.a.dot(x) - &design.b;
    residual.dot(&residual).sqrt()
}

fn maximally_mixed_coordinates(dimension: usize, constraint: FitConstraint) -> Array1<f64> {
    let scale = match constraint {
        FitConstraint::Density { dim } => 1.0 / dim as f64,
        FitConstraint::Channel { d_out, .. } => 1.0 / d_out as f64,
    };
    let mut matrix = identity(dimension);
    matrix.map_inplace(|v| *v *= Complex64::new(scale, 0.0));
    hermitian_coordinates(&matrix)
}

/// Project Hermitian coordinates onto the constraint set.
fn project(
    coordinates: &Array1<f64>,
    dimension: usize,
    constraint: FitConstraint,
) -> Result<Array1<f64>> {
    let matrix = hermitian_from_coordinates(coordinates, dimension)?;
    let projected = match constraint {
        FitConstraint::Density { .. } => eigen::project_density(&matrix, 1.0),
        FitConstraint::Channel { d_in, d_out } => project_channel(&matrix, d_in, d_out)?,
    };
    Ok(hermitian_coordinates(&projected))
}

/// Orthogonal projection onto the affine trace-preserving subspace
/// {C : Tr_out C = 𝟙}.
fn project_trace_preserving(
    matrix: &Array2<Complex64>,
    d_in: usize,
    d_out: usize,
) -> Result<Array2<Complex64>> {
    let mut deficit = partial_trace_output(matrix, d_in, d_out)?;
    for i in 0..d_in {
        deficit[[i, i]] -= Complex64::new(1.0, 0.0);
    }
    deficit.map_inplace(|v| *v *= Complex64::new(-1.0 / d_out as f64, 0.0));
    let correction = kron(&deficit, &identity(d_out));
    Ok(matrix + &correction)
}

/// Dykstra alternation between the PSD cone and the trace-preserving
/// subspace; converges to the projection onto their intersection.
fn project_channel(
    matrix: &Array2<Complex64>,
    d_in: usize,
    d_out: usize,
) -> Result<Array2<Complex64>> {
    let dim = d_in * d_out;
    let mut x = matrix.clone();
    let mut psd_memory: Array2<Complex64> = Array2::zeros((dim, dim));

    for _ in 0..DYKSTRA_ITERATIONS {
        let (psd, _) = eigen::project_psd(&(&x + &psd_memory));
        psd_memory = &x + &psd_memory - &psd;
        let next = project_trace_preserving(&psd, d_in, d_out)?;

        let mut drift = 0.0;
        for i in 0..dim {
            for j in 0..dim {
                drift += (next[[i, j]] - x[[i, j]]).norm_sqr();
            }
        }
        x = next;
        if drift.sqrt() <= DYKSTRA_TOLERANCE {
            break;
        }
    }
    Ok(x)
}
