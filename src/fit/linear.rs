// src/fit/linear.rs
//! Unconstrained reconstruction: ordinary or weighted least squares on the
//! real design matrix. Exact linear inversion falls out when the design is
//! square and invertible. The estimate is Hermitian by construction and
//! trace-normalized for states, but nothing here enforces positivity; the
//! caller decides whether to clip or escalate to the constrained solver.

use ndarray::Array1;
use num_complex::Complex64;

use super::design::DesignMatrix;
use super::{constraint_deviation, FitConstraint};
use crate::error::Result;
use crate::linalg::{eigen, hermitian_from_coordinates, solve, trace};

/// Raw least-squares estimate plus the violation magnitudes the caller
/// needs for the auto policy and for diagnostics.
#[derive(Debug, Clone)]
pub struct LinearSolution {
    pub matrix: ndarray::Array2<Complex64>,
    pub residual_norm: f64,
    pub psd_violation: f64,
    pub constraint_violation: f64,
}

/// Solve A x ≈ b and assemble the Hermitian estimate.
pub fn solve(
    design: &DesignMatrix,
    weights: Option<&Array1<f64>>,
    constraint: FitConstraint,
) -> Result<LinearSolution> {
    let (coordinates, residual_norm) = solve::least_squares(&design.a, &design.b, weights)?;
    let mut matrix = hermitian_from_coordinates(&coordinates, design.dimension)?;

    // The constraint deviation is measured on the raw solve; states are
    // then renormalized to unit trace so downstream fidelities are
    // comparable.
    let constraint_violation = constraint_deviation(&matrix, constraint)?;
    if let FitConstraint::Density { .. } = constraint {
        let tr = trace(&matrix).re;
        if tr.abs() > 1e-12 {
            let scale = Complex64::new(1.0 / tr, 0.0);
            matrix.map_inplace(|x| *x *= scale);
        }
    }

    let psd_violation = (-eigen::min_eigenvalue(&matrix)).max(0.0);

    Ok(LinearSolution {
        matrix,
        residual_norm,
        psd_violation,
        constraint_violation,
    })
}
