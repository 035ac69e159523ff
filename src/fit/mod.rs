// src/fit/mod.rs
//! Reconstruction: linear inversion, weighted least squares, and the
//! constrained (PSD / trace-preserving) solver, behind a common `Fitter`
//! interface. State and process tomography differ only in how they build
//! design rows and which physical constraint the estimate must satisfy;
//! the solver core is shared.

pub mod cvx;
pub mod design;
pub mod linear;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::basis::{MeasurementBasis, PreparationBasis};
use crate::config::{process_configurations, state_configurations, Configuration};
use crate::data::TomographyData;
use crate::error::{Result, TomographyError};
use crate::linalg::{eigen, kron, partial_trace_output, trace};

/// Reconstruction method selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Linear inversion for small dimensions, constrained solve when the
    /// unconstrained estimate leaves the physical set.
    Auto,
    /// Unweighted pseudo-inverse solve; exact inversion for a square,
    /// invertible design matrix.
    LinearInversion,
    /// Least squares honoring the configured weight scheme.
    LeastSquares,
    /// Constrained semidefinite solve.
    Cvx,
}

/// Residual weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// Uniform weights.
    None,
    /// Inverse-variance weights derived from per-configuration shot counts.
    Counts,
}

/// Options for a single `fit` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    pub method: FitMethod,
    pub weights: WeightScheme,
    /// Largest tolerated PSD violation before the auto policy escalates to
    /// the constrained solver.
    pub psd_tolerance: f64,
    /// Hilbert-space dimension at which the auto policy prefers the
    /// constrained solver outright.
    pub auto_cvx_dimension: usize,
    /// Relative objective-change tolerance for the constrained solver.
    pub convergence_tolerance: f64,
    /// Iteration cap for the constrained solver.
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            method: FitMethod::Auto,
            weights: WeightScheme::None,
            psd_tolerance: 1e-6,
            auto_cvx_dimension: 8,
            convergence_tolerance: 1e-10,
            max_iterations: 20_000,
        }
    }
}

/// Physical constraint set for the reconstructed matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitConstraint {
    /// Density matrix: PSD, unit trace.
    Density { dim: usize },
    /// Choi matrix of a channel: PSD, partial trace over the output factor
    /// equal to the identity.
    Channel { d_in: usize, d_out: usize },
}

/// Solver status attached to every fit result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// The method that actually produced the result (auto is resolved).
    pub method: FitMethod,
    /// Unweighted residual norm ‖Ax − b‖.
    pub residual_norm: f64,
    /// Magnitude of the most negative eigenvalue of the raw estimate.
    pub psd_violation: f64,
    /// Trace deviation (state) or ‖Tr_out − 𝟙‖ (channel) of the raw
    /// estimate.
    pub constraint_violation: f64,
    /// Whether the linear path clipped eigenvalues to restore positivity.
    pub clipped: bool,
    pub converged: bool,
    pub iterations: usize,
}

/// Reconstructed matrix plus solver status.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub matrix: Array2<Complex64>,
    pub diagnostics: FitDiagnostics,
}

/// Common capability of every tomography kind: build design rows, name the
/// constraint, and run the shared solver pipeline.
pub trait Fitter: Sync {
    /// Side of the reconstructed matrix.
    fn dimension(&self) -> usize;

    fn constraint(&self) -> FitConstraint;

    /// Effect operator whose trace against the unknown matrix models the
    /// probability of `outcome` under `configuration`.
    fn row_operator(
        &self,
        configuration: &Configuration,
        outcome: &str,
    ) -> Result<Array2<Complex64>>;

    /// Reconstruct from aggregated data.
    fn fit(&self, data: &TomographyData, options: &FitOptions) -> Result<FitResult>
    where
        Self: Sized,
    {
        fit_pipeline(self, data, options)
    }
}

/// State tomography over `qubits` qubits with a measurement basis.
#[derive(Debug, Clone)]
pub struct StateTomography {
    qubits: usize,
    measurement: MeasurementBasis,
}

impl StateTomography {
    pub fn new(qubits: usize, measurement: MeasurementBasis) -> Result<Self> {
        if qubits == 0 {
            return Err(TomographyError::InvalidValue(
                "state tomography needs at least one qubit".to_string(),
            ));
        }
        Ok(StateTomography {
            qubits,
            measurement,
        })
    }

    /// The full configuration set this fitter expects.
    pub fn configurations(&self) -> Vec<Configuration> {
        state_configurations(self.qubits, &self.measurement)
    }

    pub fn qubits(&self) -> usize {
        self.qubits
    }
}

impl Fitter for StateTomography {
    fn dimension(&self) -> usize {
        1 << self.qubits
    }

    fn constraint(&self) -> FitConstraint {
        FitConstraint::Density {
            dim: self.dimension(),
        }
    }

    fn row_operator(
        &self,
        configuration: &Configuration,
        outcome: &str,
    ) -> Result<Array2<Complex64>> {
        if !configuration.preparations.is_empty() {
            return Err(TomographyError::InvalidValue(format!(
                "state tomography configuration {} carries preparation labels",
                configuration
            )));
        }
        self.measurement
            .tensor_effect(&configuration.measurements, outcome)
    }
}

/// Process tomography over `qubits` qubits: reconstructs the Choi matrix
/// (input ⊗ output layout) of the channel between the prepared and the
/// measured register.
#[derive(Debug, Clone)]
pub struct ProcessTomography {
    qubits: usize,
    preparation: PreparationBasis,
    measurement: MeasurementBasis,
}

impl ProcessTomography {
    pub fn new(
        qubits: usize,
        preparation: PreparationBasis,
        measurement: MeasurementBasis,
    ) -> Result<Self> {
        if qubits == 0 {
            return Err(TomographyError::InvalidValue(
                "process tomography needs at least one qubit".to_string(),
            ));
        }
        Ok(ProcessTomography {
            qubits,
            preparation,
            measurement,
        })
    }

    pub fn configurations(&self) -> Vec<Configuration> {
        process_configurations(self.qubits, &self.preparation, &self.measurement)
    }

    pub fn qubits(&self) -> usize {
        self.qubits
    }

    fn hilbert_dimension(&self) -> usize {
        1 << self.qubits
    }
}

impl Fitter for ProcessTomography {
    fn dimension(&self) -> usize {
        let d = self.hilbert_dimension();
        d * d
    }

    fn constraint(&self) -> FitConstraint {
        let d = self.hilbert_dimension();
        FitConstraint::Channel { d_in: d, d_out: d }
    }

    fn row_operator(
        &self,
        configuration: &Configuration,
        outcome: &str,
    ) -> Result<Array2<Complex64>> {
        if configuration.preparations.len() != self.qubits {
            return Err(TomographyError::DimensionMismatch {
                expected: self.qubits,
                actual: configuration.preparations.len(),
            });
        }
        let rho = self.preparation.tensor_state(&configuration.preparations)?;
        let effect = self
            .measurement
            .tensor_effect(&configuration.measurements, outcome)?;
        // p = Tr[C (ρᵀ ⊗ E)] in the input ⊗ output Choi layout
        let rho_t = rho.t().to_owned();
        Ok(kron(&rho_t, &effect))
    }
}

/// Shared solver pipeline behind every `Fitter`.
fn fit_pipeline<F: Fitter>(
    fitter: &F,
    data: &TomographyData,
    options: &FitOptions,
) -> Result<FitResult> {
    let frequencies = data.frequencies()?;
    let design = design::build(fitter, &frequencies)?;
    let constraint = fitter.constraint();

    let weights = match options.weights {
        WeightScheme::None => None,
        WeightScheme::Counts => Some(design.shots.clone()),
    };

    match options.method {
        FitMethod::LinearInversion => {
            linear_result(&design, None, constraint, options, FitMethod::LinearInversion)
        }
        FitMethod::LeastSquares => linear_result(
            &design,
            weights.as_ref(),
            constraint,
            options,
            FitMethod::LeastSquares,
        ),
        FitMethod::Cvx => cvx_result(&design, weights.as_ref(), constraint, options),
        FitMethod::Auto => {
            if fitter.dimension() >= options.auto_cvx_dimension {
                return cvx_result(&design, weights.as_ref(), constraint, options);
            }
            let resolved = match options.weights {
                WeightScheme::None => FitMethod::LinearInversion,
                WeightScheme::Counts => FitMethod::LeastSquares,
            };
            let unconstrained =
                linear::solve(&design, weights.as_ref(), constraint)?;
            if unconstrained.psd_violation <= options.psd_tolerance {
                Ok(FitResult {
                    matrix: unconstrained.matrix,
                    diagnostics: FitDiagnostics {
                        method: resolved,
                        residual_norm: unconstrained.residual_norm,
                        psd_violation: unconstrained.psd_violation,
                        constraint_violation: unconstrained.constraint_violation,
                        clipped: false,
                        converged: true,
                        iterations: 0,
                    },
                })
            } else {
                cvx_result(&design, weights.as_ref(), constraint, options)
            }
        }
    }
}

/// Linear path: solve, then restore positivity by clipping when the raw
/// estimate violates it beyond tolerance. The clip is recorded in the
/// diagnostics, never applied silently.
fn linear_result(
    design: &design::DesignMatrix,
    weights: Option<&ndarray::Array1<f64>>,
    constraint: FitConstraint,
    options: &FitOptions,
    method: FitMethod,
) -> Result<FitResult> {
    let solution = linear::solve(design, weights, constraint)?;
    let mut matrix = solution.matrix;
    let mut clipped = false;

    if solution.psd_violation > options.psd_tolerance {
        let (projected, _) = eigen::project_psd(&matrix);
        matrix = renormalize(projected, constraint);
        clipped = true;
    }

    Ok(FitResult {
        matrix,
        diagnostics: FitDiagnostics {
            method,
            residual_norm: solution.residual_norm,
            psd_violation: solution.psd_violation,
            constraint_violation: solution.constraint_violation,
            clipped,
            converged: true,
            iterations: 0,
        },
    })
}

fn cvx_result(
    design: &design::DesignMatrix,
    weights: Option<&ndarray::Array1<f64>>,
    constraint: FitConstraint,
    options: &FitOptions,
) -> Result<FitResult> {
    let solution = cvx::solve(design, weights, constraint, options)?;
    let psd_violation = (-eigen::min_eigenvalue(&solution.matrix)).max(0.0);
    let constraint_violation = constraint_deviation(&solution.matrix, constraint)?;

    Ok(FitResult {
        matrix: solution.matrix,
        diagnostics: FitDiagnostics {
            method: FitMethod::Cvx,
            residual_norm: solution.residual_norm,
            psd_violation,
            constraint_violation,
            clipped: false,
            converged: true,
            iterations: solution.iterations,
        },
    })
}

/// Rescale a clipped estimate back onto its trace constraint.
fn renormalize(mut matrix: Array2<Complex64>, constraint: FitConstraint) -> Array2<Complex64> {
    let target = match constraint {
        FitConstraint::Density { .. } => 1.0,
        FitConstraint::Channel { d_in, .. } => d_in as f64,
    };
    let tr = trace(&matrix).re;
    if tr.abs() > 1e-12 {
        let scale = Complex64::new(target / tr, 0.0);
        matrix.map_inplace(|x| *x *= scale);
    }
    matrix
}

/// How far the estimate sits from its trace / trace-preservation
/// constraint.
pub(crate) fn constraint_deviation(
    matrix: &Array2<Complex64>,
    constraint: FitConstraint,
) -> Result<f64> {
    match constraint {
        FitConstraint::Density { .. } => Ok((trace(matrix).re - 1.0).abs()),
        FitConstraint::Channel { d_in, d_out } => {
            let mut reduced = partial_trace_output(matrix, d_in, d_out)?;
            for i in 0..d_in {
                reduced[[i, i]] -= Complex64::new(1.0, 0.0);
            }
            Ok(crate::linalg::frobenius_norm(&reduced))
        }
    }
}
