// src/gateset/gauge.rs
//! Gauge fixing: align a raw, gauge-ambiguous gate-set estimate with its
//! ideal reference gates.
//!
//! The raw LGST output is only defined up to a similarity transform of the
//! PTM space. This module finds the transform T minimizing
//!
//!   Σ_anchors ‖T R̂ T⁻¹ − R_ideal‖² + ‖T ρ̂ − ρ_ideal‖² + ‖Ê T⁻¹ − E_ideal‖²
//!
//! by damped least squares (Levenberg–Marquardt with a numerical Jacobian),
//! starting from the identity, with a bounded iteration count and seeded
//! random-restart perturbations when the first descent stalls high.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TomographyError};
use crate::linalg::solve;

const RESTART_SEED: u64 = 0x746f6d6f;
const PERTURBATION: f64 = 0.05;
const JACOBIAN_STEP: f64 = 1e-6;
const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_GROWTH: f64 = 10.0;
const LAMBDA_SHRINK: f64 = 3.0;
const STEP_ATTEMPTS: usize = 8;

/// Bounds and tolerances for the gauge search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeOptions {
    pub max_iterations: usize,
    /// Relative objective-change tolerance declaring convergence.
    pub tolerance: f64,
    /// Perturbed re-runs attempted when the objective stalls above
    /// `restart_threshold`.
    pub restarts: usize,
    pub restart_threshold: f64,
}

impl Default for GaugeOptions {
    fn default() -> Self {
        GaugeOptions {
            max_iterations: 200,
            tolerance: 1e-10,
            restarts: 2,
            restart_threshold: 1e-8,
        }
    }
}

/// Result of the gauge search.
#[derive(Debug, Clone)]
pub struct GaugeOutcome {
    pub transform: Array2<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Optimize the similarity transform. `anchors` pairs each raw PTM with
/// its ideal reference when one exists; unreferenced gates ride along and
/// are transformed by the caller but do not constrain the gauge.
///
/// `start` is the initial transform; the engine seeds it from the ideal
/// fiducial frame so the search is a local refinement. Restarts perturb
/// that start with seeded noise when the first descent stalls high.
pub fn optimize_gauge(
    anchors: &[(Array2<f64>, Option<Array2<f64>>)],
    raw_prep: &Array1<f64>,
    ideal_prep: &Array1<f64>,
    raw_effect: &Array1<f64>,
    ideal_effect: &Array1<f64>,
    start: Array2<f64>,
    options: &GaugeOptions,
) -> Result<GaugeOutcome> {
    let dim = raw_prep.len();
    if anchors.iter().all(|(_, ideal)| ideal.is_none()) {
        return Err(TomographyError::InvalidValue(
            "gauge fixing needs at least one gate with an ideal reference".to_string(),
        ));
    }

    let problem = GaugeProblem {
        anchors,
        raw_prep,
        ideal_prep,
        raw_effect,
        ideal_effect,
        dim,
    };

    let mut best = descend(&problem, start.clone(), options);
    let mut rng = StdRng::seed_from_u64(RESTART_SEED);
    let mut attempt = 0;
    while attempt < options.restarts
        && (!best.converged || best.objective > options.restart_threshold)
    {
        let mut perturbed = start.clone();
        for value in perturbed.iter_mut() {
            *value += PERTURBATION * (rng.gen::<f64>() - 0.5);
        }
        let candidate = descend(&problem, perturbed, options);
        if candidate.objective < best.objective {
            best = candidate;
        }
        attempt += 1;
    }

    Ok(best)
}

struct GaugeProblem<'a> {
    anchors: &'a [(Array2<f64>, Option<Array2<f64>>)],
    raw_prep: &'a Array1<f64>,
    ideal_prep: &'a Array1<f64>,
    raw_effect: &'a Array1<f64>,
    ideal_effect: &'a Array1<f64>,
    dim: usize,
}

impl GaugeProblem<'_> {
    fn residual_length(&self) -> usize {
        let anchored = self
            .anchors
            .iter()
            .filter(|(_, ideal)| ideal.is_some())
            .count();
        anchored * self.dim * self.dim + 2 * self.dim
    }

    /// Residual vector at T; None when T is numerically singular.
    fn residuals(&self, transform: &Array2<f64>) -> Option<Array1<f64>> {
        let inverse = solve::invert(transform).ok()?;
        let mut residuals = Array1::zeros(self.residual_length());
        let mut slot = 0;

        for (raw, ideal) in self.anchors {
            let Some(ideal) = ideal else { continue };
            let fixed = transform.dot(raw).dot(&inverse);
            for i in 0..self.dim {
                for j in 0..self.dim {
                    residuals[slot] = fixed[[i, j]] - ideal[[i, j]];
                    slot += 1;
                }
            }
        }

        let prep = transform.dot(self.raw_prep);
        for i in 0..self.dim {
            residuals[slot] = prep[i] - self.ideal_prep[i];
            slot += 1;
        }
        let effect = self.raw_effect.dot(&inverse);
        for i in 0..self.dim {
            residuals[slot] = effect[i] - self.ideal_effect[i];
            slot += 1;
        }
        Some(residuals)
    }

    fn objective(&self, transform: &Array2<f64>) -> Option<f64> {
        self.residuals(transform).map(|r| r.dot(&r))
    }
}

/// One Levenberg–Marquardt descent from the given starting transform.
fn descend(problem: &GaugeProblem, start: Array2<f64>, options: &GaugeOptions) -> GaugeOutcome {
    let dim = problem.dim;
    let params = dim * dim;

    let mut transform = start;
    let mut objective = match problem.objective(&transform) {
        Some(value) => value,
        None => {
            return GaugeOutcome {
                transform,
                objective: f64::INFINITY,
                iterations: 0,
                converged: false,
            }
        }
    };

    let mut lambda = LAMBDA_INITIAL;
    let mut converged = false;
    let mut iterations = 0;

    for iteration in 0..options.max_iterations {
        iterations = iteration + 1;

        let residuals = match problem.residuals(&transform) {
            Some(r) => r,
            None => break,
        };

        // Numerical Jacobian, one forward difference per parameter
        let mut jacobian = Array2::zeros((residuals.len(), params));
        let mut degenerate = false;
        for p in 0..params {
            let mut perturbed = transform.clone();
            perturbed[[p / dim, p % dim]] += JACOBIAN_STEP;
            match problem.residuals(&perturbed) {
                Some(shifted) => {
                    for k in 0..residuals.len() {
                        jacobian[[k, p]] = (shifted[k] - residuals[k]) / JACOBIAN_STEP;
                    }
                }
                None => {
                    degenerate = true;
                    break;
                }
            }
        }
        if degenerate {
            break;
        }

        let normal = jacobian.t().dot(&jacobian);
        let gradient = jacobian.t().dot(&residuals);

        let mut accepted = false;
        for _ in 0..STEP_ATTEMPTS {
            let mut damped = normal.clone();
            for p in 0..params {
                damped[[p, p]] += lambda;
            }
            let Ok(step) = solve::solve_linear(&damped, &gradient) else {
                lambda *= LAMBDA_GROWTH;
                continue;
            };

            let mut candidate = transform.clone();
            for p in 0..params {
                candidate[[p / dim, p % dim]] -= step[p];
            }
            match problem.objective(&candidate) {
                Some(next) if next < objective => {
                    let change = objective - next;
                    transform = candidate;
                    objective = next;
                    lambda = (lambda / LAMBDA_SHRINK).max(1e-12);
                    accepted = true;
                    if change <= options.tolerance * objective.max(1.0) {
                        converged = true;
                    }
                    break;
                }
                _ => lambda *= LAMBDA_GROWTH,
            }
        }

        if converged {
            break;
        }
        if !accepted {
            // No downhill step at any damping: the search has stalled.
            // Stalling at a negligible objective or with a vanishing
            // gradient is convergence at a minimum.
            converged = objective <= options.restart_threshold
                || gradient.dot(&gradient).sqrt() <= 1e-8 * objective.max(1.0).sqrt();
            break;
        }
    }

    GaugeOutcome {
        transform,
        objective,
        iterations,
        converged,
    }
}
