// src/linalg/eigen.rs
//! Hermitian eigendecomposition and the spectral projections used by the
//! constrained fitter.
//!
//! The eigensolver is a cyclic complex Jacobi iteration: each sweep zeroes
//! every off-diagonal pair through a phased plane rotation. Convergence is
//! quadratic once the off-diagonal mass is small, and the matrices involved
//! are tiny, so no further sophistication is warranted.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::frobenius_norm;

const MAX_SWEEPS: usize = 64;
const OFF_TOLERANCE: f64 = 1e-14;

/// Eigendecomposition of a Hermitian matrix.
///
/// Returns eigenvalues in ascending order and the matching eigenvectors as
/// the columns of a unitary matrix. The input is symmetrized first so tiny
/// Hermiticity violations from accumulated round-off do not poison the
/// iteration. Each eigenvector's phase is canonicalized (largest-magnitude
/// entry real positive) so results are deterministic.
pub fn hermitian_eigen(a: &Array2<Complex64>) -> (Array1<f64>, Array2<Complex64>) {
    let dim = a.shape()[0];

    // Symmetrize: (A + A†)/2
    let mut m = Array2::<Complex64>::zeros((dim, dim));
    for i in 0..dim {
        for j in 0..dim {
            m[[i, j]] = (a[[i, j]] + a[[j, i]].conj()) * 0.5;
        }
    }

    let mut v = super::identity(dim);
    let scale = frobenius_norm(&m).max(1e-300);

    for _sweep in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for i in 0..dim {
            for j in 0..dim {
                if i != j {
                    off += m[[i, j]].norm_sqr();
                }
            }
        }
        if off.sqrt() <= OFF_TOLERANCE * scale {
            break;
        }

        for p in 0..dim {
            for q in (p + 1)..dim {
                let apq = m[[p, q]];
                let r = apq.norm();
                if r <= OFF_TOLERANCE * scale {
                    continue;
                }

                let phi = apq.arg();
                let app = m[[p, p]].re;
                let aqq = m[[q, q]].re;

                // Real Jacobi angle for the phase-stripped 2x2 block
                let tau = (aqq - app) / (2.0 * r);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    1.0 / (tau - (1.0 + tau * tau).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                let half_phase = Complex64::from_polar(1.0, phi / 2.0);
                let u_pp = half_phase * c;
                let u_pq = half_phase * s;
                let u_qp = half_phase.conj() * (-s);
                let u_qq = half_phase.conj() * c;

                // Column update: M <- M U
                for k in 0..dim {
                    let mkp = m[[k, p]];
                    let mkq = m[[k, q]];
                    m[[k, p]] = mkp * u_pp + mkq * u_qp;
                    m[[k, q]] = mkp * u_pq + mkq * u_qq;
                }
                // Row update: M <- U† M
                for k in 0..dim {
                    let mpk = m[[p, k]];
                    let mqk = m[[q, k]];
                    m[[p, k]] = u_pp.conj() * mpk + u_qp.conj() * mqk;
                    m[[q, k]] = u_pq.conj() * mpk + u_qq.conj() * mqk;
                }
                // Accumulate eigenvectors: V <- V U
                for k in 0..dim {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = vkp * u_pp + vkq * u_qp;
                    v[[k, q]] = vkp * u_pq + vkq * u_qq;
                }
            }
        }
    }

    // Sort eigenpairs ascending
    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&i, &j| m[[i, i]].re.total_cmp(&m[[j, j]].re));

    let mut eigenvalues = Array1::zeros(dim);
    let mut eigenvectors = Array2::zeros((dim, dim));
    for (slot, &idx) in order.iter().enumerate() {
        eigenvalues[slot] = m[[idx, idx]].re;

        // Canonical phase: largest-magnitude entry real positive
        let mut best = 0;
        for k in 1..dim {
            if v[[k, idx]].norm() > v[[best, idx]].norm() {
                best = k;
            }
        }
        let norm = v[[best, idx]].norm();
        let phase = if norm > 1e-300 {
            v[[best, idx]].conj() / norm
        } else {
            Complex64::new(1.0, 0.0)
        };
        for k in 0..dim {
            eigenvectors[[k, slot]] = v[[k, idx]] * phase;
        }
    }

    (eigenvalues, eigenvectors)
}

/// Smallest eigenvalue of a Hermitian matrix.
pub fn min_eigenvalue(a: &Array2<Complex64>) -> f64 {
    let (eigenvalues, _) = hermitian_eigen(a);
    eigenvalues[0]
}

/// Rebuild V diag(λ) V†.
fn recompose(eigenvalues: &Array1<f64>, eigenvectors: &Array2<Complex64>) -> Array2<Complex64> {
    let dim = eigenvalues.len();
    let mut result = Array2::zeros((dim, dim));
    for i in 0..dim {
        for j in 0..dim {
            let mut sum = Complex64::new(0.0, 0.0);
            for k in 0..dim {
                sum += eigenvectors[[i, k]] * eigenvalues[k] * eigenvectors[[j, k]].conj();
            }
            result[[i, j]] = sum;
        }
    }
    result
}

/// Project onto the positive-semidefinite cone by clipping negative
/// eigenvalues. Returns the projection and the magnitude of the most
/// negative eigenvalue (zero if already PSD).
pub fn project_psd(a: &Array2<Complex64>) -> (Array2<Complex64>, f64) {
    let (eigenvalues, eigenvectors) = hermitian_eigen(a);
    let violation = (-eigenvalues[0]).max(0.0);
    if violation == 0.0 {
        return (recompose(&eigenvalues, &eigenvectors), violation);
    }
    let clipped = eigenvalues.map(|&x| x.max(0.0));
    (recompose(&clipped, &eigenvectors), violation)
}

/// Project onto the set of density matrices: PSD with the given trace.
/// The eigenvalues are projected onto the simplex {λ ≥ 0, Σλ = total}.
pub fn project_density(a: &Array2<Complex64>, total: f64) -> Array2<Complex64> {
    let (eigenvalues, eigenvectors) = hermitian_eigen(a);
    let projected = simplex_projection(&eigenvalues.to_vec(), total);
    recompose(&Array1::from(projected), &eigenvectors)
}

/// Euclidean projection of a real vector onto the simplex
/// {x ≥ 0, Σx = total}.
pub fn simplex_projection(values: &[f64], total: f64) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut threshold = 0.0;
    for (j, &value) in sorted.iter().enumerate() {
        cumulative += value;
        let candidate = (cumulative - total) / (j + 1) as f64;
        if value - candidate > 0.0 {
            threshold = candidate;
        }
    }
    values.iter().map(|&v| (v - threshold).max(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eigen_of_pauli_x() {
        let mut x = Array2::zeros((2, 2));
        x[[0, 1]] = Complex64::new(1.0, 0.0);
        x[[1, 0]] = Complex64::new(1.0, 0.0);

        let (values, vectors) = hermitian_eigen(&x);
        assert!((values[0] + 1.0).abs() < 1e-10);
        assert!((values[1] - 1.0).abs() < 1e-10);

        // Columns are unit vectors
        for col in 0..2 {
            let norm: f64 = (0..2).map(|k| vectors[[k, col]].norm_sqr()).sum();
            assert!((norm - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn eigen_of_complex_hermitian() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = Complex64::new(1.0, 0.0);
        a[[1, 1]] = Complex64::new(-1.0, 0.0);
        a[[0, 1]] = Complex64::new(0.0, -1.0);
        a[[1, 0]] = Complex64::new(0.0, 1.0);

        // Eigenvalues of [[1, -i], [i, -1]] are ±√2
        let (values, _) = hermitian_eigen(&a);
        assert!((values[0] + 2.0_f64.sqrt()).abs() < 1e-10);
        assert!((values[1] - 2.0_f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn simplex_projection_normalizes() {
        let projected = simplex_projection(&[0.9, 0.4, -0.1], 1.0);
        let sum: f64 = projected.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(projected.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn psd_projection_clips_negative_part() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = Complex64::new(1.0, 0.0);
        a[[1, 1]] = Complex64::new(-0.25, 0.0);

        let (projected, violation) = project_psd(&a);
        assert!((violation - 0.25).abs() < 1e-12);
        assert!(min_eigenvalue(&projected) > -1e-12);
        assert!((projected[[0, 0]].re - 1.0).abs() < 1e-12);
        assert!(projected[[1, 1]].norm() < 1e-12);
    }
}
