// src/linalg/solve.rs
//! Real dense solvers: Gaussian elimination, weighted least squares via the
//! normal equations, SVD through the eigendecomposition of AᵀA, and a power
//! iteration for Lipschitz estimates.
//!
//! Everything is deterministic; repeated solves on the same inputs return
//! bit-identical results.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::eigen::hermitian_eigen;
use crate::error::{Result, TomographyError};

const PIVOT_TOLERANCE: f64 = 1e-12;

/// Solve the square system A x = b by Gaussian elimination with partial
/// pivoting. Fails on a (numerically) singular matrix.
pub fn solve_linear(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.shape()[0];
    if a.shape()[1] != n {
        return Err(TomographyError::DimensionMismatch {
            expected: n,
            actual: a.shape()[1],
        });
    }
    if b.len() != n {
        return Err(TomographyError::DimensionMismatch {
            expected: n,
            actual: b.len(),
        });
    }

    let mut m = a.clone();
    let mut rhs = b.clone();
    let scale = m.iter().map(|x| x.abs()).fold(0.0_f64, f64::max).max(1.0);

    for col in 0..n {
        // Partial pivot
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if m[[row, col]].abs() > m[[pivot_row, col]].abs() {
                pivot_row = row;
            }
        }
        if m[[pivot_row, col]].abs() < PIVOT_TOLERANCE * scale {
            return Err(TomographyError::InvalidValue(format!(
                "singular matrix: pivot {:.3e} at column {}",
                m[[pivot_row, col]], col
            )));
        }
        if pivot_row != col {
            for k in 0..n {
                let tmp = m[[col, k]];
                m[[col, k]] = m[[pivot_row, k]];
                m[[pivot_row, k]] = tmp;
            }
            rhs.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut sum = rhs[row];
        for k in (row + 1)..n {
            sum -= m[[row, k]] * x[k];
        }
        x[row] = sum / m[[row, row]];
    }
    Ok(x)
}

/// Invert a square real matrix.
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.shape()[0];
    let mut inverse = Array2::zeros((n, n));
    for col in 0..n {
        let mut e = Array1::zeros(n);
        e[col] = 1.0;
        let column = solve_linear(a, &e)?;
        for row in 0..n {
            inverse[[row, col]] = column[row];
        }
    }
    Ok(inverse)
}

/// Solve A x ≈ b in the (weighted) least-squares sense through the normal
/// equations AᵀWA x = AᵀWb. Returns the solution and the unweighted
/// residual norm ‖Ax − b‖.
pub fn least_squares(
    a: &Array2<f64>,
    b: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<(Array1<f64>, f64)> {
    let (rows, cols) = (a.shape()[0], a.shape()[1]);
    if b.len() != rows {
        return Err(TomographyError::DimensionMismatch {
            expected: rows,
            actual: b.len(),
        });
    }
    if let Some(w) = weights {
        if w.len() != rows {
            return Err(TomographyError::DimensionMismatch {
                expected: rows,
                actual: w.len(),
            });
        }
    }

    let mut normal = Array2::zeros((cols, cols));
    let mut projected = Array1::zeros(cols);
    for row in 0..rows {
        let w = weights.map_or(1.0, |w| w[row]);
        for i in 0..cols {
            let wai = w * a[[row, i]];
            projected[i] += wai * b[row];
            for j in i..cols {
                normal[[i, j]] += wai * a[[row, j]];
            }
        }
    }
    for i in 0..cols {
        for j in 0..i {
            normal[[i, j]] = normal[[j, i]];
        }
    }

    let x = solve_linear(&normal, &projected)?;

    let mut residual_sq = 0.0;
    for row in 0..rows {
        let mut predicted = 0.0;
        for i in 0..cols {
            predicted += a[[row, i]] * x[i];
        }
        residual_sq += (predicted - b[row]) * (predicted - b[row]);
    }
    Ok((x, residual_sq.sqrt()))
}

/// Singular value decomposition A = U Σ Vᵀ of a real matrix, computed from
/// the eigendecomposition of AᵀA. Singular values come out in descending
/// order; left singular vectors for values below the cutoff are zeroed.
pub struct Svd {
    pub u: Array2<f64>,
    pub singular_values: Array1<f64>,
    pub v: Array2<f64>,
}

pub fn svd(a: &Array2<f64>) -> Svd {
    let (rows, cols) = (a.shape()[0], a.shape()[1]);

    // AᵀA as a complex Hermitian matrix for the Jacobi solver
    let mut gram = Array2::<Complex64>::zeros((cols, cols));
    for i in 0..cols {
        for j in 0..cols {
            let mut sum = 0.0;
            for k in 0..rows {
                sum += a[[k, i]] * a[[k, j]];
            }
            gram[[i, j]] = Complex64::new(sum, 0.0);
        }
    }

    let (eigenvalues, eigenvectors) = hermitian_eigen(&gram);

    // Ascending eigenvalues become descending singular values
    let mut singular_values = Array1::zeros(cols);
    let mut v = Array2::zeros((cols, cols));
    for slot in 0..cols {
        let src = cols - 1 - slot;
        singular_values[slot] = eigenvalues[src].max(0.0).sqrt();
        for k in 0..cols {
            v[[k, slot]] = eigenvectors[[k, src]].re;
        }
    }

    let cutoff = singular_values[0].max(1e-300) * 1e-13;
    let mut u = Array2::zeros((rows, cols));
    for col in 0..cols {
        if singular_values[col] > cutoff {
            for row in 0..rows {
                let mut sum = 0.0;
                for k in 0..cols {
                    sum += a[[row, k]] * v[[k, col]];
                }
                u[[row, col]] = sum / singular_values[col];
            }
        }
    }

    Svd {
        u,
        singular_values,
        v,
    }
}

/// Largest eigenvalue of a symmetric positive-semidefinite matrix by power
/// iteration with a fixed deterministic start.
pub fn power_iteration(a: &Array2<f64>) -> f64 {
    let n = a.shape()[0];
    let mut v = Array1::from_elem(n, 1.0 / (n as f64).sqrt());

    let mut eigenvalue = 0.0;
    for _ in 0..100 {
        let mut next: Array1<f64> = Array1::zeros(n);
        for i in 0..n {
            for j in 0..n {
                next[i] += a[[i, j]] * v[j];
            }
        }
        let norm = next.dot(&next).sqrt();
        if norm < 1e-300 {
            return 0.0;
        }
        v = next / norm;
        eigenvalue = norm;
    }
    eigenvalue
}
