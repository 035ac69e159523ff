// src/linalg/mod.rs
//! Dense linear algebra shared by every fitter.
//!
//! All operators are `ndarray` arrays of `Complex64`. The matrices in
//! tomography are small (side 4^k for k tomography qubits) so the kernels
//! stay explicit and loop-based, which keeps the numerics easy to audit.

pub mod eigen;
pub mod solve;

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::{Result, TomographyError};

/// Complex identity matrix of the given dimension.
pub fn identity(dim: usize) -> Array2<Complex64> {
    Array2::from_diag(&Array1::from_elem(dim, Complex64::new(1.0, 0.0)))
}

/// Kronecker product a ⊗ b.
pub fn kron(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    let (ar, ac) = (a.shape()[0], a.shape()[1]);
    let (br, bc) = (b.shape()[0], b.shape()[1]);

    let mut result = Array2::zeros((ar * br, ac * bc));
    for i in 0..ar {
        for j in 0..ac {
            for k in 0..br {
                for l in 0..bc {
                    result[[i * br + k, j * bc + l]] = a[[i, j]] * b[[k, l]];
                }
            }
        }
    }
    result
}

/// Conjugate transpose a†.
pub fn dagger(a: &Array2<Complex64>) -> Array2<Complex64> {
    a.t().map(|x| x.conj())
}

/// Matrix trace.
pub fn trace(a: &Array2<Complex64>) -> Complex64 {
    let mut sum = Complex64::new(0.0, 0.0);
    for i in 0..a.shape()[0].min(a.shape()[1]) {
        sum += a[[i, i]];
    }
    sum
}

/// Frobenius norm.
pub fn frobenius_norm(a: &Array2<Complex64>) -> f64 {
    a.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt()
}

/// Check Hermiticity within tolerance.
pub fn is_hermitian(a: &Array2<Complex64>, tolerance: f64) -> bool {
    let dim = a.shape()[0];
    if a.shape()[1] != dim {
        return false;
    }
    for i in 0..dim {
        for j in 0..=i {
            if (a[[i, j]] - a[[j, i]].conj()).norm() > tolerance {
                return false;
            }
        }
    }
    true
}

/// Partial trace over the output (second) factor of a Choi matrix laid out
/// as input ⊗ output. For a trace-preserving channel the result is the
/// identity on the input space.
pub fn partial_trace_output(
    choi: &Array2<Complex64>,
    d_in: usize,
    d_out: usize,
) -> Result<Array2<Complex64>> {
    let dim = d_in * d_out;
    if choi.shape() != [dim, dim] {
        return Err(TomographyError::DimensionMismatch {
            expected: dim,
            actual: choi.shape()[0],
        });
    }

    let mut result = Array2::zeros((d_in, d_in));
    for k in 0..d_in {
        for l in 0..d_in {
            let mut sum = Complex64::new(0.0, 0.0);
            for m in 0..d_out {
                sum += choi[[k * d_out + m, l * d_out + m]];
            }
            result[[k, l]] = sum;
        }
    }
    Ok(result)
}

/// Number of real coordinates parameterizing a Hermitian matrix of the
/// given dimension.
pub fn hermitian_parameter_count(dim: usize) -> usize {
    dim * dim
}

/// Coordinates of a Hermitian operator in the orthonormal Hermitian basis
/// used by the fitters: `dim` diagonal units first, then for each pair
/// i < j the symmetric element (E_ij + E_ji)/√2 followed by the
/// antisymmetric element i(E_ij − E_ji)/√2.
///
/// Because the basis is orthonormal under the trace inner product,
/// Tr(S · X) is exactly the dot product of the coordinate vectors, which
/// is what makes the design matrix real.
pub fn hermitian_coordinates(op: &Array2<Complex64>) -> Array1<f64> {
    let dim = op.shape()[0];
    let sqrt2 = 2.0_f64.sqrt();
    let mut coords = Array1::zeros(dim * dim);

    for i in 0..dim {
        coords[i] = op[[i, i]].re;
    }
    let mut k = dim;
    for i in 0..dim {
        for j in (i + 1)..dim {
            coords[k] = sqrt2 * op[[i, j]].re;
            coords[k + 1] = sqrt2 * op[[i, j]].im;
            k += 2;
        }
    }
    coords
}

/// Inverse of [`hermitian_coordinates`]: assemble the Hermitian matrix with
/// the given coordinates.
pub fn hermitian_from_coordinates(coords: &Array1<f64>, dim: usize) -> Result<Array2<Complex64>> {
    if coords.len() != dim * dim {
        return Err(TomographyError::DimensionMismatch {
            expected: dim * dim,
            actual: coords.len(),
        });
    }

    let inv_sqrt2 = 1.0 / 2.0_f64.sqrt();
    let mut op = Array2::zeros((dim, dim));
    for i in 0..dim {
        op[[i, i]] = Complex64::new(coords[i], 0.0);
    }
    let mut k = dim;
    for i in 0..dim {
        for j in (i + 1)..dim {
            let value = Complex64::new(coords[k] * inv_sqrt2, coords[k + 1] * inv_sqrt2);
            op[[i, j]] = value;
            op[[j, i]] = value.conj();
            k += 2;
        }
    }
    Ok(op)
}

/// Fidelity ⟨ψ|ρ|ψ⟩ of a state against a pure target.
pub fn pure_state_fidelity(rho: &Array2<Complex64>, psi: &Array1<Complex64>) -> f64 {
    let dim = rho.shape()[0];
    let mut fidelity = Complex64::new(0.0, 0.0);
    for i in 0..dim {
        for j in 0..dim {
            fidelity += psi[i].conj() * rho[[i, j]] * psi[j];
        }
    }
    fidelity.re.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn hermitian_coordinates_round_trip() {
        let mut op = Array2::zeros((2, 2));
        op[[0, 0]] = Complex64::new(0.7, 0.0);
        op[[1, 1]] = Complex64::new(0.3, 0.0);
        op[[0, 1]] = Complex64::new(0.1, -0.2);
        op[[1, 0]] = Complex64::new(0.1, 0.2);

        let coords = hermitian_coordinates(&op);
        let back = hermitian_from_coordinates(&coords, 2).unwrap();

        for i in 0..2 {
            for j in 0..2 {
                assert!((op[[i, j]] - back[[i, j]]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn coordinates_preserve_trace_inner_product() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = Complex64::new(0.5, 0.0);
        a[[1, 1]] = Complex64::new(0.5, 0.0);
        a[[0, 1]] = Complex64::new(0.5, 0.0);
        a[[1, 0]] = Complex64::new(0.5, 0.0);

        let mut b = Array2::zeros((2, 2));
        b[[0, 0]] = Complex64::new(1.0, 0.0);
        b[[0, 1]] = Complex64::new(0.0, -0.3);
        b[[1, 0]] = Complex64::new(0.0, 0.3);

        let inner = trace(&a.dot(&b)).re;
        let dot = hermitian_coordinates(&a).dot(&hermitian_coordinates(&b));
        assert!(approx(inner, dot));
    }

    #[test]
    fn partial_trace_of_identity_choi() {
        // Choi of the identity channel: Σ_kl |k⟩⟨l| ⊗ |k⟩⟨l|
        let mut choi = Array2::zeros((4, 4));
        for k in 0..2 {
            for l in 0..2 {
                choi[[k * 2 + k, l * 2 + l]] = Complex64::new(1.0, 0.0);
            }
        }
        let reduced = partial_trace_output(&choi, 2, 2).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((reduced[[i, j]] - Complex64::new(expected, 0.0)).norm() < 1e-12);
            }
        }
    }
}
