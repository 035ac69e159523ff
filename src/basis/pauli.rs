// src/basis/pauli.rs
//! Pauli operators, eigenstate projectors, and the Pauli transfer matrix
//! (PTM) representation.
//!
//! Multi-qubit operators follow the least-significant-qubit convention
//! throughout the crate: qubit 0 is the rightmost tensor factor, so the bit
//! for qubit 0 is the rightmost character of an outcome string. Tensor
//! products are therefore assembled as op(k−1) ⊗ ... ⊗ op(1) ⊗ op(0).

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::{Result, TomographyError};
use crate::linalg::{dagger, identity, kron, trace};

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// The single-qubit Pauli matrices I, X, Y, Z.
pub fn pauli_matrices() -> [Array2<Complex64>; 4] {
    let i = identity(2);
    let mut x = Array2::zeros((2, 2));
    x[[0, 1]] = c(1.0, 0.0);
    x[[1, 0]] = c(1.0, 0.0);
    let mut y = Array2::zeros((2, 2));
    y[[0, 1]] = c(0.0, -1.0);
    y[[1, 0]] = c(0.0, 1.0);
    let mut z = Array2::zeros((2, 2));
    z[[0, 0]] = c(1.0, 0.0);
    z[[1, 1]] = c(-1.0, 0.0);
    [i, x, y, z]
}

/// Density matrix (𝟙 + r·σ)/2 for a Bloch vector r.
pub fn bloch_state(rx: f64, ry: f64, rz: f64) -> Array2<Complex64> {
    let [i, x, y, z] = pauli_matrices();
    let mut rho = Array2::zeros((2, 2));
    for a in 0..2 {
        for b in 0..2 {
            rho[[a, b]] =
                (i[[a, b]] + x[[a, b]] * rx + y[[a, b]] * ry + z[[a, b]] * rz) * c(0.5, 0.0);
        }
    }
    rho
}

/// Orthonormal Pauli operator basis for `qubits` qubits: every tensor
/// product of {I, X, Y, Z}/√2, ordered with qubit 0 as the least
/// significant base-4 digit of the basis index. Orthonormal under the
/// trace inner product: Tr(Bᵢ Bⱼ) = δᵢⱼ.
pub fn pauli_operator_basis(qubits: usize) -> Vec<Array2<Complex64>> {
    let singles: Vec<Array2<Complex64>> = pauli_matrices()
        .into_iter()
        .map(|p| p.map(|x| x / 2.0_f64.sqrt()))
        .collect();

    let count = 4_usize.pow(qubits as u32);
    let mut basis = Vec::with_capacity(count);
    for index in 0..count {
        let mut digits = Vec::with_capacity(qubits);
        let mut rest = index;
        for _ in 0..qubits {
            digits.push(rest % 4);
            rest /= 4;
        }
        // digits[q] selects the Pauli on qubit q; qubit 0 is the rightmost factor
        let mut op = singles[digits[qubits - 1]].clone();
        for q in (0..qubits - 1).rev() {
            op = kron(&op, &singles[digits[q]]);
        }
        basis.push(op);
    }
    basis
}

/// Expansion coefficients of a Hermitian operator in the Pauli operator
/// basis; real for Hermitian inputs.
pub fn ptm_vector(op: &Array2<Complex64>) -> Array1<f64> {
    let qubits = (op.shape()[0] as f64).log2().round() as usize;
    let basis = pauli_operator_basis(qubits);
    let mut coords = Array1::zeros(basis.len());
    for (j, b) in basis.iter().enumerate() {
        coords[j] = trace(&b.dot(op)).re;
    }
    coords
}

/// Operator with the given Pauli-basis expansion coefficients.
pub fn operator_of_ptm_vector(coords: &Array1<f64>) -> Result<Array2<Complex64>> {
    let qubits = ((coords.len() as f64).log2() / 2.0).round() as usize;
    let basis = pauli_operator_basis(qubits);
    if basis.len() != coords.len() {
        return Err(TomographyError::DimensionMismatch {
            expected: basis.len(),
            actual: coords.len(),
        });
    }
    let dim = 1 << qubits;
    let mut op = Array2::zeros((dim, dim));
    for (j, b) in basis.iter().enumerate() {
        for a in 0..dim {
            for bb in 0..dim {
                op[[a, bb]] += b[[a, bb]] * coords[j];
            }
        }
    }
    Ok(op)
}

/// Pauli transfer matrix of a unitary: R_ij = Tr(Bᵢ U Bⱼ U†).
pub fn ptm_of_unitary(u: &Array2<Complex64>) -> Array2<f64> {
    let qubits = (u.shape()[0] as f64).log2().round() as usize;
    let basis = pauli_operator_basis(qubits);
    let u_dag = dagger(u);

    let size = basis.len();
    let mut ptm = Array2::zeros((size, size));
    for j in 0..size {
        let evolved = u.dot(&basis[j]).dot(&u_dag);
        for i in 0..size {
            ptm[[i, j]] = trace(&basis[i].dot(&evolved)).re;
        }
    }
    ptm
}

/// Choi matrix of the channel with the given PTM, laid out as
/// input ⊗ output: C = Σ_kl |k⟩⟨l| ⊗ E(|k⟩⟨l|). With this layout a
/// trace-preserving channel satisfies Tr_out(C) = 𝟙 and probabilities are
/// Tr[C (ρᵀ ⊗ E)].
pub fn choi_of_ptm(ptm: &Array2<f64>) -> Result<Array2<Complex64>> {
    let size = ptm.shape()[0];
    if ptm.shape()[1] != size {
        return Err(TomographyError::DimensionMismatch {
            expected: size,
            actual: ptm.shape()[1],
        });
    }
    let qubits = ((size as f64).log2() / 2.0).round() as usize;
    let dim = 1 << qubits;
    if size != dim * dim {
        return Err(TomographyError::InvalidValue(format!(
            "PTM side {} is not a power of four",
            size
        )));
    }

    let basis = pauli_operator_basis(qubits);
    let mut choi = Array2::zeros((dim * dim, dim * dim));

    for k in 0..dim {
        for l in 0..dim {
            // |k⟩⟨l| expanded in the Pauli basis: c_j = Tr(Bⱼ |k⟩⟨l|) = Bⱼ[l,k]
            let mut image: Array2<Complex64> = Array2::zeros((dim, dim));
            for i in 0..size {
                let mut weight = c(0.0, 0.0);
                for j in 0..size {
                    weight += basis[j][[l, k]] * ptm[[i, j]];
                }
                for a in 0..dim {
                    for b in 0..dim {
                        image[[a, b]] += basis[i][[a, b]] * weight;
                    }
                }
            }
            for a in 0..dim {
                for b in 0..dim {
                    choi[[k * dim + a, l * dim + b]] += image[[a, b]];
                }
            }
        }
    }
    Ok(choi)
}

/// Entanglement fidelity of a reconstructed Choi matrix against the ideal
/// unitary channel: ⟨ψ_U| C/d |ψ_U⟩ with |ψ_U⟩ = (𝟙 ⊗ U) Σ_k |kk⟩/√d.
pub fn entanglement_fidelity(choi: &Array2<Complex64>, target: &Array2<Complex64>) -> f64 {
    let dim = target.shape()[0];
    let mut psi = Array1::zeros(dim * dim);
    let scale = 1.0 / (dim as f64).sqrt();
    for k in 0..dim {
        for a in 0..dim {
            psi[k * dim + a] = target[[a, k]] * scale;
        }
    }

    let mut fidelity = c(0.0, 0.0);
    for i in 0..dim * dim {
        for j in 0..dim * dim {
            fidelity += psi[i].conj() * choi[[i, j]] * psi[j];
        }
    }
    (fidelity.re / dim as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{frobenius_norm, partial_trace_output};

    #[test]
    fn pauli_basis_is_orthonormal() {
        let basis = pauli_operator_basis(1);
        for (i, a) in basis.iter().enumerate() {
            for (j, b) in basis.iter().enumerate() {
                let inner = trace(&a.dot(b)).re;
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((inner - expected).abs() < 1e-12, "pair ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn ptm_of_identity_is_identity() {
        let ptm = ptm_of_unitary(&identity(2));
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((ptm[[i, j]] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn ptm_of_x_flips_y_and_z() {
        let [_, x, _, _] = pauli_matrices();
        let ptm = ptm_of_unitary(&x);
        // X: I -> I, X -> X, Y -> -Y, Z -> -Z
        let expected = [1.0, 1.0, -1.0, -1.0];
        for (k, &sign) in expected.iter().enumerate() {
            assert!((ptm[[k, k]] - sign).abs() < 1e-12);
        }
    }

    #[test]
    fn choi_of_identity_channel() {
        let choi = choi_of_ptm(&ptm_of_unitary(&identity(2))).unwrap();

        // Trace d, TP, and maximally entangled up to normalization
        assert!((trace(&choi).re - 2.0).abs() < 1e-10);
        let reduced = partial_trace_output(&choi, 2, 2).unwrap();
        let mut diff = reduced;
        for i in 0..2 {
            diff[[i, i]] -= c(1.0, 0.0);
        }
        assert!(frobenius_norm(&diff) < 1e-10);
        assert!((entanglement_fidelity(&choi, &identity(2)) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn ptm_vector_round_trip() {
        let rho = bloch_state(0.3, -0.4, 0.5);
        let coords = ptm_vector(&rho);
        let back = operator_of_ptm_vector(&coords).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert!((rho[[i, j]] - back[[i, j]]).norm() < 1e-12);
            }
        }
    }
}
