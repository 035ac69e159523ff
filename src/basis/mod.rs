// src/basis/mod.rs
//! Preparation and measurement operator bases.
//!
//! A basis is an ordered, named set of labeled single-qubit operators.
//! Multi-qubit operators are Cartesian products of single-qubit labels in
//! the least-significant-qubit convention documented in [`pauli`]: the
//! label for qubit 0 corresponds to the rightmost character of an outcome
//! string and the rightmost tensor factor of the assembled operator.

pub mod pauli;

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{Result, TomographyError};
use crate::linalg::{identity, is_hermitian, kron, trace};

const HERMITICITY_TOLERANCE: f64 = 1e-10;

/// An ordered set of labeled single-qubit preparation states.
#[derive(Debug, Clone)]
pub struct PreparationBasis {
    name: String,
    labels: Vec<String>,
    states: Vec<Array2<Complex64>>,
}

impl PreparationBasis {
    /// Build a preparation basis, validating that every state is a
    /// single-qubit density matrix.
    pub fn new(
        name: impl Into<String>,
        labels: Vec<String>,
        states: Vec<Array2<Complex64>>,
    ) -> Result<Self> {
        let name = name.into();
        if labels.len() != states.len() || labels.is_empty() {
            return Err(TomographyError::InvalidValue(format!(
                "basis '{}': {} labels for {} states",
                name,
                labels.len(),
                states.len()
            )));
        }
        for (label, state) in labels.iter().zip(states.iter()) {
            if state.shape() != [2, 2] {
                return Err(TomographyError::DimensionMismatch {
                    expected: 2,
                    actual: state.shape()[0],
                });
            }
            if !is_hermitian(state, HERMITICITY_TOLERANCE) {
                return Err(TomographyError::InvalidValue(format!(
                    "basis '{}': state '{}' is not Hermitian",
                    name, label
                )));
            }
            if (trace(state).re - 1.0).abs() > HERMITICITY_TOLERANCE {
                return Err(TomographyError::InvalidValue(format!(
                    "basis '{}': state '{}' does not have unit trace",
                    name, label
                )));
            }
        }
        Ok(PreparationBasis {
            name,
            labels,
            states,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Single-qubit state for a label.
    pub fn state(&self, label: &str) -> Result<&Array2<Complex64>> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|idx| &self.states[idx])
            .ok_or_else(|| {
                TomographyError::InvalidValue(format!(
                    "label '{}' is not in preparation basis '{}'",
                    label, self.name
                ))
            })
    }

    /// Tensor-product state for one label per qubit, qubit 0 first in the
    /// slice and rightmost in the product.
    pub fn tensor_state(&self, labels: &[String]) -> Result<Array2<Complex64>> {
        if labels.is_empty() {
            return Err(TomographyError::InvalidValue(
                "empty preparation label tuple".to_string(),
            ));
        }
        let mut op = self.state(&labels[labels.len() - 1])?.clone();
        for label in labels[..labels.len() - 1].iter().rev() {
            op = kron(&op, self.state(label)?);
        }
        Ok(op)
    }
}

/// An ordered set of labeled single-qubit measurement settings, each with
/// one effect per outcome bit.
#[derive(Debug, Clone)]
pub struct MeasurementBasis {
    name: String,
    settings: Vec<String>,
    effects: Vec<[Array2<Complex64>; 2]>,
}

impl MeasurementBasis {
    /// Build a measurement basis, validating Hermiticity and completeness:
    /// the two effects of every setting must sum to the identity.
    pub fn new(
        name: impl Into<String>,
        settings: Vec<String>,
        effects: Vec<[Array2<Complex64>; 2]>,
    ) -> Result<Self> {
        let name = name.into();
        if settings.len() != effects.len() || settings.is_empty() {
            return Err(TomographyError::InvalidValue(format!(
                "basis '{}': {} settings for {} effect pairs",
                name,
                settings.len(),
                effects.len()
            )));
        }
        for (setting, pair) in settings.iter().zip(effects.iter()) {
            let mut sum: Array2<Complex64> = Array2::zeros((2, 2));
            for effect in pair {
                if effect.shape() != [2, 2] {
                    return Err(TomographyError::DimensionMismatch {
                        expected: 2,
                        actual: effect.shape()[0],
                    });
                }
                if !is_hermitian(effect, HERMITICITY_TOLERANCE) {
                    return Err(TomographyError::InvalidValue(format!(
                        "basis '{}': setting '{}' has a non-Hermitian effect",
                        name, setting
                    )));
                }
                for i in 0..2 {
                    for j in 0..2 {
                        sum[[i, j]] += effect[[i, j]];
                    }
                }
            }
            let id = identity(2);
            for i in 0..2 {
                for j in 0..2 {
                    if (sum[[i, j]] - id[[i, j]]).norm() > HERMITICITY_TOLERANCE {
                        return Err(TomographyError::InvalidValue(format!(
                            "basis '{}': effects of setting '{}' do not sum to the identity",
                            name, setting
                        )));
                    }
                }
            }
        }
        Ok(MeasurementBasis {
            name,
            settings,
            effects,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &[String] {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Single-qubit effect for a setting and outcome bit.
    pub fn effect(&self, setting: &str, outcome: u8) -> Result<&Array2<Complex64>> {
        if outcome > 1 {
            return Err(TomographyError::InvalidValue(format!(
                "outcome bit must be 0 or 1, got {}",
                outcome
            )));
        }
        self.settings
            .iter()
            .position(|s| s == setting)
            .map(|idx| &self.effects[idx][outcome as usize])
            .ok_or_else(|| {
                TomographyError::InvalidValue(format!(
                    "setting '{}' is not in measurement basis '{}'",
                    setting, self.name
                ))
            })
    }

    /// Tensor-product effect for one setting per qubit and an outcome
    /// bit-string. The rightmost character of `outcome` is the bit of
    /// qubit 0, matching the tensor ordering of the assembled operator.
    pub fn tensor_effect(&self, settings: &[String], outcome: &str) -> Result<Array2<Complex64>> {
        let qubits = settings.len();
        if outcome.len() != qubits || qubits == 0 {
            return Err(TomographyError::DimensionMismatch {
                expected: qubits,
                actual: outcome.len(),
            });
        }
        let bits: Vec<u8> = outcome
            .chars()
            .rev()
            .map(|ch| match ch {
                '0' => Ok(0),
                '1' => Ok(1),
                other => Err(TomographyError::InvalidValue(format!(
                    "invalid outcome character '{}'",
                    other
                ))),
            })
            .collect::<Result<_>>()?;

        let mut op = self.effect(&settings[qubits - 1], bits[qubits - 1])?.clone();
        for q in (0..qubits - 1).rev() {
            op = kron(&op, self.effect(&settings[q], bits[q])?);
        }
        Ok(op)
    }
}

/// Registered preparation basis by name. Supplies the informationally
/// complete Pauli eigenstate set and the SIC tetrahedron.
pub fn preparation_basis(name: &str) -> Result<PreparationBasis> {
    match name {
        "pauli" => pauli_preparation_basis(),
        "sic" => sic_preparation_basis(),
        other => Err(TomographyError::UnknownBasis(other.to_string())),
    }
}

/// Registered measurement basis by name.
pub fn measurement_basis(name: &str) -> Result<MeasurementBasis> {
    match name {
        "pauli" => pauli_measurement_basis(),
        other => Err(TomographyError::UnknownBasis(other.to_string())),
    }
}

/// The four Pauli eigenstate preparations {|0⟩, |1⟩, |+⟩, |+i⟩}.
pub fn pauli_preparation_basis() -> Result<PreparationBasis> {
    PreparationBasis::new(
        "pauli",
        vec![
            "Zp".to_string(),
            "Zm".to_string(),
            "Xp".to_string(),
            "Yp".to_string(),
        ],
        vec![
            pauli::bloch_state(0.0, 0.0, 1.0),
            pauli::bloch_state(0.0, 0.0, -1.0),
            pauli::bloch_state(1.0, 0.0, 0.0),
            pauli::bloch_state(0.0, 1.0, 0.0),
        ],
    )
}

/// The three Pauli measurement settings with projective outcome effects.
pub fn pauli_measurement_basis() -> Result<MeasurementBasis> {
    let axes = [
        ("X", (1.0, 0.0, 0.0)),
        ("Y", (0.0, 1.0, 0.0)),
        ("Z", (0.0, 0.0, 1.0)),
    ];
    let mut settings = Vec::new();
    let mut effects = Vec::new();
    for (label, (rx, ry, rz)) in axes {
        settings.push(label.to_string());
        effects.push([
            pauli::bloch_state(rx, ry, rz),
            pauli::bloch_state(-rx, -ry, -rz),
        ]);
    }
    MeasurementBasis::new("pauli", settings, effects)
}

/// The symmetric informationally complete preparation set: four states at
/// the vertices of a regular tetrahedron on the Bloch sphere.
pub fn sic_preparation_basis() -> Result<PreparationBasis> {
    let third = 1.0 / 3.0;
    let r = (8.0_f64).sqrt() / 3.0;
    let half = (2.0 / 3.0_f64).sqrt();
    PreparationBasis::new(
        "sic",
        vec![
            "S0".to_string(),
            "S1".to_string(),
            "S2".to_string(),
            "S3".to_string(),
        ],
        vec![
            pauli::bloch_state(0.0, 0.0, 1.0),
            pauli::bloch_state(r, 0.0, -third),
            pauli::bloch_state(-r / 2.0, half, -third),
            pauli::bloch_state(-r / 2.0, -half, -third),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sic_states_have_uniform_overlap() {
        let basis = sic_preparation_basis().unwrap();
        for i in 0..4 {
            for j in 0..4 {
                if i == j {
                    continue;
                }
                let a = basis.state(&basis.labels()[i]).unwrap();
                let b = basis.state(&basis.labels()[j]).unwrap();
                let overlap = trace(&a.dot(b)).re;
                assert!((overlap - 1.0 / 3.0).abs() < 1e-10, "pair ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        let basis = pauli_preparation_basis().unwrap();
        assert!(basis.state("Qx").is_err());
    }
}
