// src/config/mod.rs
//! Configuration generation: the deterministic, duplicate-free set of
//! (preparation, measurement) tuples an experiment must execute, and the
//! register layout describing which physical qubits they act on.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::basis::{MeasurementBasis, PreparationBasis};
use crate::error::{Result, TomographyError};

/// One tomography circuit setting: a preparation label and a measurement
/// setting per tomography qubit. Preparations are empty for state
/// tomography. Label index 0 refers to qubit 0 (least significant bit of
/// outcome strings).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub preparations: Vec<String>,
    pub measurements: Vec<String>,
}

impl Configuration {
    /// Measurement-only configuration for state tomography.
    pub fn measurement(measurements: Vec<String>) -> Self {
        Configuration {
            preparations: Vec::new(),
            measurements,
        }
    }

    /// Number of tomography qubits this configuration addresses.
    pub fn qubit_count(&self) -> usize {
        self.measurements.len()
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.preparations.is_empty() {
            write!(f, "meas({})", self.measurements.join(","))
        } else {
            write!(
                f,
                "prep({})|meas({})",
                self.preparations.join(","),
                self.measurements.join(",")
            )
        }
    }
}

/// Ancilla postselection: keep only outcomes whose classical `bit` equals
/// `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postselection {
    pub bit: usize,
    pub accept: u8,
}

/// Physical placement of a tomography experiment on a wider register.
///
/// `qubits` are the preparation targets; `measured_qubits`, when present,
/// route the measurement to physically different qubits (process
/// tomography through a permutation-like channel). Qubits outside the
/// selection are neither prepared nor measured; the aggregator
/// marginalizes their outcome bits away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomographyLayout {
    register_size: usize,
    qubits: Vec<usize>,
    measured_qubits: Option<Vec<usize>>,
    postselection: Option<Postselection>,
}

impl TomographyLayout {
    /// Layout covering the whole register: tomography on qubits 0..k.
    pub fn full(qubits: usize) -> Self {
        TomographyLayout {
            register_size: qubits,
            qubits: (0..qubits).collect(),
            measured_qubits: None,
            postselection: None,
        }
    }

    /// Layout over a subset of a wider register.
    pub fn reduced(register_size: usize, qubits: Vec<usize>) -> Result<Self> {
        validate_subset(register_size, &qubits)?;
        Ok(TomographyLayout {
            register_size,
            qubits,
            measured_qubits: None,
            postselection: None,
        })
    }

    /// Route measurement to different physical qubits than preparation.
    pub fn with_measured_qubits(mut self, measured: Vec<usize>) -> Result<Self> {
        validate_subset(self.register_size, &measured)?;
        if measured.len() != self.qubits.len() {
            return Err(TomographyError::DimensionMismatch {
                expected: self.qubits.len(),
                actual: measured.len(),
            });
        }
        self.measured_qubits = Some(measured);
        Ok(self)
    }

    /// Condition on an ancilla classical bit.
    pub fn with_postselection(mut self, bit: usize, accept: u8) -> Result<Self> {
        if bit >= self.register_size {
            return Err(TomographyError::InvalidValue(format!(
                "postselection bit {} outside register of size {}",
                bit, self.register_size
            )));
        }
        if accept > 1 {
            return Err(TomographyError::InvalidValue(format!(
                "postselection accept value must be 0 or 1, got {}",
                accept
            )));
        }
        self.postselection = Some(Postselection { bit, accept });
        Ok(self)
    }

    pub fn register_size(&self) -> usize {
        self.register_size
    }

    /// Preparation targets.
    pub fn qubits(&self) -> &[usize] {
        &self.qubits
    }

    /// Measurement targets; identical to the preparation targets unless
    /// remapped.
    pub fn measured_qubits(&self) -> &[usize] {
        self.measured_qubits.as_deref().unwrap_or(&self.qubits)
    }

    pub fn postselection(&self) -> Option<Postselection> {
        self.postselection
    }

    /// Number of tomography qubits.
    pub fn width(&self) -> usize {
        self.qubits.len()
    }
}

fn validate_subset(register_size: usize, qubits: &[usize]) -> Result<()> {
    if qubits.is_empty() {
        return Err(TomographyError::InvalidValue(
            "tomography qubit selection is empty".to_string(),
        ));
    }
    let mut seen = vec![false; register_size];
    for &q in qubits {
        if q >= register_size {
            return Err(TomographyError::InvalidValue(format!(
                "qubit {} outside register of size {}",
                q, register_size
            )));
        }
        if seen[q] {
            return Err(TomographyError::InvalidValue(format!(
                "qubit {} selected twice",
                q
            )));
        }
        seen[q] = true;
    }
    Ok(())
}

/// Every label tuple of length `qubits` over `labels`, ordered with the
/// qubit-0 label as the fastest-varying (least significant) digit.
fn label_tuples(labels: &[String], qubits: usize) -> Vec<Vec<String>> {
    let count = labels.len().pow(qubits as u32);
    let mut tuples = Vec::with_capacity(count);
    for index in 0..count {
        let mut tuple = Vec::with_capacity(qubits);
        let mut rest = index;
        for _ in 0..qubits {
            tuple.push(labels[rest % labels.len()].clone());
            rest /= labels.len();
        }
        tuples.push(tuple);
    }
    tuples
}

/// Configuration set for state tomography: every measurement-setting tuple,
/// `|settings|^k` entries, duplicate-free and in deterministic order.
pub fn state_configurations(qubits: usize, measurement: &MeasurementBasis) -> Vec<Configuration> {
    label_tuples(measurement.settings(), qubits)
        .into_iter()
        .map(Configuration::measurement)
        .collect()
}

/// Configuration set for process tomography: the Cartesian product of
/// preparation tuples and measurement tuples, `|prep|^k × |settings|^k`
/// entries. Measurement settings vary fastest.
pub fn process_configurations(
    qubits: usize,
    preparation: &PreparationBasis,
    measurement: &MeasurementBasis,
) -> Vec<Configuration> {
    let prep_tuples = label_tuples(preparation.labels(), qubits);
    let meas_tuples = label_tuples(measurement.settings(), qubits);

    let mut configurations = Vec::with_capacity(prep_tuples.len() * meas_tuples.len());
    for prep in &prep_tuples {
        for meas in &meas_tuples {
            configurations.push(Configuration {
                preparations: prep.clone(),
                measurements: meas.clone(),
            });
        }
    }
    configurations
}

/// The only coupling the core has to circuit construction: an external
/// builder turns a configuration placed on a layout into an executable
/// circuit for its backend.
pub trait CircuitSynthesizer {
    type Circuit;

    fn synthesize(
        &self,
        layout: &TomographyLayout,
        configuration: &Configuration,
    ) -> Result<Self::Circuit>;
}
