// src/gateset/mod.rs
//! Gate set tomography: self-consistent estimation of a whole gate set
//! from fiducial-framed sequence data, followed by gauge fixing.
//!
//! The engine works in the Pauli transfer matrix (PTM) representation.
//! Phase 1 is the data-collection contract: the circuit set is the
//! Cartesian product of fiducial prefixes, germ-power sequences, and
//! fiducial suffixes, plus the bare fiducial pairs that populate the Gram
//! matrix. Phase 2 extracts gauge-ambiguous estimates by linear algebra on
//! the Gram matrix. Phase 3 aligns the frame with the ideal reference
//! gates through numerical gauge optimization.

pub mod gauge;

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::basis::pauli::{choi_of_ptm, operator_of_ptm_vector, ptm_of_unitary, ptm_vector};
use crate::data::Counts;
use crate::error::{Result, TomographyError};
use crate::linalg::{dagger, frobenius_norm, solve};

pub use gauge::GaugeOptions;

/// A named gate with an optional ideal reference. Gates with a reference
/// anchor the gauge; gates without one are estimated in the same frame but
/// do not constrain it.
#[derive(Debug, Clone)]
pub struct GateSpec {
    pub name: String,
    pub ideal: Option<Array2<Complex64>>,
}

impl GateSpec {
    pub fn with_ideal(name: impl Into<String>, ideal: Array2<Complex64>) -> Self {
        GateSpec {
            name: name.into(),
            ideal: Some(ideal),
        }
    }

    pub fn unreferenced(name: impl Into<String>) -> Self {
        GateSpec {
            name: name.into(),
            ideal: None,
        }
    }
}

/// Immutable gate-set basis: fiducial unitaries (identity first) and the
/// germ gates whose estimates are sought. Extending the basis constructs a
/// new value; there is no global registry.
#[derive(Debug, Clone)]
pub struct GateSetBasis {
    fiducials: Vec<(String, Array2<Complex64>)>,
    gates: Vec<GateSpec>,
    germ_powers: Vec<usize>,
    qubits: usize,
}

impl GateSetBasis {
    /// Build a basis from fiducial unitaries and germ gates. The first
    /// fiducial must be the identity; it pins the native preparation and
    /// measurement into the Gram matrix.
    pub fn new(
        fiducials: Vec<(String, Array2<Complex64>)>,
        gates: Vec<GateSpec>,
    ) -> Result<Self> {
        let first = fiducials.first().ok_or_else(|| {
            TomographyError::InvalidValue("gate-set basis needs at least one fiducial".to_string())
        })?;
        let dim = first.1.shape()[0];
        if !dim.is_power_of_two() || dim < 2 {
            return Err(TomographyError::InvalidValue(format!(
                "fiducial dimension {} is not a qubit register",
                dim
            )));
        }
        let qubits = dim.trailing_zeros() as usize;

        let mut deviation = first.1.clone();
        for i in 0..dim {
            deviation[[i, i]] -= Complex64::new(1.0, 0.0);
        }
        if frobenius_norm(&deviation) > 1e-10 {
            return Err(TomographyError::InvalidValue(
                "the first fiducial must be the identity".to_string(),
            ));
        }

        let mut seen = HashMap::new();
        for (name, unitary) in &fiducials {
            if unitary.shape() != [dim, dim] {
                return Err(TomographyError::DimensionMismatch {
                    expected: dim,
                    actual: unitary.shape()[0],
                });
            }
            check_unitary(name, unitary)?;
            if seen.insert(name.clone(), ()).is_some() {
                return Err(TomographyError::InvalidValue(format!(
                    "duplicate fiducial name '{}'",
                    name
                )));
            }
        }
        if gates.is_empty() {
            return Err(TomographyError::InvalidValue(
                "gate-set basis needs at least one germ gate".to_string(),
            ));
        }
        let mut gate_names = HashMap::new();
        for gate in &gates {
            if let Some(ideal) = &gate.ideal {
                if ideal.shape() != [dim, dim] {
                    return Err(TomographyError::DimensionMismatch {
                        expected: dim,
                        actual: ideal.shape()[0],
                    });
                }
                check_unitary(&gate.name, ideal)?;
            }
            if gate_names.insert(gate.name.clone(), ()).is_some() {
                return Err(TomographyError::InvalidValue(format!(
                    "duplicate gate name '{}'",
                    gate.name
                )));
            }
        }

        Ok(GateSetBasis {
            fiducials,
            gates,
            germ_powers: vec![1],
            qubits,
        })
    }

    /// Derived basis with longer germ repetitions for error amplification.
    pub fn with_germ_powers(mut self, powers: Vec<usize>) -> Result<Self> {
        if powers.is_empty() || powers.iter().any(|&p| p == 0) {
            return Err(TomographyError::InvalidValue(
                "germ powers must be positive".to_string(),
            ));
        }
        if !powers.contains(&1) {
            return Err(TomographyError::InvalidValue(
                "germ powers must include 1: per-gate estimates come from the base sequences"
                    .to_string(),
            ));
        }
        self.germ_powers = powers;
        Ok(self)
    }

    /// Derived basis with an extra germ gate.
    pub fn with_gate(&self, gate: GateSpec) -> Result<Self> {
        let mut gates = self.gates.clone();
        gates.push(gate);
        GateSetBasis::new(self.fiducials.clone(), gates)
            .and_then(|basis| basis.with_germ_powers(self.germ_powers.clone()))
    }

    pub fn qubits(&self) -> usize {
        self.qubits
    }

    pub fn fiducial_names(&self) -> Vec<&str> {
        self.fiducials.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn gate_names(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.name.as_str()).collect()
    }

    fn fiducial(&self, name: &str) -> Result<&Array2<Complex64>> {
        self.fiducials
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, u)| u)
            .ok_or_else(|| {
                TomographyError::InvalidValue(format!("unknown fiducial '{}'", name))
            })
    }

    fn gate(&self, name: &str) -> Result<&GateSpec> {
        self.gates
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| TomographyError::InvalidValue(format!("unknown gate '{}'", name)))
    }

    /// The full circuit set: bare fiducial pairs for the Gram matrix, then
    /// every (prefix fiducial, germ power, suffix fiducial) sandwich.
    /// Deterministic order, duplicate-free.
    pub fn circuits(&self) -> Vec<GstCircuit> {
        let mut circuits = Vec::new();
        for (meas, _) in &self.fiducials {
            for (prep, _) in &self.fiducials {
                circuits.push(GstCircuit {
                    prep_fiducial: prep.clone(),
                    germ: Vec::new(),
                    meas_fiducial: meas.clone(),
                });
            }
        }
        for gate in &self.gates {
            for &power in &self.germ_powers {
                for (meas, _) in &self.fiducials {
                    for (prep, _) in &self.fiducials {
                        circuits.push(GstCircuit {
                            prep_fiducial: prep.clone(),
                            germ: vec![gate.name.clone(); power],
                            meas_fiducial: meas.clone(),
                        });
                    }
                }
            }
        }
        circuits
    }

    /// Noiseless survival probability of the all-zeros outcome for a
    /// circuit: |⟨0…0| F_meas · germ · F_prep |0…0⟩|². This is the forward
    /// model the estimator inverts; it doubles as the reference for tests
    /// and for residual reporting.
    pub fn ideal_probability(&self, circuit: &GstCircuit) -> Result<f64> {
        let mut unitary = self.fiducial(&circuit.prep_fiducial)?.clone();
        for gate_name in &circuit.germ {
            let gate = self.gate(gate_name)?;
            let ideal = gate.ideal.as_ref().ok_or_else(|| {
                TomographyError::InvalidValue(format!(
                    "gate '{}' has no ideal reference to predict from",
                    gate_name
                ))
            })?;
            unitary = ideal.dot(&unitary);
        }
        unitary = self.fiducial(&circuit.meas_fiducial)?.dot(&unitary);
        Ok(unitary[[0, 0]].norm_sqr())
    }
}

fn check_unitary(name: &str, u: &Array2<Complex64>) -> Result<()> {
    let dim = u.shape()[0];
    let product = dagger(u).dot(u);
    let mut deviation = product;
    for i in 0..dim {
        deviation[[i, i]] -= Complex64::new(1.0, 0.0);
    }
    if frobenius_norm(&deviation) > 1e-8 {
        return Err(TomographyError::InvalidValue(format!(
            "'{}' is not unitary",
            name
        )));
    }
    Ok(())
}

/// One gate-set tomography circuit: fiducial prefix, germ sequence,
/// fiducial suffix. An empty germ is a Gram pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GstCircuit {
    pub prep_fiducial: String,
    pub germ: Vec<String>,
    pub meas_fiducial: String,
}

impl Display for GstCircuit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.germ.is_empty() {
            write!(f, "{}:{}", self.prep_fiducial, self.meas_fiducial)
        } else {
            write!(
                f,
                "{}:{}:{}",
                self.prep_fiducial,
                self.germ.join("."),
                self.meas_fiducial
            )
        }
    }
}

/// Counts accumulated against the expected gate-set circuit list.
#[derive(Debug, Clone)]
pub struct GateSetData {
    circuits: Vec<GstCircuit>,
    index: HashMap<GstCircuit, usize>,
    records: Vec<Counts>,
    width: usize,
}

impl GateSetData {
    pub fn new(circuits: Vec<GstCircuit>, width: usize) -> Result<Self> {
        if circuits.is_empty() {
            return Err(TomographyError::InvalidValue(
                "empty gate-set circuit list".to_string(),
            ));
        }
        let mut index = HashMap::with_capacity(circuits.len());
        for (i, circuit) in circuits.iter().enumerate() {
            if index.insert(circuit.clone(), i).is_some() {
                return Err(TomographyError::InvalidValue(format!(
                    "duplicate circuit {} in expected set",
                    circuit
                )));
            }
        }
        let records = vec![Counts::new(); circuits.len()];
        Ok(GateSetData {
            circuits,
            index,
            records,
            width,
        })
    }

    /// Merge a counts record, summing with previous records for the same
    /// circuit.
    pub fn add_record(&mut self, circuit: &GstCircuit, counts: &Counts) -> Result<()> {
        let slot = *self
            .index
            .get(circuit)
            .ok_or_else(|| TomographyError::UnknownConfiguration(circuit.to_string()))?;
        for (outcome, &count) in counts {
            if outcome.len() != self.width || !outcome.chars().all(|c| c == '0' || c == '1') {
                return Err(TomographyError::InvalidValue(format!(
                    "outcome '{}' is not a {}-bit string",
                    outcome, self.width
                )));
            }
            *self.records[slot].entry(outcome.clone()).or_insert(0) += count;
        }
        Ok(())
    }

    /// Survival frequency (all-zeros outcome) per circuit. Circuits with
    /// zero total counts are reported together.
    fn survival_frequencies(&self) -> Result<HashMap<GstCircuit, f64>> {
        let zeros = "0".repeat(self.width);
        let mut starved = Vec::new();
        let mut frequencies = HashMap::with_capacity(self.circuits.len());

        for (circuit, counts) in self.circuits.iter().zip(self.records.iter()) {
            let shots: u64 = counts.values().sum();
            if shots == 0 {
                starved.push(circuit.to_string());
                continue;
            }
            let survived = counts.get(&zeros).copied().unwrap_or(0);
            frequencies.insert(circuit.clone(), survived as f64 / shots as f64);
        }

        if !starved.is_empty() {
            return Err(TomographyError::InsufficientData {
                configurations: starved,
            });
        }
        Ok(frequencies)
    }
}

/// Options for the gate-set fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GstOptions {
    /// Singular values below this fraction of the largest are treated as
    /// zero when ranking the Gram matrix.
    pub rank_tolerance: f64,
    pub gauge: GaugeOptions,
}

impl Default for GstOptions {
    fn default() -> Self {
        GstOptions {
            rank_tolerance: 1e-6,
            gauge: GaugeOptions::default(),
        }
    }
}

/// Gate-set fit diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GstDiagnostics {
    pub gram_rank: usize,
    pub gram_condition: f64,
    pub gauge_objective: f64,
    pub gauge_iterations: usize,
    pub gauge_converged: bool,
}

/// Self-consistent gate-set estimate in one common gauge.
#[derive(Debug)]
pub struct GateSetResult {
    /// Gauge-fixed Choi matrix per germ gate (base power).
    pub gates: BTreeMap<String, Array2<Complex64>>,
    /// Gauge-fixed PTM per germ-power sequence, keyed `name^power`.
    pub sequence_ptms: BTreeMap<String, Array2<f64>>,
    /// Reconstructed preparation density matrix.
    pub preparation: Array2<Complex64>,
    /// Reconstructed measurement effect.
    pub effect: Array2<Complex64>,
    pub diagnostics: GstDiagnostics,
}

/// The gate set tomography engine.
#[derive(Debug, Clone)]
pub struct GateSetTomography {
    basis: GateSetBasis,
}

impl GateSetTomography {
    pub fn new(basis: GateSetBasis) -> Self {
        GateSetTomography { basis }
    }

    pub fn basis(&self) -> &GateSetBasis {
        &self.basis
    }

    /// Run the three phases: Gram extraction, raw estimation, gauge fixing.
    pub fn fit(&self, data: &GateSetData, options: &GstOptions) -> Result<GateSetResult> {
        let frequencies = data.survival_frequencies()?;
        let fiducials = &self.basis.fiducials;
        let n = fiducials.len();
        let ptm_dim = 4_usize.pow(self.basis.qubits as u32);

        let lookup = |prep: &str, germ: Vec<String>, meas: &str| -> Result<f64> {
            let circuit = GstCircuit {
                prep_fiducial: prep.to_string(),
                germ,
                meas_fiducial: meas.to_string(),
            };
            frequencies.get(&circuit).copied().ok_or_else(|| {
                TomographyError::UnknownConfiguration(circuit.to_string())
            })
        };

        // Phase 2a: Gram matrix G_ij = <E F_i, F_j rho>
        let mut gram = Array2::zeros((n, n));
        for (i, (meas, _)) in fiducials.iter().enumerate() {
            for (j, (prep, _)) in fiducials.iter().enumerate() {
                gram[[i, j]] = lookup(prep, Vec::new(), meas)?;
            }
        }

        let decomposition = solve::svd(&gram);
        let leading = decomposition.singular_values[0].max(1e-300);
        let rank = decomposition
            .singular_values
            .iter()
            .filter(|&&s| s > options.rank_tolerance * leading)
            .count();
        if rank < ptm_dim {
            let smallest = if n >= ptm_dim {
                decomposition.singular_values[ptm_dim - 1]
            } else {
                0.0
            }
            .max(1e-300);
            return Err(TomographyError::InsufficientFiducials {
                rank,
                required: ptm_dim,
                condition: leading / smallest,
            });
        }
        let gram_condition = leading / decomposition.singular_values[ptm_dim - 1];

        // Truncated whitening factors: Â = U √Σ, B̂ = √Σ Vᵀ, so that
        // R̂ = Â⁺ M B̂⁺ = Σ^{-1/2} Uᵀ M V Σ^{-1/2}
        let mut left = Array2::zeros((ptm_dim, n));
        let mut right = Array2::zeros((n, ptm_dim));
        for k in 0..ptm_dim {
            let inv_sqrt = 1.0 / decomposition.singular_values[k].sqrt();
            for row in 0..n {
                left[[k, row]] = decomposition.u[[row, k]] * inv_sqrt;
                right[[row, k]] = decomposition.v[[row, k]] * inv_sqrt;
            }
        }

        // Phase 2b: raw gauge-ambiguous sequence maps
        let mut raw_sequences: Vec<(String, usize, Array2<f64>)> = Vec::new();
        for gate in &self.basis.gates {
            for &power in &self.basis.germ_powers {
                let mut measured = Array2::zeros((n, n));
                for (i, (meas, _)) in fiducials.iter().enumerate() {
                    for (j, (prep, _)) in fiducials.iter().enumerate() {
                        measured[[i, j]] =
                            lookup(prep, vec![gate.name.clone(); power], meas)?;
                    }
                }
                let raw = left.dot(&measured).dot(&right);
                raw_sequences.push((gate.name.clone(), power, raw));
            }
        }

        // Raw state and effect in the same frame, from the identity
        // fiducial's row and column of the Gram matrix
        let gram_column = gram.column(0).to_owned();
        let raw_prep = left.dot(&gram_column);
        let gram_row = gram.row(0).to_owned();
        let raw_effect = gram_row.dot(&right);

        // Phase 3: gauge fixing against the ideal anchors
        let zero_state = ideal_ground_state(self.basis.qubits);
        let ideal_prep = ptm_vector(&zero_state);
        let ideal_effect = ideal_prep.clone();

        let mut anchors = Vec::new();
        for (name, power, raw) in &raw_sequences {
            if *power != 1 {
                continue;
            }
            let ideal = self
                .basis
                .gate(name)?
                .ideal
                .as_ref()
                .map(ptm_of_unitary);
            anchors.push((raw.clone(), ideal));
        }

        // Warm start from the ideal fiducial frame: with B_ideal holding
        // the ideal fiducial-prepared states as PTM columns, B_ideal B̂⁺
        // maps the raw frame onto the ideal one exactly in the noiseless
        // limit, so the optimizer only refines.
        let mut b_ideal = Array2::zeros((ptm_dim, n));
        for (j, (_, fiducial)) in fiducials.iter().enumerate() {
            let prepared = fiducial.dot(&zero_state).dot(&dagger(fiducial));
            let column = ptm_vector(&prepared);
            for k in 0..ptm_dim {
                b_ideal[[k, j]] = column[k];
            }
        }
        let start = b_ideal.dot(&right);

        let outcome = gauge::optimize_gauge(
            &anchors,
            &raw_prep,
            &ideal_prep,
            &raw_effect,
            &ideal_effect,
            start,
            &options.gauge,
        )?;
        if !outcome.converged {
            return Err(TomographyError::FitConvergence {
                status: "gauge optimization stalled before reaching tolerance".to_string(),
                iterations: outcome.iterations,
                residual: outcome.objective.sqrt(),
            });
        }

        let transform = outcome.transform.clone();
        let inverse = solve::invert(&transform)?;

        let mut gates = BTreeMap::new();
        let mut sequence_ptms = BTreeMap::new();
        for (name, power, raw) in &raw_sequences {
            let fixed = transform.dot(raw).dot(&inverse);
            if *power == 1 {
                gates.insert(name.clone(), choi_of_ptm(&fixed)?);
            }
            sequence_ptms.insert(format!("{}^{}", name, power), fixed);
        }

        let prep_vector = transform.dot(&raw_prep);
        let effect_vector = raw_effect.dot(&inverse);
        let preparation = operator_of_ptm_vector(&prep_vector)?;
        let effect = operator_of_ptm_vector(&effect_vector)?;

        Ok(GateSetResult {
            gates,
            sequence_ptms,
            preparation,
            effect,
            diagnostics: GstDiagnostics {
                gram_rank: rank,
                gram_condition,
                gauge_objective: outcome.objective,
                gauge_iterations: outcome.iterations,
                gauge_converged: outcome.converged,
            },
        })
    }
}

/// |0…0⟩⟨0…0| on the basis register.
fn ideal_ground_state(qubits: usize) -> Array2<Complex64> {
    let dim = 1 << qubits;
    let mut state = Array2::zeros((dim, dim));
    state[[0, 0]] = Complex64::new(1.0, 0.0);
    state
}
