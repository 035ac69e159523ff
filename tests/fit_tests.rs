use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tomo::basis::pauli::{entanglement_fidelity, ptm_of_unitary};
use tomo::basis::{measurement_basis, preparation_basis};
use tomo::config::{Configuration, TomographyLayout};
use tomo::data::{Counts, TomographyData};
use tomo::error::TomographyError;
use tomo::fit::{
    FitMethod, FitOptions, Fitter, ProcessTomography, StateTomography, WeightScheme,
};
use tomo::linalg::{eigen, identity, pure_state_fidelity, trace};

/// Re Tr(S · X), the forward model shared by every fitter.
fn trace_product(s: &Array2<Complex64>, x: &Array2<Complex64>) -> f64 {
    trace(&s.dot(x)).re
}

/// Outcome probabilities of one configuration for a known state or Choi
/// matrix, indexed by outcome value.
fn outcome_probabilities<F: Fitter>(
    fitter: &F,
    configuration: &Configuration,
    truth: &Array2<Complex64>,
) -> Vec<f64> {
    let width = configuration.qubit_count();
    (0..(1usize << width))
        .map(|index| {
            let outcome = format!("{:0width$b}", index, width = width);
            let operator = fitter.row_operator(configuration, &outcome).unwrap();
            trace_product(&operator, truth).max(0.0)
        })
        .collect()
}

/// Infinite-shot data: counts proportional to the analytic probabilities.
fn analytic_data<F: Fitter>(
    fitter: &F,
    configurations: &[Configuration],
    truth: &Array2<Complex64>,
    shots: u64,
) -> TomographyData {
    let mut data = TomographyData::new(configurations.to_vec()).unwrap();
    for configuration in configurations {
        let probabilities = outcome_probabilities(fitter, configuration, truth);
        let width = configuration.qubit_count();
        let mut counts = Counts::new();
        for (index, p) in probabilities.iter().enumerate() {
            let count = (p * shots as f64).round() as u64;
            if count > 0 {
                counts.insert(format!("{:0width$b}", index, width = width), count);
            }
        }
        data.add_record(configuration, &counts).unwrap();
    }
    data
}

/// Finite-shot data sampled from the analytic outcome distribution.
fn sampled_data<F: Fitter>(
    fitter: &F,
    configurations: &[Configuration],
    truth: &Array2<Complex64>,
    shots: u64,
    seed: u64,
) -> TomographyData {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = TomographyData::new(configurations.to_vec()).unwrap();
    for configuration in configurations {
        let probabilities = outcome_probabilities(fitter, configuration, truth);
        let counts = sample_counts(&probabilities, configuration.qubit_count(), shots, &mut rng);
        data.add_record(configuration, &counts).unwrap();
    }
    data
}

fn sample_counts(probabilities: &[f64], width: usize, shots: u64, rng: &mut StdRng) -> Counts {
    let mut counts = Counts::new();
    for _ in 0..shots {
        let mut draw: f64 = rng.gen();
        let mut chosen = probabilities.len() - 1;
        for (index, &p) in probabilities.iter().enumerate() {
            if draw < p {
                chosen = index;
                break;
            }
            draw -= p;
        }
        *counts
            .entry(format!("{:0width$b}", chosen, width = width))
            .or_insert(0) += 1;
    }
    counts
}

fn density_of(psi: &Array1<Complex64>) -> Array2<Complex64> {
    let dim = psi.len();
    let mut rho = Array2::zeros((dim, dim));
    for i in 0..dim {
        for j in 0..dim {
            rho[[i, j]] = psi[i] * psi[j].conj();
        }
    }
    rho
}

fn bell_state() -> Array1<Complex64> {
    let mut psi = Array1::zeros(4);
    psi[0] = Complex64::new(1.0 / 2.0_f64.sqrt(), 0.0);
    psi[3] = Complex64::new(1.0 / 2.0_f64.sqrt(), 0.0);
    psi
}

fn plus_state() -> Array1<Complex64> {
    let mut psi = Array1::zeros(2);
    psi[0] = Complex64::new(1.0 / 2.0_f64.sqrt(), 0.0);
    psi[1] = Complex64::new(1.0 / 2.0_f64.sqrt(), 0.0);
    psi
}

#[test]
fn test_linear_inversion_round_trips_plus_state() {
    let fitter = StateTomography::new(1, measurement_basis("pauli").unwrap()).unwrap();
    let truth = density_of(&plus_state());
    let data = analytic_data(&fitter, &fitter.configurations(), &truth, 4096);

    let options = FitOptions {
        method: FitMethod::LinearInversion,
        ..FitOptions::default()
    };
    let result = fitter.fit(&data, &options).unwrap();

    assert!(result.diagnostics.residual_norm < 1e-9);
    assert!(!result.diagnostics.clipped);
    for i in 0..2 {
        for j in 0..2 {
            assert!(
                (result.matrix[[i, j]] - truth[[i, j]]).norm() < 1e-9,
                "entry ({}, {})",
                i,
                j
            );
        }
    }
}

#[test]
fn test_fitting_is_idempotent() {
    let fitter = StateTomography::new(2, measurement_basis("pauli").unwrap()).unwrap();
    let truth = density_of(&bell_state());
    let data = sampled_data(&fitter, &fitter.configurations(), &truth, 2000, 17);

    let options = FitOptions {
        method: FitMethod::LeastSquares,
        weights: WeightScheme::Counts,
        ..FitOptions::default()
    };
    let first = fitter.fit(&data, &options).unwrap();
    let second = fitter.fit(&data, &options).unwrap();

    for (a, b) in first.matrix.iter().zip(second.matrix.iter()) {
        assert_eq!(a.re.to_bits(), b.re.to_bits());
        assert_eq!(a.im.to_bits(), b.im.to_bits());
    }
}

#[test]
fn test_bell_state_recovered_from_five_thousand_shots() {
    let fitter = StateTomography::new(2, measurement_basis("pauli").unwrap()).unwrap();
    let truth = density_of(&bell_state());
    let data = sampled_data(&fitter, &fitter.configurations(), &truth, 5000, 42);

    let result = fitter.fit(&data, &FitOptions::default()).unwrap();
    let fidelity = pure_state_fidelity(&result.matrix, &bell_state());
    assert!(fidelity >= 0.95, "fidelity {}", fidelity);
    assert!(
        (trace(&result.matrix).re - 1.0).abs() < 1e-6,
        "trace {}",
        trace(&result.matrix).re
    );
}

/// Tensor-product readout confusion applied to an outcome distribution:
/// each qubit independently reports the wrong bit with its own rate.
fn apply_readout_error(probabilities: &[f64], correct_rates: &[f64]) -> Vec<f64> {
    let mut current = probabilities.to_vec();
    for (qubit, &rate) in correct_rates.iter().enumerate() {
        let mut next = vec![0.0; current.len()];
        for (outcome, &p) in current.iter().enumerate() {
            let partner = outcome ^ (1 << qubit);
            next[outcome] += rate * p;
            next[partner] += (1.0 - rate) * p;
        }
        current = next;
    }
    current
}

#[test]
fn test_uncorrected_readout_error_degrades_fidelity() {
    let fitter = StateTomography::new(2, measurement_basis("pauli").unwrap()).unwrap();
    let truth = density_of(&bell_state());
    let configurations = fitter.configurations();

    // Clean reference fit
    let clean_data = sampled_data(&fitter, &configurations, &truth, 8192, 7);
    let clean = fitter.fit(&clean_data, &FitOptions::default()).unwrap();
    let clean_fidelity = pure_state_fidelity(&clean.matrix, &bell_state());

    // Same state observed through 75%/90% correct classification rates
    let mut rng = StdRng::seed_from_u64(8);
    let mut noisy_data = TomographyData::new(configurations.clone()).unwrap();
    for configuration in &configurations {
        let probabilities = outcome_probabilities(&fitter, configuration, &truth);
        let corrupted = apply_readout_error(&probabilities, &[0.75, 0.90]);
        let counts = sample_counts(&corrupted, 2, 8192, &mut rng);
        noisy_data.add_record(configuration, &counts).unwrap();
    }
    let noisy = fitter.fit(&noisy_data, &FitOptions::default()).unwrap();
    let noisy_fidelity = pure_state_fidelity(&noisy.matrix, &bell_state());

    // The fitter sees the corrupted statistics as-is; mitigation is not
    // its job. Expected fidelity is near (1 + 3·0.5·0.8)/4 ≈ 0.55.
    assert!(clean_fidelity >= 0.95, "clean fidelity {}", clean_fidelity);
    assert!(
        noisy_fidelity < 0.75 && noisy_fidelity > 0.35,
        "noisy fidelity {}",
        noisy_fidelity
    );
    assert!(clean_fidelity - noisy_fidelity > 0.2);
}

/// Deterministic "all plus one" statistics: a Bloch vector of length √3,
/// far outside the state space.
fn unphysical_single_qubit_data(fitter: &StateTomography) -> TomographyData {
    let mut data = TomographyData::new(fitter.configurations()).unwrap();
    for configuration in data.configurations().to_vec() {
        let mut counts = Counts::new();
        counts.insert("0".to_string(), 1000);
        data.add_record(&configuration, &counts).unwrap();
    }
    data
}

#[test]
fn test_cvx_output_is_positive_semidefinite() {
    let fitter = StateTomography::new(1, measurement_basis("pauli").unwrap()).unwrap();
    let data = unphysical_single_qubit_data(&fitter);

    let options = FitOptions {
        method: FitMethod::Cvx,
        ..FitOptions::default()
    };
    let result = fitter.fit(&data, &options).unwrap();

    assert!(eigen::min_eigenvalue(&result.matrix) >= -1e-6);
    assert!((trace(&result.matrix).re - 1.0).abs() < 1e-6);
    assert_eq!(result.diagnostics.method, FitMethod::Cvx);
    assert!(!result.diagnostics.clipped);
}

#[test]
fn test_auto_escalates_to_cvx_on_unphysical_statistics() {
    let fitter = StateTomography::new(1, measurement_basis("pauli").unwrap()).unwrap();
    let data = unphysical_single_qubit_data(&fitter);

    let result = fitter.fit(&data, &FitOptions::default()).unwrap();
    assert_eq!(result.diagnostics.method, FitMethod::Cvx);
    assert!(eigen::min_eigenvalue(&result.matrix) >= -1e-6);
}

#[test]
fn test_explicit_linear_method_clips_and_reports() {
    let fitter = StateTomography::new(1, measurement_basis("pauli").unwrap()).unwrap();
    let data = unphysical_single_qubit_data(&fitter);

    let options = FitOptions {
        method: FitMethod::LinearInversion,
        ..FitOptions::default()
    };
    let result = fitter.fit(&data, &options).unwrap();

    // The raw Bloch vector (1,1,1) has min eigenvalue (1 − √3)/2
    assert!(result.diagnostics.clipped);
    assert!((result.diagnostics.psd_violation - 0.366).abs() < 0.01);
    assert!(eigen::min_eigenvalue(&result.matrix) >= -1e-10);
    assert!((trace(&result.matrix).re - 1.0).abs() < 1e-10);
}

fn identity_choi() -> Array2<Complex64> {
    tomo::basis::pauli::choi_of_ptm(&ptm_of_unitary(&identity(2))).unwrap()
}

#[test]
fn test_process_tomography_round_trips_identity_channel() {
    let fitter = ProcessTomography::new(
        1,
        preparation_basis("pauli").unwrap(),
        measurement_basis("pauli").unwrap(),
    )
    .unwrap();
    let truth = identity_choi();
    let data = analytic_data(&fitter, &fitter.configurations(), &truth, 4800);

    let options = FitOptions {
        method: FitMethod::LinearInversion,
        ..FitOptions::default()
    };
    let result = fitter.fit(&data, &options).unwrap();

    assert!(result.diagnostics.residual_norm < 1e-9);
    assert!(result.diagnostics.constraint_violation < 1e-9);
    let fidelity = entanglement_fidelity(&result.matrix, &identity(2));
    assert!(fidelity > 0.999, "fidelity {}", fidelity);
}

#[test]
fn test_cvx_channel_fit_is_trace_preserving() {
    let fitter = ProcessTomography::new(
        1,
        preparation_basis("pauli").unwrap(),
        measurement_basis("pauli").unwrap(),
    )
    .unwrap();
    let truth = identity_choi();
    let data = sampled_data(&fitter, &fitter.configurations(), &truth, 1500, 23);

    let options = FitOptions {
        method: FitMethod::Cvx,
        ..FitOptions::default()
    };
    let result = fitter.fit(&data, &options).unwrap();

    assert!(eigen::min_eigenvalue(&result.matrix) >= -1e-6);
    assert!(result.diagnostics.constraint_violation < 1e-5);
    let fidelity = entanglement_fidelity(&result.matrix, &identity(2));
    assert!(fidelity >= 0.95, "fidelity {}", fidelity);
}

#[test]
fn test_permutation_channel_reconstructs_identity() {
    // Preparation on qubit 0, measurement on qubit 1, connected by a swap:
    // the effective channel between the two registers is the identity.
    let layout = TomographyLayout::reduced(2, vec![0])
        .unwrap()
        .with_measured_qubits(vec![1])
        .unwrap();
    let fitter = ProcessTomography::new(
        1,
        preparation_basis("pauli").unwrap(),
        measurement_basis("pauli").unwrap(),
    )
    .unwrap();
    let truth = identity_choi();
    let configurations = fitter.configurations();

    let mut data = TomographyData::new(configurations.clone()).unwrap();
    for configuration in &configurations {
        let probabilities = outcome_probabilities(&fitter, configuration, &truth);
        // Raw two-bit keys: the tomography bit rides on qubit 1, qubit 0
        // reads out |0⟩
        let mut raw = Counts::new();
        for (bit, &p) in probabilities.iter().enumerate() {
            let count = (p * 4096.0).round() as u64;
            if count > 0 {
                raw.insert(format!("{}0", bit), count);
            }
        }
        data.add_raw_record(&layout, configuration, &raw).unwrap();
    }

    let result = fitter.fit(&data, &FitOptions::default()).unwrap();
    let fidelity = entanglement_fidelity(&result.matrix, &identity(2));
    assert!(fidelity >= 0.95, "fidelity {}", fidelity);
}

#[test]
fn test_zero_count_configuration_aborts_fit() {
    let fitter = StateTomography::new(1, measurement_basis("pauli").unwrap()).unwrap();
    let mut data = TomographyData::new(fitter.configurations()).unwrap();

    // Fill X and Y, leave Z starved
    for configuration in &fitter.configurations()[..2] {
        let mut counts = Counts::new();
        counts.insert("0".to_string(), 500);
        counts.insert("1".to_string(), 500);
        data.add_record(configuration, &counts).unwrap();
    }

    match fitter.fit(&data, &FitOptions::default()) {
        Err(TomographyError::InsufficientData { configurations }) => {
            assert_eq!(configurations.len(), 1);
            assert!(configurations[0].contains('Z'), "{:?}", configurations);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_weighted_fit_recovers_state_with_uneven_shots() {
    let fitter = StateTomography::new(1, measurement_basis("pauli").unwrap()).unwrap();
    let truth = density_of(&plus_state());
    let configurations = fitter.configurations();

    let mut data = TomographyData::new(configurations.clone()).unwrap();
    for (index, configuration) in configurations.iter().enumerate() {
        let shots = [4000u64, 2000, 1000][index];
        let probabilities = outcome_probabilities(&fitter, configuration, &truth);
        let mut counts = Counts::new();
        for (bit, &p) in probabilities.iter().enumerate() {
            let count = (p * shots as f64).round() as u64;
            if count > 0 {
                counts.insert(format!("{}", bit), count);
            }
        }
        data.add_record(configuration, &counts).unwrap();
    }

    let options = FitOptions {
        method: FitMethod::LeastSquares,
        weights: WeightScheme::Counts,
        ..FitOptions::default()
    };
    let result = fitter.fit(&data, &options).unwrap();
    let fidelity = pure_state_fidelity(&result.matrix, &plus_state());
    assert!(fidelity > 0.999, "fidelity {}", fidelity);
}
