use std::collections::HashSet;

use tomo::basis::{measurement_basis, preparation_basis};
use tomo::config::{process_configurations, state_configurations, TomographyLayout};

#[test]
fn test_single_qubit_process_has_twelve_configurations() {
    let prep = preparation_basis("pauli").unwrap();
    let meas = measurement_basis("pauli").unwrap();

    let configurations = process_configurations(1, &prep, &meas);
    assert_eq!(configurations.len(), 12);

    let distinct: HashSet<_> = configurations.iter().collect();
    assert_eq!(distinct.len(), 12);
}

#[test]
fn test_configuration_counts_scale_with_qubits() {
    let prep = preparation_basis("pauli").unwrap();
    let meas = measurement_basis("pauli").unwrap();

    assert_eq!(state_configurations(1, &meas).len(), 3);
    assert_eq!(state_configurations(2, &meas).len(), 9);
    assert_eq!(state_configurations(3, &meas).len(), 27);

    assert_eq!(process_configurations(2, &prep, &meas).len(), 144);

    let two_qubit = process_configurations(2, &prep, &meas);
    let distinct: HashSet<_> = two_qubit.iter().collect();
    assert_eq!(distinct.len(), 144);
}

#[test]
fn test_generation_is_deterministic() {
    let prep = preparation_basis("pauli").unwrap();
    let meas = measurement_basis("pauli").unwrap();

    let first = process_configurations(2, &prep, &meas);
    let second = process_configurations(2, &prep, &meas);
    assert_eq!(first, second);
}

#[test]
fn test_measurement_labels_vary_fastest() {
    let prep = preparation_basis("pauli").unwrap();
    let meas = measurement_basis("pauli").unwrap();

    let configurations = process_configurations(1, &prep, &meas);
    // First block: one preparation, all three measurement settings
    assert_eq!(configurations[0].preparations, configurations[1].preparations);
    assert_ne!(configurations[0].measurements, configurations[1].measurements);
    assert_eq!(configurations[0].preparations, vec!["Zp".to_string()]);
    assert_eq!(configurations[3].preparations, vec!["Zm".to_string()]);
}

#[test]
fn test_qubit_zero_label_is_least_significant() {
    let meas = measurement_basis("pauli").unwrap();
    let configurations = state_configurations(2, &meas);

    // Second configuration advances the qubit-0 setting, not qubit 1
    assert_eq!(
        configurations[0].measurements,
        vec!["X".to_string(), "X".to_string()]
    );
    assert_eq!(
        configurations[1].measurements,
        vec!["Y".to_string(), "X".to_string()]
    );
}

#[test]
fn test_reduced_layout_validation() {
    let layout = TomographyLayout::reduced(3, vec![0, 2]).unwrap();
    assert_eq!(layout.width(), 2);
    assert_eq!(layout.measured_qubits(), &[0, 2]);

    assert!(TomographyLayout::reduced(2, vec![2]).is_err());
    assert!(TomographyLayout::reduced(2, vec![0, 0]).is_err());
    assert!(TomographyLayout::reduced(2, vec![]).is_err());
}

#[test]
fn test_measured_qubit_remapping() {
    let layout = TomographyLayout::reduced(2, vec![0])
        .unwrap()
        .with_measured_qubits(vec![1])
        .unwrap();
    assert_eq!(layout.qubits(), &[0]);
    assert_eq!(layout.measured_qubits(), &[1]);

    // Remapping must preserve the tomography width
    let too_wide = TomographyLayout::reduced(3, vec![0]).unwrap();
    assert!(too_wide.with_measured_qubits(vec![1, 2]).is_err());
}

#[test]
fn test_postselection_validation() {
    let layout = TomographyLayout::reduced(3, vec![0, 1])
        .unwrap()
        .with_postselection(2, 1)
        .unwrap();
    assert_eq!(layout.postselection().unwrap().bit, 2);

    let base = TomographyLayout::reduced(3, vec![0, 1]).unwrap();
    assert!(base.clone().with_postselection(5, 1).is_err());
    assert!(base.with_postselection(2, 7).is_err());
}
