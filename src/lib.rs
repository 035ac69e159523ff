//! Quantum Tomography Engine
//!
//! This crate reconstructs quantum states, quantum channels, and entire
//! gate sets from finite-sample measurement statistics. It covers the
//! generation of informationally complete preparation/measurement
//! configurations, the aggregation of raw shot counts into empirical
//! frequencies, and the reconstruction algorithms: linear inversion,
//! weighted least squares, constrained (positive-semidefinite,
//! trace-preserving) fitting, and self-consistent gate set tomography with
//! gauge fixing.
//!
//! Circuit execution is external: the crate consumes a
//! `configuration → outcome counts` table and never inspects circuits or
//! backends.

pub mod basis;
pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod gateset;
pub mod linalg;

// Create a prelude module for convenient imports
pub mod prelude {
    pub use crate::basis::{
        measurement_basis, preparation_basis, MeasurementBasis, PreparationBasis,
    };
    pub use crate::config::{
        process_configurations, state_configurations, CircuitSynthesizer, Configuration,
        TomographyLayout,
    };
    pub use crate::data::{marginalize_counts, postselect_counts, Counts, TomographyData};
    pub use crate::error::{Result, TomographyError};
    pub use crate::fit::{
        FitMethod, FitOptions, FitResult, Fitter, ProcessTomography, StateTomography, WeightScheme,
    };
    pub use crate::gateset::{
        GateSetBasis, GateSetData, GateSetTomography, GateSpec, GstCircuit, GstOptions,
    };
}

// Version and crate information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
