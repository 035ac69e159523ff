// src/error.rs
//! Error types for the tomography engine.

use thiserror::Error;

/// Main error type for tomography operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TomographyError {
    /// Requested basis name is not registered
    #[error("Unknown basis '{0}'")]
    UnknownBasis(String),

    /// A data record references a configuration the generator did not produce
    #[error("Unknown configuration {0}: not part of the expected configuration set")]
    UnknownConfiguration(String),

    /// One or more configurations carry zero total counts.
    /// Collected in a single batch so the caller sees every offending
    /// configuration, not just the first.
    #[error("No counts recorded for configuration(s): {}", .configurations.join(", "))]
    InsufficientData { configurations: Vec<String> },

    /// Gate-set Gram matrix is rank-deficient: the fiducials are not
    /// informationally complete for the target dimension
    #[error(
        "Insufficient fiducials: Gram matrix rank {rank} < {required} \
         (condition number {condition:.3e})"
    )]
    InsufficientFiducials {
        rank: usize,
        required: usize,
        condition: f64,
    },

    /// A constrained solve or gauge optimization failed to reach a
    /// feasible/optimal point within its iteration cap
    #[error("Fit failed to converge after {iterations} iterations: {status} (residual {residual:.3e})")]
    FitConvergence {
        status: String,
        iterations: usize,
        residual: f64,
    },

    /// Matrix or register dimensions do not match
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Argument validation failure
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TomographyError>;
