// src/fit/design.rs
//! Design matrix construction.
//!
//! Every (configuration, outcome) pair contributes one row: the Hermitian
//! coordinates of its effect operator. Because the coordinate basis is
//! orthonormal under the trace inner product, the model Tr(S·X) becomes a
//! real dot product and the whole inverse problem stays in real arithmetic.
//! Rows are independent, so they are built in parallel.

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use super::Fitter;
use crate::data::ConfigurationFrequencies;
use crate::error::Result;
use crate::linalg::hermitian_coordinates;

/// Real linear model A x ≈ b with per-row shot totals for weighting.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub a: Array2<f64>,
    pub b: Array1<f64>,
    /// Shot total of the configuration each row came from.
    pub shots: Array1<f64>,
    /// Side of the reconstructed matrix.
    pub dimension: usize,
}

/// Build the design matrix over every configuration and every outcome of
/// the tomography register. Outcomes absent from the data enter with
/// frequency zero; observing nothing is information too.
pub fn build<F: Fitter + ?Sized>(
    fitter: &F,
    frequencies: &[ConfigurationFrequencies],
) -> Result<DesignMatrix> {
    let dimension = fitter.dimension();
    let columns = dimension * dimension;

    let per_configuration: Vec<Vec<(Vec<f64>, f64, f64)>> = frequencies
        .par_iter()
        .map(|freq| -> Result<Vec<(Vec<f64>, f64, f64)>> {
            let width = freq.configuration.qubit_count();
            let outcomes = 1_usize << width;
            let mut rows = Vec::with_capacity(outcomes);
            for index in 0..outcomes {
                let outcome = format!("{:0width$b}", index, width = width);
                let operator = fitter.row_operator(&freq.configuration, &outcome)?;
                let coordinates = hermitian_coordinates(&operator);
                let probability = freq
                    .probabilities
                    .iter()
                    .find(|(key, _)| key == &outcome)
                    .map_or(0.0, |&(_, p)| p);
                rows.push((
                    coordinates.to_vec(),
                    probability,
                    freq.shots as f64,
                ));
            }
            Ok(rows)
        })
        .collect::<Result<Vec<_>>>()?;

    let total_rows: usize = per_configuration.iter().map(|rows| rows.len()).sum();
    let mut a = Array2::zeros((total_rows, columns));
    let mut b = Array1::zeros(total_rows);
    let mut shots = Array1::zeros(total_rows);

    let mut row = 0;
    for rows in per_configuration {
        for (coordinates, probability, shot_total) in rows {
            for (col, value) in coordinates.into_iter().enumerate() {
                a[[row, col]] = value;
            }
            b[row] = probability;
            shots[row] = shot_total;
            row += 1;
        }
    }

    Ok(DesignMatrix {
        a,
        b,
        shots,
        dimension,
    })
}
