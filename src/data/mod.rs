// src/data/mod.rs
//! Aggregation of raw execution counts into per-configuration outcome
//! frequencies.
//!
//! Raw records arrive keyed by outcome bit-strings (rightmost character is
//! qubit 0). Records for the same configuration merge by summing counts so
//! circuits reused across experiments accumulate statistics correctly.
//! Postselection and register marginalization are pure transformations on
//! counts tables; nothing here mutates shared execution results.

use std::collections::HashMap;

use crate::config::{Configuration, TomographyLayout};
use crate::error::{Result, TomographyError};

/// Outcome bit-string to shot count.
pub type Counts = HashMap<String, u64>;

/// Empirical outcome statistics for one configuration.
#[derive(Debug, Clone)]
pub struct ConfigurationFrequencies {
    pub configuration: Configuration,
    pub shots: u64,
    /// (outcome, relative frequency), sorted by outcome for determinism.
    pub probabilities: Vec<(String, f64)>,
}

/// Counts accumulated against an expected configuration set.
#[derive(Debug, Clone)]
pub struct TomographyData {
    configurations: Vec<Configuration>,
    index: HashMap<Configuration, usize>,
    records: Vec<Counts>,
    width: usize,
}

impl TomographyData {
    /// Start an empty table over the expected configuration set.
    pub fn new(configurations: Vec<Configuration>) -> Result<Self> {
        let first = configurations.first().ok_or_else(|| {
            TomographyError::InvalidValue("empty configuration set".to_string())
        })?;
        let width = first.qubit_count();

        let mut index = HashMap::with_capacity(configurations.len());
        for (i, config) in configurations.iter().enumerate() {
            if config.qubit_count() != width {
                return Err(TomographyError::DimensionMismatch {
                    expected: width,
                    actual: config.qubit_count(),
                });
            }
            if index.insert(config.clone(), i).is_some() {
                return Err(TomographyError::InvalidValue(format!(
                    "duplicate configuration {} in expected set",
                    config
                )));
            }
        }

        let records = vec![Counts::new(); configurations.len()];
        Ok(TomographyData {
            configurations,
            index,
            records,
            width,
        })
    }

    /// Tomography bit width (number of tomography qubits).
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// Merge a counts record for a configuration, summing with anything
    /// already recorded for it. Outcome keys must be bit-strings of the
    /// tomography width.
    pub fn add_record(&mut self, configuration: &Configuration, counts: &Counts) -> Result<()> {
        let slot = *self.index.get(configuration).ok_or_else(|| {
            TomographyError::UnknownConfiguration(configuration.to_string())
        })?;

        for (outcome, &count) in counts {
            validate_bitstring(outcome, self.width)?;
            *self.records[slot].entry(outcome.clone()).or_insert(0) += count;
        }
        Ok(())
    }

    /// Merge a raw full-register record: apply the layout's postselection
    /// (if any), then marginalize down to the measured tomography qubits.
    pub fn add_raw_record(
        &mut self,
        layout: &TomographyLayout,
        configuration: &Configuration,
        raw: &Counts,
    ) -> Result<()> {
        let mut counts = raw.clone();
        if let Some(ps) = layout.postselection() {
            counts = postselect_counts(&counts, ps.bit, ps.accept, layout.register_size() - 1)?;
            // Postselection dropped the ancilla bit: measured-qubit indices
            // above it shift down by one.
            let shifted: Vec<usize> = layout
                .measured_qubits()
                .iter()
                .map(|&q| if q > ps.bit { q - 1 } else { q })
                .collect();
            counts = marginalize_counts(&counts, &shifted)?;
        } else {
            counts = marginalize_counts(&counts, layout.measured_qubits())?;
        }
        self.add_record(configuration, &counts)
    }

    /// Counts recorded for a configuration.
    pub fn counts(&self, configuration: &Configuration) -> Result<&Counts> {
        let slot = *self.index.get(configuration).ok_or_else(|| {
            TomographyError::UnknownConfiguration(configuration.to_string())
        })?;
        Ok(&self.records[slot])
    }

    /// Total shots across every configuration.
    pub fn total_shots(&self) -> u64 {
        self.records
            .iter()
            .map(|counts| counts.values().sum::<u64>())
            .sum()
    }

    /// Normalize every configuration's counts into empirical frequencies.
    ///
    /// Configurations with zero total counts have undefined frequencies;
    /// they are collected and reported together so the caller sees every
    /// offending configuration at once.
    pub fn frequencies(&self) -> Result<Vec<ConfigurationFrequencies>> {
        let mut starved = Vec::new();
        let mut result = Vec::with_capacity(self.configurations.len());

        for (config, counts) in self.configurations.iter().zip(self.records.iter()) {
            let shots: u64 = counts.values().sum();
            if shots == 0 {
                starved.push(config.to_string());
                continue;
            }
            let mut probabilities: Vec<(String, f64)> = counts
                .iter()
                .map(|(outcome, &count)| (outcome.clone(), count as f64 / shots as f64))
                .collect();
            probabilities.sort_by(|a, b| a.0.cmp(&b.0));
            result.push(ConfigurationFrequencies {
                configuration: config.clone(),
                shots,
                probabilities,
            });
        }

        if !starved.is_empty() {
            return Err(TomographyError::InsufficientData {
                configurations: starved,
            });
        }
        Ok(result)
    }
}

fn validate_bitstring(outcome: &str, width: usize) -> Result<()> {
    if outcome.len() != width {
        return Err(TomographyError::DimensionMismatch {
            expected: width,
            actual: outcome.len(),
        });
    }
    if !outcome.chars().all(|ch| ch == '0' || ch == '1') {
        return Err(TomographyError::InvalidValue(format!(
            "outcome '{}' is not a bit-string",
            outcome
        )));
    }
    Ok(())
}

fn bit_of(outcome: &str, bit: usize) -> Result<u8> {
    let chars: Vec<char> = outcome.chars().collect();
    if bit >= chars.len() {
        return Err(TomographyError::InvalidValue(format!(
            "bit {} outside outcome '{}'",
            bit, outcome
        )));
    }
    // Rightmost character is bit 0
    Ok(if chars[chars.len() - 1 - bit] == '1' {
        1
    } else {
        0
    })
}

/// Discard outcomes whose ancilla `bit` is not `accept`, drop that bit from
/// every key, and truncate to the declared tomography width. Distinct raw
/// keys collapsing onto the same filtered key accumulate by summation.
pub fn postselect_counts(raw: &Counts, bit: usize, accept: u8, width: usize) -> Result<Counts> {
    if accept > 1 {
        return Err(TomographyError::InvalidValue(format!(
            "accept value must be 0 or 1, got {}",
            accept
        )));
    }

    let mut filtered = Counts::new();
    for (outcome, &count) in raw {
        if bit_of(outcome, bit)? != accept {
            continue;
        }
        let chars: Vec<char> = outcome.chars().collect();
        let drop_at = chars.len() - 1 - bit;
        let remaining: String = chars
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != drop_at)
            .map(|(_, &ch)| ch)
            .collect();
        if remaining.len() < width {
            return Err(TomographyError::DimensionMismatch {
                expected: width,
                actual: remaining.len(),
            });
        }
        let key: String = remaining[remaining.len() - width..].to_string();
        *filtered.entry(key).or_insert(0) += count;
    }
    Ok(filtered)
}

/// Keep only the bits at the given positions, in order: `kept_bits[i]`
/// becomes bit `i` of the output key. Counts over discarded bits sum.
pub fn marginalize_counts(raw: &Counts, kept_bits: &[usize]) -> Result<Counts> {
    if kept_bits.is_empty() {
        return Err(TomographyError::InvalidValue(
            "no bits selected for marginalization".to_string(),
        ));
    }

    let mut marginal = Counts::new();
    for (outcome, &count) in raw {
        let mut key: Vec<char> = Vec::with_capacity(kept_bits.len());
        for &bit in kept_bits.iter().rev() {
            key.push(if bit_of(outcome, bit)? == 1 { '1' } else { '0' });
        }
        let key: String = key.into_iter().collect();
        *marginal.entry(key).or_insert(0) += count;
    }
    Ok(marginal)
}
