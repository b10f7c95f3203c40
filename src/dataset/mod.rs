//! Dataset preparation
//!
//! Loads a flattened image dataset once per run and derives the two
//! companion views used by the sweep:
//!
//! ```text
//! RawDataset (N x F, u8) ──┬── inject_missingness ──> MissingnessDataset (MAP trials)
//!                          └── truncate ────────────> TruncatedDataset (HCLT structure learning)
//! ```
//!
//! All three are read-only for the rest of the run.

mod loader;
mod matrix;
mod transform;

pub use loader::{load, load_parquet, synthetic, write_parquet, DatasetName};
pub use matrix::Matrix;
pub use transform::{
    inject_missingness, mask_columns, missing_column_count, select_missing_columns, truncate,
};

use crate::Result;

/// Options for deriving the missingness and truncated views
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareOptions {
    /// Fraction of feature columns hidden for MAP trials
    pub missing_fraction: f64,
    /// Seed for choosing the hidden columns
    pub missing_seed: u64,
    /// Bits dropped from each value for structure learning
    pub truncate_bits: u32,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            missing_fraction: 0.5,
            missing_seed: 42,
            truncate_bits: 4,
        }
    }
}

/// The datasets shared by every sweep point.
#[derive(Debug, Clone)]
pub struct PreparedData {
    raw: Matrix<u8>,
    missing: Matrix<Option<u8>>,
    truncated: Matrix<u8>,
    missing_columns: Vec<usize>,
}

impl PreparedData {
    /// Derive the missingness and truncated views from a raw dataset.
    ///
    /// # Errors
    /// Returns error if the missing fraction is outside `[0, 1]`
    pub fn prepare(raw: Matrix<u8>, options: PrepareOptions) -> Result<Self> {
        let missing_columns =
            select_missing_columns(raw.cols(), options.missing_fraction, options.missing_seed)?;
        let missing = mask_columns(&raw, &missing_columns);
        let truncated = truncate(&raw, options.truncate_bits);
        tracing::debug!(
            rows = raw.rows(),
            cols = raw.cols(),
            hidden = missing_columns.len(),
            truncate_bits = options.truncate_bits,
            "prepared datasets"
        );
        Ok(Self {
            raw,
            missing,
            truncated,
            missing_columns,
        })
    }

    /// Fully observed dataset (EVI trials).
    #[must_use]
    pub const fn raw(&self) -> &Matrix<u8> {
        &self.raw
    }

    /// Dataset with hidden columns (MAP trials).
    #[must_use]
    pub const fn missing(&self) -> &Matrix<Option<u8>> {
        &self.missing
    }

    /// Truncated dataset (structure learning only).
    #[must_use]
    pub const fn truncated(&self) -> &Matrix<u8> {
        &self.truncated
    }

    /// Indices of the hidden columns, ascending.
    #[must_use]
    pub fn missing_columns(&self) -> &[usize] {
        &self.missing_columns
    }

    /// Number of feature columns.
    #[must_use]
    pub const fn num_features(&self) -> usize {
        self.raw.cols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_keeps_raw_intact() {
        let raw = synthetic(8, 12, 5);
        let prepared = PreparedData::prepare(raw.clone(), PrepareOptions::default()).unwrap();
        assert_eq!(prepared.raw(), &raw);
        assert_eq!(prepared.missing_columns().len(), 6);
        assert_eq!(prepared.truncated(), &truncate(&raw, 4));
        assert_eq!(prepared.num_features(), 12);
    }
}
