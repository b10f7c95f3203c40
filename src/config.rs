//! Run configuration
//!
//! Every field has a default, so a JSON config file only needs the keys it
//! changes. Command-line flags are applied on top of the file.

use crate::dataset::{DatasetName, PrepareOptions};
use crate::experiment::{ModelFamily, DEFAULT_PREFIX};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Shape of a generated dataset, written `<ROWS>x<COLS>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticShape {
    /// Number of rows
    pub rows: usize,
    /// Number of feature columns
    pub cols: usize,
}

impl FromStr for SyntheticShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            Error::Configuration(format!(
                "Invalid synthetic shape '{s}'\nExpected <ROWS>x<COLS>, e.g. 64x784"
            ))
        };
        let (rows, cols) = s.split_once('x').ok_or_else(invalid)?;
        let rows: usize = rows.trim().parse().map_err(|_| invalid())?;
        let cols: usize = cols.trim().parse().map_err(|_| invalid())?;
        Ok(Self { rows, cols })
    }
}

/// Everything a benchmark run needs besides the device and family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Dataset to load
    pub dataset: DatasetName,
    /// Directory holding `<dataset>.parquet`
    pub data_dir: PathBuf,
    /// Generate a seeded dataset of this shape instead of loading one
    pub synthetic: Option<SyntheticShape>,
    /// Keep only the first rows of the dataset
    pub max_rows: Option<usize>,
    /// Time budget per trial, seconds
    pub budget_secs: f64,
    /// Rows per inference batch
    pub batch_size: usize,
    /// Fraction of columns hidden for MAP trials
    pub missing_fraction: f64,
    /// Seed for the hidden-column choice
    pub missing_seed: u64,
    /// Bits dropped for structure learning
    pub truncate_bits: u32,
    /// Seed for model construction
    pub model_seed: u64,
    /// Report file prefix
    pub output_prefix: String,
    /// Report directory
    pub out_dir: PathBuf,
    /// Record failed points instead of aborting the run
    pub isolate_failures: bool,
    /// Families that also run MAP trials
    pub map_families: Vec<ModelFamily>,
    /// Device pool threads (`None`: one per core)
    pub threads: Option<usize>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetName::Mnist,
            data_dir: PathBuf::from("data"),
            synthetic: None,
            max_rows: None,
            budget_secs: 5.0,
            batch_size: 512,
            missing_fraction: 0.5,
            missing_seed: 42,
            truncate_bits: 4,
            model_seed: 42,
            output_prefix: DEFAULT_PREFIX.to_string(),
            out_dir: PathBuf::from("."),
            isolate_failures: false,
            map_families: vec![ModelFamily::Rat],
            threads: None,
        }
    }
}

impl BenchConfig {
    /// Create a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::default()
    }

    /// Load from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            Error::Configuration(format!("Invalid config {}: {e}", path.display()))
        })
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch_size must be > 0".to_string()));
        }
        if !self.budget_secs.is_finite() || self.budget_secs < 0.0 {
            return Err(Error::Configuration(format!(
                "budget_secs must be a non-negative number, got {}",
                self.budget_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.missing_fraction) {
            return Err(Error::Configuration(format!(
                "missing_fraction must be in [0, 1], got {}",
                self.missing_fraction
            )));
        }
        if self.output_prefix.is_empty() {
            return Err(Error::Configuration("output_prefix must not be empty".to_string()));
        }
        if let Some(shape) = self.synthetic {
            if shape.rows == 0 || shape.cols == 0 {
                return Err(Error::Configuration(format!(
                    "Synthetic shape {}x{} must be non-empty",
                    shape.rows, shape.cols
                )));
            }
        }
        if self.max_rows == Some(0) {
            return Err(Error::Configuration("max_rows must be > 0".to_string()));
        }
        if self.threads == Some(0) {
            return Err(Error::Configuration("threads must be > 0".to_string()));
        }
        Ok(())
    }

    /// Trial time budget.
    #[must_use]
    pub fn budget(&self) -> Duration {
        Duration::from_secs_f64(self.budget_secs)
    }

    /// Dataset preparation options.
    #[must_use]
    pub const fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            missing_fraction: self.missing_fraction,
            missing_seed: self.missing_seed,
            truncate_bits: self.truncate_bits,
        }
    }

    /// Whether `family` runs MAP trials.
    #[must_use]
    pub fn runs_map(&self, family: ModelFamily) -> bool {
        self.map_families.contains(&family)
    }
}

/// Builder for `BenchConfig`.
#[derive(Debug, Default)]
pub struct BenchConfigBuilder {
    config: BenchConfig,
}

impl BenchConfigBuilder {
    /// Start from an existing configuration.
    #[must_use]
    pub const fn from_config(config: BenchConfig) -> Self {
        Self { config }
    }

    /// Set the dataset.
    #[must_use]
    pub const fn dataset(mut self, dataset: DatasetName) -> Self {
        self.config.dataset = dataset;
        self
    }

    /// Set the data directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Use a generated dataset.
    #[must_use]
    pub const fn synthetic(mut self, rows: usize, cols: usize) -> Self {
        self.config.synthetic = Some(SyntheticShape { rows, cols });
        self
    }

    /// Limit the number of rows.
    #[must_use]
    pub const fn max_rows(mut self, rows: usize) -> Self {
        self.config.max_rows = Some(rows);
        self
    }

    /// Set the per-trial budget in seconds.
    #[must_use]
    pub fn budget_secs(mut self, secs: f64) -> Self {
        self.config.budget_secs = secs;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the hidden column fraction.
    #[must_use]
    pub fn missing_fraction(mut self, fraction: f64) -> Self {
        self.config.missing_fraction = fraction;
        self
    }

    /// Set the truncation bits.
    #[must_use]
    pub const fn truncate_bits(mut self, bits: u32) -> Self {
        self.config.truncate_bits = bits;
        self
    }

    /// Set the report prefix.
    #[must_use]
    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    /// Set the report directory.
    #[must_use]
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.out_dir = dir.into();
        self
    }

    /// Record failed points instead of aborting.
    #[must_use]
    pub const fn isolate_failures(mut self, isolate: bool) -> Self {
        self.config.isolate_failures = isolate;
        self
    }

    /// Enable MAP trials for `family`.
    #[must_use]
    pub fn map_family(mut self, family: ModelFamily) -> Self {
        if !self.config.map_families.contains(&family) {
            self.config.map_families.push(family);
        }
        self
    }

    /// Set the device pool size.
    #[must_use]
    pub const fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }

    /// Validate and build the `BenchConfig`.
    ///
    /// # Errors
    /// Returns error if a value is out of range
    pub fn build(self) -> Result<BenchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
