//! # pcbench: Probabilistic Circuit Inference Benchmarks
//!
//! **Version**: 0.1.0
//!
//! pcbench measures inference performance of probabilistic circuits: median
//! wall-clock time, median output reclamation time, host memory and device
//! memory, for full-evidence likelihoods (EVI) and MAP completion under
//! missing data. Two circuit families are swept over their structure
//! hyperparameters:
//!
//! - **RAT**: random binary region graphs with cross-product partitions
//! - **HCLT**: hidden Chow-Liu trees learned from (truncated) data
//!
//! ## Pipeline
//!
//! ```text
//! dataset ──> PreparedData ──> for each sweep point:
//!                                  build ─> stats ─> compile ─> EVI trial ─> MAP trial?
//!                              ──> ExperimentReport ──> <prefix>-<FAMILY>-trials.json
//! ```
//!
//! The circuit library is reached only through [`backend::CircuitBackend`];
//! [`backend::CpuBackend`] is the bundled reference implementation.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pcbench::dataset::{load, DatasetName, PreparedData, PrepareOptions};
//!
//! let raw = load(DatasetName::Mnist, "data")?;
//! let prepared = PreparedData::prepare(raw, PrepareOptions::default())?;
//! println!("{} hidden columns", prepared.missing_columns().len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod backend;
pub mod circuit;
pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod trial;

pub use config::BenchConfig;
pub use error::{Error, Result};
