//! Benchmark experiments
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentReport ──< axis ("latents", "rg_depth", ...) ──< BenchmarkRecord (N, sweep order)
//!                                                               │
//!                                                               ├── hparams (family params + batch_size)
//!                                                               ├── stats   (StructuralStats)
//!                                                               └── results { evi, map? } | error
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pcbench::backend::{CpuBackend, DeviceContext};
//! use pcbench::config::BenchConfig;
//! use pcbench::dataset::{synthetic, PreparedData};
//! use pcbench::experiment::{ExperimentDriver, ModelFamily};
//! use pcbench::trial::DiagnosticProbe;
//!
//! let config = BenchConfig::builder().budget_secs(0.1).build()?;
//! let data = PreparedData::prepare(synthetic(64, 16, 0), config.prepare_options())?;
//! let backend = CpuBackend::new(DeviceContext::new(0), None)?;
//!
//! let mut driver = ExperimentDriver::new(&backend, DiagnosticProbe::new(), config);
//! let report = driver.run_family(ModelFamily::Hclt, &data)?;
//! report.write(std::path::Path::new("."), "pcs-jl")?;
//! # Ok::<(), pcbench::Error>(())
//! ```

mod driver;
mod model_config;
mod record;
mod report;
mod sweep;

pub use driver::ExperimentDriver;
pub use model_config::{Hparams, ModelConfig, ModelFamily, ModelParams};
pub use record::{BenchmarkRecord, BenchmarkRecordBuilder, TrialResults};
pub use report::{ExperimentReport, DEFAULT_PREFIX};
pub use sweep::{Sweep, SweepAxis, SweepPlan};
