//! pcbench command line
//!
//! ```text
//! pcbench <DEVICE> <RAT|HCLT> [options]
//! ```
//!
//! Runs every sweep point of the family and writes
//! `<prefix>-<FAMILY>-trials.json`. Logs go to stderr (`RUST_LOG`, default
//! `info`).

use anyhow::{Context, Result};
use clap::Parser;
use pcbench::backend::{CpuBackend, DeviceContext};
use pcbench::config::{BenchConfig, SyntheticShape};
use pcbench::dataset::{load, synthetic, DatasetName, PreparedData};
use pcbench::experiment::{ExperimentDriver, ModelFamily};
use pcbench::trial::{CountingAllocator, DiagnosticProbe};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator::new();

#[derive(Parser, Debug)]
#[command(name = "pcbench")]
#[command(about = "Inference benchmarks for RAT and HCLT probabilistic circuits")]
#[command(version)]
struct Args {
    /// Device index
    device: usize,

    /// Circuit family (case-sensitive)
    #[arg(value_enum)]
    family: ModelFamily,

    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset to load from the data directory
    #[arg(long, value_enum)]
    dataset: Option<DatasetName>,

    /// Directory holding <dataset>.parquet
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Use a seeded random dataset of shape <ROWS>x<COLS> instead
    #[arg(long, value_parser = parse_shape)]
    synthetic: Option<SyntheticShape>,

    /// Keep only the first N rows
    #[arg(long)]
    max_rows: Option<usize>,

    /// Time budget per trial, seconds
    #[arg(long)]
    budget_secs: Option<f64>,

    /// Rows per inference batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Fraction of columns hidden for MAP trials
    #[arg(long)]
    missing_fraction: Option<f64>,

    /// Bits dropped from pixel values for structure learning
    #[arg(long)]
    truncate_bits: Option<u32>,

    /// Report file prefix
    #[arg(long)]
    output_prefix: Option<String>,

    /// Report directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Record failed sweep points instead of aborting
    #[arg(long)]
    isolate_failures: bool,

    /// Also run MAP trials for HCLT
    #[arg(long)]
    map_hclt: bool,

    /// Device pool threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,
}

fn parse_shape(s: &str) -> std::result::Result<SyntheticShape, String> {
    s.parse().map_err(|e: pcbench::Error| e.to_string())
}

impl Args {
    fn into_config(self) -> Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_json_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(dataset) = self.dataset {
            config.dataset = dataset;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if self.synthetic.is_some() {
            config.synthetic = self.synthetic;
        }
        if self.max_rows.is_some() {
            config.max_rows = self.max_rows;
        }
        if let Some(secs) = self.budget_secs {
            config.budget_secs = secs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(fraction) = self.missing_fraction {
            config.missing_fraction = fraction;
        }
        if let Some(bits) = self.truncate_bits {
            config.truncate_bits = bits;
        }
        if let Some(prefix) = self.output_prefix {
            config.output_prefix = prefix;
        }
        if let Some(dir) = self.out_dir {
            config.out_dir = dir;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        config.isolate_failures |= self.isolate_failures;
        if self.map_hclt && !config.runs_map(ModelFamily::Hclt) {
            config.map_families.push(ModelFamily::Hclt);
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let device = DeviceContext::new(args.device);
    let family = args.family;
    let config = args.into_config().context("Invalid configuration")?;

    let mut raw = match config.synthetic {
        Some(shape) => synthetic(shape.rows, shape.cols, config.model_seed),
        None => load(config.dataset, &config.data_dir).with_context(|| {
            format!(
                "Failed to load {} from {}",
                config.dataset,
                config.data_dir.display()
            )
        })?,
    };
    if let Some(rows) = config.max_rows {
        raw = raw.head(rows);
    }
    tracing::info!(rows = raw.rows(), features = raw.cols(), "dataset ready");

    let prepared = PreparedData::prepare(raw, config.prepare_options())
        .context("Failed to prepare datasets")?;
    let backend = CpuBackend::new(device, config.threads).context("Failed to start backend")?;

    let out_dir = config.out_dir.clone();
    let prefix = config.output_prefix.clone();
    let mut driver = ExperimentDriver::new(&backend, DiagnosticProbe::new(), config)
        .with_allocation_meter(&ALLOCATOR);
    let report = driver
        .run_family(family, &prepared)
        .with_context(|| format!("{family} benchmark aborted"))?;

    let path = report
        .write(&out_dir, &prefix)
        .with_context(|| format!("Failed to write report to {}", out_dir.display()))?;
    println!("{}", path.display());
    Ok(())
}
