//! Per-point failure isolation

use pcbench::backend::{
    AllocationTally, CircuitBackend, DeviceContext, InferenceOutput, InferenceValues, TrialInput,
};
use pcbench::circuit::{HcltParams, StructuralStats};
use pcbench::config::BenchConfig;
use pcbench::dataset::{synthetic, Matrix, PreparedData};
use pcbench::experiment::{ExperimentDriver, ModelConfig, ModelParams, Sweep, SweepAxis, SweepPlan};
use pcbench::trial::{DiagnosticProbe, FixedProbe, MemoryProbe};
use pcbench::{Error, Result};
use std::io::Write;

/// Fails inference for one latent count, with a configurable error.
struct FlakyBackend {
    failing_latents: usize,
    fatal: bool,
}

impl CircuitBackend for FlakyBackend {
    type Host = usize;
    type Compiled = usize;

    fn device(&self) -> DeviceContext {
        DeviceContext::new(0)
    }

    fn build(&self, config: &ModelConfig, _data: &PreparedData) -> Result<usize> {
        match config.params {
            ModelParams::Hclt(p) => Ok(p.latents),
            ModelParams::Rat(_) => Err(Error::Backend("RAT not supported".to_string())),
        }
    }

    fn stats(&self, latents: &usize) -> StructuralStats {
        StructuralStats {
            num_inputs: *latents as u64,
            ..StructuralStats::default()
        }
    }

    fn compile(&self, host: usize) -> Result<usize> {
        Ok(host)
    }

    fn evi(&self, latents: &usize, data: &Matrix<u8>, _batch: usize) -> Result<InferenceOutput> {
        if *latents == self.failing_latents {
            return Err(if self.fatal {
                Error::UnitConversion {
                    unit: "TiB".to_string(),
                }
            } else {
                Error::Backend("kernel launch failed".to_string())
            });
        }
        Ok(InferenceOutput {
            values: InferenceValues::LogLikelihoods(vec![0.0; data.rows()]),
            host: AllocationTally::default(),
        })
    }

    fn map(&self, _: &usize, _: &Matrix<Option<u8>>, _: usize) -> Result<InferenceOutput> {
        Err(Error::Backend("MAP not supported".to_string()))
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn instrumented(
        &self,
        _: &usize,
        _: TrialInput<'_>,
        _: usize,
        _: &mut dyn Write,
    ) -> Result<()> {
        Ok(())
    }
}

fn run_with<P: MemoryProbe>(
    backend: &FlakyBackend,
    probe: P,
    isolate: bool,
) -> Result<pcbench::experiment::ExperimentReport> {
    let config = BenchConfig::builder()
        .budget_secs(0.0)
        .isolate_failures(isolate)
        .build()
        .unwrap();
    let data = PreparedData::prepare(synthetic(4, 6, 0), config.prepare_options()).unwrap();
    let plan = SweepPlan::new(
        ModelParams::Hclt(HcltParams::default()),
        vec![Sweep::new(SweepAxis::Latents, vec![2, 4, 8])],
    )
    .unwrap();
    let mut driver = ExperimentDriver::new(backend, probe, config);
    driver.run_plan(&plan, &data)
}

fn run(isolate: bool, fatal: bool) -> Result<pcbench::experiment::ExperimentReport> {
    let backend = FlakyBackend {
        failing_latents: 4,
        fatal,
    };
    run_with(&backend, FixedProbe::new(100), isolate)
}

#[test]
fn test_failure_aborts_by_default() {
    let err = run(false, false).unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
}

#[test]
fn test_isolated_failure_is_recorded() {
    let report = run(true, false).unwrap();
    let records = report.records("latents").unwrap();
    assert_eq!(records.len(), 3);
    assert!(!records[0].is_failed());
    assert!(records[1].is_failed());
    assert!(records[1].error().unwrap().contains("kernel launch failed"));
    assert_eq!(records[1].stats().unwrap().num_inputs, 4);
    assert!(records[1].results().is_none());
    assert!(!records[2].is_failed());
    assert_eq!(records[2].results().unwrap().evi.cuda_alloc_memory, 100);
}

#[test]
fn test_fatal_error_escapes_isolation() {
    let err = run(true, true).unwrap_err();
    assert!(matches!(err, Error::UnitConversion { .. }));
}

#[test]
fn test_report_without_marker_aborts_run() {
    // instrumented calls write an empty report
    let backend = FlakyBackend {
        failing_latents: 0,
        fatal: false,
    };
    let err = run_with(&backend, DiagnosticProbe::new(), false).unwrap_err();
    assert!(matches!(err, Error::DiagnosticParse(_)), "{err}");
}
