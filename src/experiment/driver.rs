//! Experiment Driver - runs every sweep point of a family

use super::{BenchmarkRecord, ExperimentReport, ModelConfig, ModelFamily, SweepPlan, TrialResults};
use crate::backend::{CircuitBackend, TrialInput};
use crate::circuit::StructuralStats;
use crate::config::BenchConfig;
use crate::dataset::PreparedData;
use crate::trial::{AllocationMeter, MemoryProbe, TrialRunner};
use crate::Result;

/// Runs sweep plans against one backend and probe.
///
/// Each point is independent: build, stats, compile, EVI trial, then a MAP
/// trial when enabled for the family. The compiled model is dropped before
/// the next point is built.
pub struct ExperimentDriver<'a, B: CircuitBackend, P: MemoryProbe> {
    backend: &'a B,
    probe: P,
    runner: TrialRunner,
    config: BenchConfig,
}

impl<'a, B: CircuitBackend, P: MemoryProbe> ExperimentDriver<'a, B, P> {
    /// Driver using `backend` and `probe` under `config`.
    #[must_use]
    pub fn new(backend: &'a B, probe: P, config: BenchConfig) -> Self {
        let runner = TrialRunner::new(backend.device(), config.budget(), config.batch_size);
        Self {
            backend,
            probe,
            runner,
            config,
        }
    }

    /// Measure host allocations of every trial with `meter`.
    #[must_use]
    pub fn with_allocation_meter(mut self, meter: &'static dyn AllocationMeter) -> Self {
        self.runner = self.runner.with_allocation_meter(meter);
        self
    }

    /// Run configuration.
    #[must_use]
    pub const fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run the full default plan of `family`.
    ///
    /// # Errors
    /// Returns the first error of a point, unless failures are isolated and
    /// the error is not fatal
    pub fn run_family(
        &mut self,
        family: ModelFamily,
        data: &PreparedData,
    ) -> Result<ExperimentReport> {
        self.run_plan(&SweepPlan::default_for(family), data)
    }

    /// Run every point of `plan`, in order.
    ///
    /// # Errors
    /// Returns the first error of a point, unless failures are isolated and
    /// the error is not fatal
    pub fn run_plan(&mut self, plan: &SweepPlan, data: &PreparedData) -> Result<ExperimentReport> {
        let family = plan.family();
        let points = plan.points()?;
        let total = points.len();
        let mut report = ExperimentReport::new(family);

        for (i, (axis, params)) in points.into_iter().enumerate() {
            let config = ModelConfig {
                params,
                batch_size: self.config.batch_size,
                seed: self.config.model_seed,
            };
            tracing::info!(%family, %axis, point = i + 1, total, ?params, "sweep point");

            let mut stats = None;
            let record = match self.run_point(&config, data, &mut stats) {
                Ok(results) => {
                    // stats are always set once the model was built
                    BenchmarkRecord::measured(config.hparams(), stats.unwrap_or_default(), results)
                }
                Err(e) if self.config.isolate_failures && !e.is_fatal() => {
                    tracing::warn!(%family, %axis, error = %e, "sweep point failed, continuing");
                    BenchmarkRecord::builder(config.hparams())
                        .stats(stats)
                        .error(e.to_string())
                        .build()
                }
                Err(e) => return Err(e),
            };
            report.push(axis.name(), record);
        }

        if report.num_failed() > 0 {
            tracing::warn!(
                %family,
                failed = report.num_failed(),
                total,
                "some sweep points failed"
            );
        }
        Ok(report)
    }

    fn run_point(
        &mut self,
        config: &ModelConfig,
        data: &PreparedData,
        stats: &mut Option<StructuralStats>,
    ) -> Result<TrialResults> {
        let host = self.backend.build(config, data)?;
        let collected = self.backend.stats(&host);
        *stats = Some(collected);
        tracing::info!(
            inputs = collected.num_inputs,
            prods = collected.num_prods,
            sums = collected.num_sums,
            params = collected.num_params,
            "built model"
        );

        let model = self.backend.compile(host)?;
        let evi = self.runner.run(
            self.backend,
            &mut self.probe,
            &model,
            TrialInput::Evi(data.raw()),
        )?;
        let map = if self.config.runs_map(config.family()) {
            Some(self.runner.run(
                self.backend,
                &mut self.probe,
                &model,
                TrialInput::Map(data.missing()),
            )?)
        } else {
            None
        };
        Ok(TrialResults { evi, map })
    }

    /// Give back the probe, e.g. to inspect its last report.
    pub fn into_probe(self) -> P {
        self.probe
    }
}

