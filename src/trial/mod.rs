//! Timed trials
//!
//! A trial measures one inference query on one compiled model:
//!
//! 1. Repeat the call over the whole dataset until the time budget is spent
//!    ([`run_budgeted`]), synchronizing before each timer stops and timing
//!    the release of each output separately. With an [`AllocationMeter`]
//!    attached, the host bytes allocated during each call are measured.
//! 2. Run one extra call in instrumented mode and extract the device bytes
//!    from its report ([`MemoryProbe`]).
//! 3. Reduce the samples to medians.

mod alloc;
mod budget;
mod probe;
mod units;

pub use alloc::{AllocationMeter, CountingAllocator};
pub use budget::{median, median_bytes, run_budgeted};
pub use probe::{DiagnosticProbe, FixedProbe, MemoryProbe, ReportEmitter};
pub use units::{
    convert_to_bytes, format_memory, parse_gpu_allocations, MemoryUnit, GPU_ALLOCATIONS_MARKER,
};

pub use crate::backend::{InferenceMode, TrialInput};

use crate::backend::{CircuitBackend, DeviceContext};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::{Duration, Instant};

/// Aggregated measurements of one trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Median wall-clock time per call (nanoseconds)
    pub median_time: f64,
    /// Median time spent releasing each call's output (nanoseconds)
    pub median_gctime: f64,
    /// Median host bytes allocated per call.
    ///
    /// Measured by the runner's [`AllocationMeter`] when one is attached;
    /// for a backend whose device memory lives in host RAM this includes
    /// the device workspace. Without a meter, the bytes the backend
    /// accounts for the call's output.
    pub cpu_alloc_memory: u64,
    /// Device bytes allocated by the instrumented call
    pub cuda_alloc_memory: u64,
    /// Number of timed calls
    pub num_samples: usize,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    time: Duration,
    gctime: Duration,
    host_bytes: u64,
}

/// Runs budgeted trials on one device.
#[derive(Debug, Clone, Copy)]
pub struct TrialRunner {
    device: DeviceContext,
    budget: Duration,
    batch_size: usize,
    meter: Option<&'static dyn AllocationMeter>,
}

impl TrialRunner {
    /// Runner for `device` with a per-trial time `budget`.
    #[must_use]
    pub const fn new(device: DeviceContext, budget: Duration, batch_size: usize) -> Self {
        Self {
            device,
            budget,
            batch_size,
            meter: None,
        }
    }

    /// Measure host allocations of each timed call with `meter`.
    #[must_use]
    pub fn with_allocation_meter(mut self, meter: &'static dyn AllocationMeter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Time budget per trial.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Rows per inference batch.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Measure `input` on `model`.
    ///
    /// # Errors
    /// Returns error if the backend runs on another device, any call fails,
    /// or the probe cannot extract device bytes
    #[allow(clippy::cast_precision_loss)]
    pub fn run<B, P>(
        &self,
        backend: &B,
        probe: &mut P,
        model: &B::Compiled,
        input: TrialInput<'_>,
    ) -> Result<TrialResult>
    where
        B: CircuitBackend + ?Sized,
        P: MemoryProbe + ?Sized,
    {
        if backend.device() != self.device {
            return Err(Error::Backend(format!(
                "Trial runner targets device {} but backend runs on device {}",
                self.device.id(),
                backend.device().id()
            )));
        }

        let samples = run_budgeted(
            || {
                let before = self.meter.map(AllocationMeter::allocated);
                let start = Instant::now();
                let output = backend.infer(model, input, self.batch_size)?;
                backend.synchronize()?;
                let time = start.elapsed();

                let host_bytes = match (self.meter, before) {
                    (Some(meter), Some(before)) => meter.allocated().since(before).bytes,
                    _ => output.host.bytes,
                };
                let release = Instant::now();
                drop(output);
                let gctime = release.elapsed();

                tracing::debug!(mode = %input.mode(), ?time, "sample");
                Ok(Sample {
                    time,
                    gctime,
                    host_bytes,
                })
            },
            self.budget,
        )?;

        let cuda_alloc_memory = probe.device_bytes(&mut |report: &mut dyn Write| {
            backend.instrumented(model, input, self.batch_size, report)
        })?;

        let times: Vec<f64> = samples.iter().map(|s| s.time.as_nanos() as f64).collect();
        let gctimes: Vec<f64> = samples.iter().map(|s| s.gctime.as_nanos() as f64).collect();
        let host: Vec<u64> = samples.iter().map(|s| s.host_bytes).collect();
        let empty = || Error::Other("Trial produced no samples".to_string());

        let result = TrialResult {
            median_time: median(&times).ok_or_else(empty)?,
            median_gctime: median(&gctimes).ok_or_else(empty)?,
            cpu_alloc_memory: median_bytes(&host).ok_or_else(empty)?,
            cuda_alloc_memory,
            num_samples: samples.len(),
        };
        tracing::info!(
            mode = %input.mode(),
            rows = input.rows(),
            samples = result.num_samples,
            median_ms = result.median_time / 1e6,
            device = %format_memory(result.cuda_alloc_memory),
            "trial complete"
        );
        Ok(result)
    }
}
