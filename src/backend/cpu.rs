//! Reference CPU backend
//!
//! Runs compiled circuits on a dedicated rayon pool. `pool.install` blocks
//! until the call returns, so every call is already synchronized when it
//! hands back its output.

use super::{
    CircuitBackend, DeviceContext, DeviceMemory, InferenceOutput, TrialInput, PARAM_PERTURBATION,
};
use crate::circuit::{
    build_hclt, build_rat, init_parameters, CompiledCircuit, HostCircuit, StructuralStats,
};
use crate::dataset::{Matrix, PreparedData};
use crate::experiment::{ModelConfig, ModelParams};
use crate::trial::format_memory;
use crate::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use std::time::Instant;

/// CPU implementation of [`CircuitBackend`]
pub struct CpuBackend {
    device: DeviceContext,
    memory: DeviceMemory,
    #[cfg(feature = "rayon")]
    pool: rayon::ThreadPool,
}

impl CpuBackend {
    /// Create a backend for `device`. `threads = None` sizes the pool to
    /// the available cores.
    ///
    /// # Errors
    /// Returns error if the device pool cannot be created
    pub fn new(device: DeviceContext, threads: Option<usize>) -> Result<Self> {
        #[cfg(feature = "rayon")]
        let pool = {
            let id = device.id();
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads.unwrap_or(0))
                .thread_name(move |i| format!("pcbench-device-{id}-{i}"))
                .build()
                .map_err(|e| {
                    crate::Error::Backend(format!(
                        "Failed to start pool for device {id}: {e}"
                    ))
                })?
        };
        #[cfg(not(feature = "rayon"))]
        let _ = threads;

        tracing::info!(device = device.id(), "CPU backend ready");
        Ok(Self {
            device,
            memory: DeviceMemory::new(),
            #[cfg(feature = "rayon")]
            pool,
        })
    }

    /// Device memory counters.
    #[must_use]
    pub const fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    /// Worker threads executing device work.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        #[cfg(feature = "rayon")]
        {
            self.pool.current_num_threads()
        }
        #[cfg(not(feature = "rayon"))]
        {
            1
        }
    }

    fn on_device<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        #[cfg(feature = "rayon")]
        {
            self.pool.install(op)
        }
        #[cfg(not(feature = "rayon"))]
        {
            op()
        }
    }
}

impl CircuitBackend for CpuBackend {
    type Host = HostCircuit;
    type Compiled = CompiledCircuit;

    fn device(&self) -> DeviceContext {
        self.device
    }

    fn build(&self, config: &ModelConfig, data: &PreparedData) -> Result<HostCircuit> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut host = match &config.params {
            ModelParams::Rat(params) => build_rat(data.num_features(), params, &mut rng)?,
            ModelParams::Hclt(params) => build_hclt(data.truncated(), params)?,
        };
        init_parameters(&mut host, PARAM_PERTURBATION, &mut rng)?;
        Ok(host)
    }

    fn stats(&self, host: &HostCircuit) -> StructuralStats {
        host.stats()
    }

    fn compile(&self, host: HostCircuit) -> Result<CompiledCircuit> {
        let compiled = CompiledCircuit::compile(host)?;
        tracing::debug!(
            units = compiled.num_units(),
            bytes = compiled.size_bytes(),
            "compiled circuit"
        );
        Ok(compiled)
    }

    fn evi(
        &self,
        model: &CompiledCircuit,
        data: &Matrix<u8>,
        batch_size: usize,
    ) -> Result<InferenceOutput> {
        let lls = self.on_device(|| model.log_likelihoods(data, batch_size, &self.memory))?;
        Ok(InferenceOutput::log_likelihoods(lls))
    }

    fn map(
        &self,
        model: &CompiledCircuit,
        data: &Matrix<Option<u8>>,
        batch_size: usize,
    ) -> Result<InferenceOutput> {
        let states = self.on_device(|| model.map_states(data, batch_size, &self.memory))?;
        Ok(InferenceOutput::states(states))
    }

    fn synchronize(&self) -> Result<()> {
        self.on_device(|| ());
        Ok(())
    }

    fn instrumented(
        &self,
        model: &CompiledCircuit,
        input: TrialInput<'_>,
        batch_size: usize,
        report: &mut dyn Write,
    ) -> Result<()> {
        self.memory.reset();
        let start = Instant::now();
        let output = self.infer(model, input, batch_size)?;
        let secs = start.elapsed().as_secs_f64();
        let device = self.memory.snapshot();

        writeln!(
            report,
            "{secs:.6} seconds ({} CPU allocations: {}) ({} GPU allocations: {})",
            output.host.allocations,
            format_memory(output.host.bytes),
            device.allocations,
            format_memory(device.bytes),
        )?;
        Ok(())
    }
}
