//! Circuit backends
//!
//! The harness never touches a circuit directly. It builds, inspects,
//! compiles and runs models through [`CircuitBackend`], so the measurement
//! protocol is independent of where the circuit executes.
//!
//! The reference implementation is [`CpuBackend`]: its "device" is a
//! dedicated rayon pool and its device memory is the per-batch node-value
//! workspace, counted by [`DeviceMemory`].

mod cpu;
mod device;

pub use cpu::CpuBackend;
pub use device::{AllocationTally, DeviceContext, DeviceMemory};

use crate::circuit::StructuralStats;
use crate::dataset::{Matrix, PreparedData};
use crate::experiment::ModelConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Perturbation applied to uniform parameters right after construction
pub const PARAM_PERTURBATION: f32 = 0.5;

/// Inference query being timed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Likelihood of fully observed rows
    Evi,
    /// Most probable completion of partially observed rows
    Map,
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evi => write!(f, "evi"),
            Self::Map => write!(f, "map"),
        }
    }
}

/// Dataset handed to one inference call.
#[derive(Debug, Clone, Copy)]
pub enum TrialInput<'a> {
    /// Fully observed rows
    Evi(&'a Matrix<u8>),
    /// Rows with hidden cells
    Map(&'a Matrix<Option<u8>>),
}

impl TrialInput<'_> {
    /// Query this input is evaluated with.
    #[must_use]
    pub const fn mode(&self) -> InferenceMode {
        match self {
            Self::Evi(_) => InferenceMode::Evi,
            Self::Map(_) => InferenceMode::Map,
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        match self {
            Self::Evi(data) => data.rows(),
            Self::Map(data) => data.rows(),
        }
    }
}

/// Values returned by an inference call.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceValues {
    /// One log-likelihood per row
    LogLikelihoods(Vec<f32>),
    /// Completed rows
    States(Matrix<u8>),
}

/// Result of one inference call plus its host allocations.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    /// Call output
    pub values: InferenceValues,
    /// Host memory the backend accounts for the output, reported when the
    /// trial runner has no allocation meter
    pub host: AllocationTally,
}

impl InferenceOutput {
    /// Wrap log-likelihoods, accounting their buffer as one host allocation.
    #[must_use]
    pub fn log_likelihoods(values: Vec<f32>) -> Self {
        let bytes = (values.len() * std::mem::size_of::<f32>()) as u64;
        Self {
            values: InferenceValues::LogLikelihoods(values),
            host: AllocationTally {
                allocations: 1,
                bytes,
            },
        }
    }

    /// Wrap completed rows, accounting their buffer as one host allocation.
    #[must_use]
    pub fn states(values: Matrix<u8>) -> Self {
        let bytes = values.size_bytes() as u64;
        Self {
            values: InferenceValues::States(values),
            host: AllocationTally {
                allocations: 1,
                bytes,
            },
        }
    }
}

/// Model library seam used by the trial runner and experiment driver.
///
/// Implementations must create a fresh seeded RNG for every `build`, so a
/// sweep point is reproducible regardless of the points run before it.
pub trait CircuitBackend {
    /// Host-side model, inspected for stats before compilation
    type Host;
    /// Device-ready model, read-only during inference
    type Compiled;

    /// Device this backend runs on.
    fn device(&self) -> DeviceContext;

    /// Construct and initialize a model for one sweep point.
    ///
    /// # Errors
    /// Returns error if the configuration cannot produce a circuit
    fn build(&self, config: &ModelConfig, data: &PreparedData) -> Result<Self::Host>;

    /// Structural stats of the host model.
    fn stats(&self, host: &Self::Host) -> StructuralStats;

    /// Lower a host model for batched inference.
    ///
    /// # Errors
    /// Returns error if the model cannot be lowered
    fn compile(&self, host: Self::Host) -> Result<Self::Compiled>;

    /// Log-likelihood of every row.
    ///
    /// # Errors
    /// Returns error on shape mismatch or device failure
    fn evi(&self, model: &Self::Compiled, data: &Matrix<u8>, batch_size: usize)
        -> Result<InferenceOutput>;

    /// MAP completion of every row.
    ///
    /// # Errors
    /// Returns error on shape mismatch or device failure
    fn map(
        &self,
        model: &Self::Compiled,
        data: &Matrix<Option<u8>>,
        batch_size: usize,
    ) -> Result<InferenceOutput>;

    /// Block until all queued device work has finished.
    ///
    /// # Errors
    /// Returns error if the device reports a failure
    fn synchronize(&self) -> Result<()>;

    /// Run one call in instrumented mode, writing a human-readable
    /// time/allocation report into `report`.
    ///
    /// # Errors
    /// Returns error if the call or the write fails
    fn instrumented(
        &self,
        model: &Self::Compiled,
        input: TrialInput<'_>,
        batch_size: usize,
        report: &mut dyn Write,
    ) -> Result<()>;

    /// Dispatch `input` to [`evi`](Self::evi) or [`map`](Self::map).
    ///
    /// # Errors
    /// Returns error if the dispatched call fails
    fn infer(
        &self,
        model: &Self::Compiled,
        input: TrialInput<'_>,
        batch_size: usize,
    ) -> Result<InferenceOutput> {
        match input {
            TrialInput::Evi(data) => self.evi(model, data, batch_size),
            TrialInput::Map(data) => self.map(model, data, batch_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_accounts_host_bytes() {
        let out = InferenceOutput::log_likelihoods(vec![0.0; 10]);
        assert_eq!(out.host.bytes, 40);
        assert_eq!(out.host.allocations, 1);

        let states = Matrix::from_vec(2, 3, vec![0u8; 6]).unwrap();
        assert_eq!(InferenceOutput::states(states).host.bytes, 6);
    }

    #[test]
    fn test_trial_input_mode() {
        let data = Matrix::from_vec(1, 1, vec![0u8]).unwrap();
        let input = TrialInput::Evi(&data);
        assert_eq!(input.mode(), InferenceMode::Evi);
        assert_eq!(input.rows(), 1);
        assert_eq!(InferenceMode::Map.to_string(), "map");
    }
}
