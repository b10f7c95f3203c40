//! Device selection and allocation accounting

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// The device a run executes on.
///
/// Selected once per run and passed explicitly to the backend and the
/// trial runner, so concurrent runs (tests) never share device state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceContext {
    device_id: usize,
}

impl DeviceContext {
    /// Select device `device_id`.
    #[must_use]
    pub const fn new(device_id: usize) -> Self {
        Self { device_id }
    }

    /// Device index.
    #[must_use]
    pub const fn id(self) -> usize {
        self.device_id
    }
}

/// Allocation count and volume over some window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationTally {
    /// Number of allocations
    pub allocations: u64,
    /// Total bytes allocated
    pub bytes: u64,
}

impl AllocationTally {
    /// Growth of a running tally since the `earlier` reading.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self {
            allocations: self.allocations.wrapping_sub(earlier.allocations),
            bytes: self.bytes.wrapping_sub(earlier.bytes),
        }
    }
}

/// Counts every device-side buffer handed out to kernels.
#[derive(Debug, Default)]
pub struct DeviceMemory {
    allocations: AtomicU64,
    bytes: AtomicU64,
}

impl DeviceMemory {
    /// Create a tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed `f32` workspace and record it.
    #[must_use]
    pub fn alloc_f32(&self, len: usize) -> Vec<f32> {
        self.record((len * std::mem::size_of::<f32>()) as u64);
        vec![0.0; len]
    }

    /// Record an allocation of `bytes` made elsewhere.
    pub fn record(&self, bytes: u64) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Counts since creation or the last reset.
    #[must_use]
    pub fn snapshot(&self) -> AllocationTally {
        AllocationTally {
            allocations: self.allocations.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }

    /// Zero the counters.
    pub fn reset(&self) {
        self.allocations.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
    }
}
