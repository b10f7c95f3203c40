//! Host allocation metering
//!
//! [`CountingAllocator`] wraps the system allocator and keeps a running
//! tally of every allocation made by the process. A binary installs it with
//! `#[global_allocator]` and hands it to the trial runner, which reads the
//! tally before and after each timed call.
//!
//! ```rust,no_run
//! use pcbench::trial::CountingAllocator;
//!
//! #[global_allocator]
//! static ALLOCATOR: CountingAllocator = CountingAllocator::new();
//! ```

use crate::backend::AllocationTally;
use std::alloc::{GlobalAlloc, Layout, System};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running count of host allocations, read around each timed call.
pub trait AllocationMeter: Sync + fmt::Debug {
    /// Allocations made so far. Never decreases.
    fn allocated(&self) -> AllocationTally;
}

/// System allocator that counts allocations from every thread.
///
/// Inference runs on the device pool, so a per-thread counter would miss
/// most of a call's work. A reallocation counts as one allocation of its new
/// size; frees are not subtracted.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocations: AtomicU64,
    bytes: AtomicU64,
}

impl CountingAllocator {
    /// Allocator with zero counts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    fn count(&self, size: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
    }
}

impl AllocationMeter for CountingAllocator {
    fn allocated(&self) -> AllocationTally {
        AllocationTally {
            allocations: self.allocations.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

// SAFETY: every request is forwarded unchanged to `System`. Counting only
// touches atomics and never allocates.
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.count(layout.size());
        // SAFETY: caller upholds the `GlobalAlloc::alloc` contract for `layout`.
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.count(layout.size());
        // SAFETY: as for `alloc`.
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.count(new_size);
        // SAFETY: `ptr` came from this allocator, which always delegates to `System`.
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` was allocated by `System` with `layout`.
        unsafe { System.dealloc(ptr, layout) }
    }
}
