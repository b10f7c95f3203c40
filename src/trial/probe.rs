//! Device memory probes

use super::units::parse_gpu_allocations;
use crate::Result;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Callback that performs one instrumented call, writing its report.
pub type ReportEmitter<'a> = dyn FnMut(&mut dyn Write) -> Result<()> + 'a;

/// Measures device bytes allocated by one instrumented call.
pub trait MemoryProbe {
    /// Run `emit` and return the device bytes it allocated.
    ///
    /// # Errors
    /// Returns error if the call fails or its report cannot be parsed
    fn device_bytes(&mut self, emit: &mut ReportEmitter<'_>) -> Result<u64>;
}

/// Captures the backend's report in a temporary file and parses it.
#[derive(Debug, Default)]
pub struct DiagnosticProbe {
    last_report: Option<String>,
}

impl DiagnosticProbe {
    /// Create a probe.
    #[must_use]
    pub const fn new() -> Self {
        Self { last_report: None }
    }

    /// Text of the most recent report, if any.
    #[must_use]
    pub fn last_report(&self) -> Option<&str> {
        self.last_report.as_deref()
    }
}

impl MemoryProbe for DiagnosticProbe {
    fn device_bytes(&mut self, emit: &mut ReportEmitter<'_>) -> Result<u64> {
        let mut capture = NamedTempFile::new()?;
        emit(capture.as_file_mut())?;
        capture.as_file_mut().flush()?;

        let text = fs::read_to_string(capture.path())?;
        tracing::debug!(report = %text.trim(), "captured diagnostic report");
        let bytes = parse_gpu_allocations(&text);
        self.last_report = Some(text);
        bytes
    }
}

/// Returns a fixed byte count without running anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedProbe {
    bytes: u64,
}

impl FixedProbe {
    /// Probe reporting `bytes` for every call.
    #[must_use]
    pub const fn new(bytes: u64) -> Self {
        Self { bytes }
    }
}

impl MemoryProbe for FixedProbe {
    fn device_bytes(&mut self, _emit: &mut ReportEmitter<'_>) -> Result<u64> {
        Ok(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_diagnostic_probe_reads_back_report() {
        let mut probe = DiagnosticProbe::new();
        let bytes = probe
            .device_bytes(&mut |w: &mut dyn Write| {
                writeln!(
                    w,
                    "0.01 seconds (1 CPU allocations: 4.000 KiB) (3 GPU allocations: 2.5 MiB)"
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(bytes, 2_500_000);
        assert!(probe.last_report().unwrap().contains("GPU allocations"));
    }

    #[test]
    fn test_diagnostic_probe_propagates_parse_error() {
        let mut probe = DiagnosticProbe::new();
        let result = probe.device_bytes(&mut |w: &mut dyn Write| {
            write!(w, "nothing to see")?;
            Ok(())
        });
        assert!(matches!(result, Err(Error::DiagnosticParse(_))));
    }

    #[test]
    fn test_fixed_probe_skips_call() {
        let mut calls = 0;
        let bytes = FixedProbe::new(42)
            .device_bytes(&mut |_w: &mut dyn Write| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(bytes, 42);
        assert_eq!(calls, 0);
    }
}
