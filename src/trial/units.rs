//! Memory units in diagnostic reports

use crate::{Error, Result};
use std::fmt;

/// Marker preceding the device allocation volume in a diagnostic report
pub const GPU_ALLOCATIONS_MARKER: &str = "GPU allocations:";

/// Decimal memory units (powers of 1000, despite the binary-looking names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryUnit {
    /// 1e3 bytes
    KiB,
    /// 1e6 bytes
    MiB,
    /// 1e9 bytes
    GiB,
}

impl MemoryUnit {
    /// Bytes per unit.
    #[must_use]
    pub const fn scale(self) -> f64 {
        match self {
            Self::KiB => 1e3,
            Self::MiB => 1e6,
            Self::GiB => 1e9,
        }
    }

    /// Parse a unit token, `None` if unknown.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "KiB" => Some(Self::KiB),
            "MiB" => Some(Self::MiB),
            "GiB" => Some(Self::GiB),
            _ => None,
        }
    }

    /// Largest unit that keeps `bytes` at or above 1 (KiB below that).
    #[must_use]
    pub const fn for_bytes(bytes: u64) -> Self {
        if bytes >= 1_000_000_000 {
            Self::GiB
        } else if bytes >= 1_000_000 {
            Self::MiB
        } else {
            Self::KiB
        }
    }

    /// Decimals needed to print byte-exact magnitudes.
    const fn decimals(self) -> usize {
        match self {
            Self::KiB => 3,
            Self::MiB => 6,
            Self::GiB => 9,
        }
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KiB => write!(f, "KiB"),
            Self::MiB => write!(f, "MiB"),
            Self::GiB => write!(f, "GiB"),
        }
    }
}

/// `round(magnitude * scale(unit))`.
///
/// # Errors
/// Returns [`Error::UnitConversion`] for any unit other than KiB, MiB, GiB
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn convert_to_bytes(magnitude: f64, unit: &str) -> Result<u64> {
    let unit = MemoryUnit::from_suffix(unit).ok_or_else(|| Error::UnitConversion {
        unit: unit.to_string(),
    })?;
    Ok((magnitude * unit.scale()).round() as u64)
}

/// Render `bytes` in the report format, precise enough to parse back exactly.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_memory(bytes: u64) -> String {
    let unit = MemoryUnit::for_bytes(bytes);
    format!(
        "{:.*} {unit}",
        unit.decimals(),
        bytes as f64 / unit.scale()
    )
}

/// Extract device bytes from a diagnostic report: the two whitespace
/// tokens after [`GPU_ALLOCATIONS_MARKER`] are `<decimal> <unit>`, with
/// trailing `)` and `,` stripped from the unit.
///
/// # Errors
/// Returns [`Error::DiagnosticParse`] if the marker or a numeric magnitude
/// is missing, and [`Error::UnitConversion`] for an unknown unit
pub fn parse_gpu_allocations(report: &str) -> Result<u64> {
    let (_, rest) = report.split_once(GPU_ALLOCATIONS_MARKER).ok_or_else(|| {
        Error::DiagnosticParse(format!(
            "Marker '{GPU_ALLOCATIONS_MARKER}' not found in report: {:?}",
            report.trim()
        ))
    })?;

    let mut tokens = rest.split_whitespace();
    let (Some(magnitude), Some(unit)) = (tokens.next(), tokens.next()) else {
        return Err(Error::DiagnosticParse(format!(
            "Expected '<magnitude> <unit>' after '{GPU_ALLOCATIONS_MARKER}', got {:?}",
            rest.trim()
        )));
    };

    let value: f64 = magnitude.parse().map_err(|_| {
        Error::DiagnosticParse(format!("Allocation magnitude '{magnitude}' is not a number"))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(Error::DiagnosticParse(format!(
            "Allocation magnitude '{magnitude}' is not a finite non-negative number"
        )));
    }

    convert_to_bytes(value, unit.trim_end_matches([')', ',']))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_table() {
        assert_eq!(convert_to_bytes(1.0, "KiB").unwrap(), 1_000);
        assert_eq!(convert_to_bytes(2.5, "MiB").unwrap(), 2_500_000);
        assert_eq!(convert_to_bytes(1.0, "GiB").unwrap(), 1_000_000_000);
        assert_eq!(convert_to_bytes(0.0, "GiB").unwrap(), 0);
    }

    #[test]
    fn test_unknown_unit() {
        let err = convert_to_bytes(1.0, "TiB").unwrap_err();
        assert!(matches!(err, Error::UnitConversion { ref unit } if unit == "TiB"));
        assert!(convert_to_bytes(1.0, "kib").is_err());
    }

    #[test]
    fn test_parse_strips_trailing_punctuation() {
        let report = "0.5 seconds (3 CPU allocations: 1.2 KiB) (2 GPU allocations: 2.5 MiB)";
        assert_eq!(parse_gpu_allocations(report).unwrap(), 2_500_000);
        assert_eq!(
            parse_gpu_allocations("x, GPU allocations: 3 GiB, more").unwrap(),
            3_000_000_000
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_gpu_allocations("no allocations here"),
            Err(Error::DiagnosticParse(_))
        ));
        assert!(matches!(
            parse_gpu_allocations("GPU allocations: lots MiB"),
            Err(Error::DiagnosticParse(_))
        ));
        assert!(matches!(
            parse_gpu_allocations("GPU allocations: 12"),
            Err(Error::DiagnosticParse(_))
        ));
        assert!(matches!(
            parse_gpu_allocations("GPU allocations: 1.0 bytes)"),
            Err(Error::UnitConversion { .. })
        ));
    }

    #[test]
    fn test_format_round_trips() {
        for bytes in [0, 999, 1_000, 123_456, 2_500_000, 7_654_321_987] {
            let text = format!("(1 GPU allocations: {})", format_memory(bytes));
            assert_eq!(parse_gpu_allocations(&text).unwrap(), bytes);
        }
        assert_eq!(format_memory(2_500_000), "2.500000 MiB");
    }
}
