//! Benchmark Record - measurements of one sweep point

use super::Hparams;
use crate::circuit::StructuralStats;
use crate::trial::TrialResult;
use serde::{Deserialize, Serialize};

/// Trial results per inference mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResults {
    /// Full-evidence likelihood trial
    pub evi: TrialResult,
    /// MAP trial, absent when the family runs EVI only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub map: Option<TrialResult>,
}

/// Benchmark Record holds everything measured at one sweep point.
///
/// A record has `results` when the point was measured, or `error` when it
/// failed under per-point isolation. `stats` is present whenever the
/// model was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    hparams: Hparams,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    stats: Option<StructuralStats>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    results: Option<TrialResults>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    error: Option<String>,
}

impl BenchmarkRecord {
    /// Record of a successfully measured point.
    #[must_use]
    pub const fn measured(hparams: Hparams, stats: StructuralStats, results: TrialResults) -> Self {
        Self {
            hparams,
            stats: Some(stats),
            results: Some(results),
            error: None,
        }
    }

    /// Create a builder for a point that did not complete.
    #[must_use]
    pub const fn builder(hparams: Hparams) -> BenchmarkRecordBuilder {
        BenchmarkRecordBuilder::new(hparams)
    }

    /// Get the point's hyperparameters.
    #[must_use]
    pub const fn hparams(&self) -> &Hparams {
        &self.hparams
    }

    /// Get the structural stats, if the model was built.
    #[must_use]
    pub const fn stats(&self) -> Option<&StructuralStats> {
        self.stats.as_ref()
    }

    /// Get the trial results, if the point was measured.
    #[must_use]
    pub const fn results(&self) -> Option<&TrialResults> {
        self.results.as_ref()
    }

    /// Get the failure message, if the point failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the point failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Builder for a failed `BenchmarkRecord`.
#[derive(Debug)]
pub struct BenchmarkRecordBuilder {
    hparams: Hparams,
    stats: Option<StructuralStats>,
    error: Option<String>,
}

impl BenchmarkRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub const fn new(hparams: Hparams) -> Self {
        Self {
            hparams,
            stats: None,
            error: None,
        }
    }

    /// Set the structural stats collected before the failure.
    #[must_use]
    pub fn stats(mut self, stats: Option<StructuralStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Set the failure message.
    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Build the `BenchmarkRecord`.
    #[must_use]
    pub fn build(self) -> BenchmarkRecord {
        BenchmarkRecord {
            hparams: self.hparams,
            stats: self.stats,
            results: None,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ModelFamily, ModelParams};

    fn hparams() -> Hparams {
        Hparams {
            params: ModelParams::default_for(ModelFamily::Hclt),
            batch_size: 512,
        }
    }

    fn trial() -> TrialResult {
        TrialResult {
            median_time: 1.5e6,
            median_gctime: 2.0e3,
            cpu_alloc_memory: 4096,
            cuda_alloc_memory: 2_500_000,
            num_samples: 3,
        }
    }

    #[test]
    fn test_measured_record_omits_error_and_map() {
        let record = BenchmarkRecord::measured(
            hparams(),
            StructuralStats::default(),
            TrialResults {
                evi: trial(),
                map: None,
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("error").is_none());
        assert!(json["results"].get("map").is_none());
        assert_eq!(json["results"]["evi"]["cuda_alloc_memory"], 2_500_000);
        assert!(!record.is_failed());
    }

    #[test]
    fn test_failed_record() {
        let record = BenchmarkRecord::builder(hparams())
            .error("Backend error: device lost")
            .build();
        assert!(record.is_failed());
        assert!(record.results().is_none());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("results").is_none());
        assert_eq!(json["error"], "Backend error: device lost");
    }
}
