//! Experiment report and its JSON file

use super::{BenchmarkRecord, ModelFamily};
use crate::Result;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default report file prefix
pub const DEFAULT_PREFIX: &str = "pcs-jl";

/// Records of one family, grouped by sweep axis.
///
/// Serializes as a JSON object whose keys keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentReport {
    family: ModelFamily,
    sweeps: Vec<(String, Vec<BenchmarkRecord>)>,
}

impl ExperimentReport {
    /// Create an empty report.
    #[must_use]
    pub const fn new(family: ModelFamily) -> Self {
        Self {
            family,
            sweeps: Vec::new(),
        }
    }

    /// Family the report was measured for.
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        self.family
    }

    /// Append `record` to the records of `axis`, opening the axis if new.
    pub fn push(&mut self, axis: &str, record: BenchmarkRecord) {
        if let Some((_, records)) = self.sweeps.iter_mut().find(|(name, _)| name == axis) {
            records.push(record);
        } else {
            self.sweeps.push((axis.to_string(), vec![record]));
        }
    }

    /// Records of `axis`, in sweep order.
    #[must_use]
    pub fn records(&self, axis: &str) -> Option<&[BenchmarkRecord]> {
        self.sweeps
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, records)| records.as_slice())
    }

    /// Axis names, in insertion order.
    pub fn axes(&self) -> impl Iterator<Item = &str> + '_ {
        self.sweeps.iter().map(|(name, _)| name.as_str())
    }

    /// Total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sweeps.iter().map(|(_, records)| records.len()).sum()
    }

    /// Whether no record was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of failed records.
    #[must_use]
    pub fn num_failed(&self) -> usize {
        self.sweeps
            .iter()
            .flat_map(|(_, records)| records)
            .filter(|r| r.is_failed())
            .count()
    }

    /// Pretty JSON with 4-space indentation.
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| crate::Error::Other(e.to_string()))
    }

    /// `<prefix>-<FAMILY>-trials.json`
    #[must_use]
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}-trials.json", self.family)
    }

    /// Write the report into `dir`, replacing any existing file.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails
    pub fn write(&self, dir: &Path, prefix: &str) -> Result<PathBuf> {
        let path = dir.join(self.file_name(prefix));
        fs::write(&path, self.to_json_pretty()?)?;
        tracing::info!(path = %path.display(), records = self.len(), "wrote report");
        Ok(path)
    }
}

impl Serialize for ExperimentReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sweeps.len()))?;
        for (axis, records) in &self.sweeps {
            map.serialize_entry(axis, records)?;
        }
        map.end()
    }
}
