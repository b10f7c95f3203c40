//! Error types for pcbench
//!
//! Every variant carries enough context to act on: which unit, which
//! marker, which file.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// pcbench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Bad CLI arguments or configuration values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Accelerator memory reported in a unit outside `{KiB, MiB, GiB}`
    #[error("Unknown memory unit '{unit}' in diagnostic report\nExpected one of KiB, MiB, GiB. Every later measurement would be wrong, aborting the run.")]
    UnitConversion {
        /// Unit token as it appeared in the report
        unit: String,
    },

    /// Diagnostic report missing the allocation marker or its magnitude
    #[error("Diagnostic parse error: {0}")]
    DiagnosticParse(String),

    /// Invalid input to a dataset or model operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dataset table error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Circuit backend failure (build, compile or inference)
    #[error("Backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the whole run, even when per-point
    /// failure isolation is enabled.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnitConversion { .. } | Self::Configuration(_) | Self::Io(_)
        )
    }
}
