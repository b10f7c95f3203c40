//! Dataset tables (Arrow/Parquet)
//!
//! Image datasets are stored pre-flattened: one Parquet column per
//! pixel/channel feature, one row per example, `UInt8` cells.

use super::Matrix;
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, UInt8Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Supported image datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetName {
    /// 28x28 grayscale digits (784 features)
    Mnist,
    /// 32x32x3 color images, channel-flattened (3072 features)
    Cifar10,
}

impl DatasetName {
    /// Number of flattened feature columns.
    #[must_use]
    pub const fn num_features(self) -> usize {
        match self {
            Self::Mnist => 28 * 28,
            Self::Cifar10 => 32 * 32 * 3,
        }
    }

    /// File stem under the data directory.
    #[must_use]
    pub const fn file_stem(self) -> &'static str {
        match self {
            Self::Mnist => "mnist",
            Self::Cifar10 => "cifar10",
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for DatasetName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mnist" => Ok(Self::Mnist),
            "cifar10" => Ok(Self::Cifar10),
            other => Err(Error::Configuration(format!(
                "Unknown dataset '{other}' (expected mnist or cifar10)"
            ))),
        }
    }
}

/// Load a supported dataset from `<dir>/<name>.parquet`.
///
/// # Errors
/// Returns error if the file is missing, unreadable, or has the wrong
/// number of feature columns
pub fn load<P: AsRef<Path>>(name: DatasetName, dir: P) -> Result<Matrix<u8>> {
    let path = dir.as_ref().join(format!("{}.parquet", name.file_stem()));
    let data = load_parquet(&path)?;
    if data.cols() != name.num_features() {
        return Err(Error::StorageError(format!(
            "{} has {} feature columns, {name} needs {}",
            path.display(),
            data.cols(),
            name.num_features()
        )));
    }
    tracing::info!(dataset = %name, rows = data.rows(), cols = data.cols(), "loaded dataset");
    Ok(data)
}

/// Load every column of a Parquet file as an unsigned 8-bit feature.
///
/// # Errors
/// Returns error if the file cannot be read, or a cell is null or does
/// not fit in `u8`
pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Matrix<u8>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    let file = File::open(path.as_ref()).map_err(|e| {
        Error::StorageError(format!(
            "Failed to open Parquet file {}: {e}",
            path.as_ref().display()
        ))
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;
    let cols = builder.schema().fields().len();

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    let mut rows = 0;
    let mut data = Vec::new();
    for batch in reader {
        let batch = batch
            .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
        append_row_major(&batch, &mut data)?;
        rows += batch.num_rows();
    }

    Matrix::from_vec(rows, cols, data)
}

/// Transpose one columnar batch onto the end of a row-major buffer.
fn append_row_major(batch: &RecordBatch, out: &mut Vec<u8>) -> Result<()> {
    let columns = batch
        .columns()
        .iter()
        .map(to_u8_column)
        .collect::<Result<Vec<_>>>()?;

    out.reserve(batch.num_rows() * columns.len());
    for i in 0..batch.num_rows() {
        out.extend(columns.iter().map(|column| column.value(i)));
    }
    Ok(())
}

fn to_u8_column(column: &ArrayRef) -> Result<UInt8Array> {
    // Safe casting turns out-of-range values into nulls
    let casted = cast(column.as_ref(), &DataType::UInt8)?;
    if casted.null_count() > 0 {
        return Err(Error::StorageError(
            "Feature column contains null or out-of-range (not 0..=255) cells".to_string(),
        ));
    }
    casted
        .as_any()
        .downcast_ref::<UInt8Array>()
        .cloned()
        .ok_or_else(|| Error::StorageError("Feature column did not cast to UInt8".to_string()))
}

/// Write a matrix as a Parquet table with columns `f0..f{cols-1}`.
///
/// # Errors
/// Returns error if the file cannot be created or written
pub fn write_parquet<P: AsRef<Path>>(data: &Matrix<u8>, path: P) -> Result<()> {
    use parquet::arrow::ArrowWriter;
    use std::fs::File;

    let schema = Arc::new(Schema::new(
        (0..data.cols())
            .map(|j| Field::new(format!("f{j}"), DataType::UInt8, false))
            .collect::<Vec<_>>(),
    ));
    let columns: Vec<ArrayRef> = (0..data.cols())
        .map(|j| Arc::new(UInt8Array::from_iter_values(data.column(j))) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, schema, None)
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| Error::StorageError(format!("Failed to write record batch: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::StorageError(format!("Failed to finalize Parquet file: {e}")))?;
    Ok(())
}

/// Seeded uniform `u8` matrix, for tests and dry runs without a dataset.
#[must_use]
pub fn synthetic(rows: usize, cols: usize, seed: u64) -> Matrix<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..rows * cols).map(|_| rng.gen::<u8>()).collect();
    Matrix { rows, cols, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_features() {
        assert_eq!(DatasetName::Mnist.num_features(), 784);
        assert_eq!(DatasetName::Cifar10.num_features(), 3072);
    }

    #[test]
    fn test_dataset_from_str() {
        assert_eq!("mnist".parse::<DatasetName>().unwrap(), DatasetName::Mnist);
        assert!("MNIST".parse::<DatasetName>().is_err());
    }

    #[test]
    fn test_synthetic_is_seeded() {
        assert_eq!(synthetic(4, 5, 7), synthetic(4, 5, 7));
        assert_ne!(synthetic(4, 5, 7), synthetic(4, 5, 8));
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.parquet");
        let data = synthetic(6, 3, 1);
        write_parquet(&data, &path).unwrap();
        assert_eq!(load_parquet(&path).unwrap(), data);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(DatasetName::Mnist, dir.path());
        assert!(matches!(result, Err(Error::StorageError(_))));
    }
}
