//! Row-major feature matrix

use crate::{Error, Result};

/// Dense row-major matrix: one row per example, one column per feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix<T> {
    pub(super) rows: usize,
    pub(super) cols: usize,
    pub(super) data: Vec<T>,
}

impl<T: Copy> Matrix<T> {
    /// Wrap a row-major buffer.
    ///
    /// # Errors
    /// Returns error if `data.len() != rows * cols`
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            Error::InvalidInput(format!("Matrix shape {rows}x{cols} overflows usize"))
        })?;
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "Matrix buffer has {} cells, shape {rows}x{cols} needs {expected}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from a list of equally long rows.
    ///
    /// # Errors
    /// Returns error if rows have different lengths
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::InvalidInput(format!(
                    "Row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), cols, data)
    }

    /// Number of rows (examples).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (features).
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major cell buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Cell at row `i`, column `j`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> T {
        assert!(j < self.cols, "column {j} out of bounds ({} columns)", self.cols);
        self.data[i * self.cols + j]
    }

    /// Slice of row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Iterate over rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        // chunks_exact panics on zero, so a zero-width matrix yields no rows
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Iterate over the cells of column `j`.
    pub fn column(&self, j: usize) -> impl Iterator<Item = T> + '_ {
        (0..self.rows).map(move |i| self.data[i * self.cols + j])
    }

    /// Copy of the first `n` rows (all rows if `n >= rows`).
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.rows);
        Self {
            rows: n,
            cols: self.cols,
            data: self.data[..n * self.cols].to_vec(),
        }
    }

    /// Elementwise transform into a new matrix of the same shape.
    #[must_use]
    pub fn map<U, F: FnMut(T) -> U>(&self, f: F) -> Matrix<U> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().copied().map(f).collect(),
        }
    }

    /// Row-major sub-matrix of rows `start..start + len`, clamped to the end.
    #[must_use]
    pub fn row_range(&self, start: usize, len: usize) -> &[T] {
        let start = start.min(self.rows);
        let end = (start + len).min(self.rows);
        &self.data[start * self.cols..end * self.cols]
    }

    /// Size of the cell buffer in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }
}
