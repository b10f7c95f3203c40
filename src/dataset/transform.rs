//! Derived datasets: column-wise missingness and bit truncation
//!
//! Both transforms borrow their input and return a new matrix. The raw
//! dataset stays intact for the EVI trials that follow.

use super::Matrix;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Number of columns `inject_missingness` hides for a given fraction.
///
/// Ties round to even, so 2.5 hidden columns become 2.
///
/// # Errors
/// Returns error if `fraction` is NaN or outside `[0, 1]`
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn missing_column_count(num_columns: usize, fraction: f64) -> Result<usize> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(Error::InvalidInput(format!(
            "Missing fraction must be in [0, 1], got {fraction}"
        )));
    }
    Ok(((fraction * num_columns as f64).round_ties_even() as usize).min(num_columns))
}

/// Choose the columns to hide: distinct, sampled uniformly without
/// replacement, sorted ascending.
///
/// # Errors
/// Returns error if `fraction` is NaN or outside `[0, 1]`
pub fn select_missing_columns(num_columns: usize, fraction: f64, seed: u64) -> Result<Vec<usize>> {
    let amount = missing_column_count(num_columns, fraction)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns = rand::seq::index::sample(&mut rng, num_columns, amount).into_vec();
    columns.sort_unstable();
    Ok(columns)
}

/// Mark `round(fraction * cols)` columns as unobserved (`None`) in every row.
///
/// The hidden column set is the same for all rows. Every other cell is
/// copied unchanged.
///
/// # Errors
/// Returns error if `fraction` is NaN or outside `[0, 1]`
pub fn inject_missingness(
    data: &Matrix<u8>,
    fraction: f64,
    seed: u64,
) -> Result<Matrix<Option<u8>>> {
    let hidden = select_missing_columns(data.cols(), fraction, seed)?;
    Ok(mask_columns(data, &hidden))
}

/// Replace the given columns with `None` in every row.
#[must_use]
pub fn mask_columns(data: &Matrix<u8>, hidden: &[usize]) -> Matrix<Option<u8>> {
    let mut observed = vec![true; data.cols()];
    for &j in hidden {
        if let Some(flag) = observed.get_mut(j) {
            *flag = false;
        }
    }

    let cells = data
        .as_slice()
        .iter()
        .enumerate()
        .map(|(idx, &value)| observed[idx % data.cols()].then_some(value))
        .collect();

    Matrix {
        rows: data.rows(),
        cols: data.cols(),
        data: cells,
    }
}

/// Floor-divide every cell by `2^bits` (`value >> bits`).
///
/// `bits == 0` is the identity. `bits >= 8` maps every cell to zero.
#[must_use]
pub fn truncate(data: &Matrix<u8>, bits: u32) -> Matrix<u8> {
    data.map(|value| value.checked_shr(bits).unwrap_or(0))
}
