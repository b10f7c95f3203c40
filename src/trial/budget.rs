//! Budgeted repetition and median aggregation

use crate::Result;
use std::time::{Duration, Instant};

/// Call `sample` until the cumulative wall-clock time reaches `budget`.
///
/// At least one sample is always taken, and the sample in flight when the
/// budget runs out completes and is kept. There is no cancellation.
///
/// # Errors
/// Returns the first error produced by `sample`
pub fn run_budgeted<S, F>(mut sample: F, budget: Duration) -> Result<Vec<S>>
where
    F: FnMut() -> Result<S>,
{
    let start = Instant::now();
    let mut samples = Vec::new();
    loop {
        samples.push(sample()?);
        if start.elapsed() >= budget {
            break;
        }
    }
    Ok(samples)
}

/// Median of `values`, averaging the two middle values for even lengths.
/// `None` when empty.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median of byte counts, rounded to the nearest byte.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn median_bytes(values: &[u64]) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        let (a, b) = (sorted[mid - 1], sorted[mid]);
        // overflow-free midpoint, rounding half up
        Some(a / 2 + b / 2 + (a % 2 + b % 2 + 1) / 2)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_zero_budget_takes_one_sample() {
        let mut calls = 0;
        let samples = run_budgeted(
            || {
                calls += 1;
                Ok(calls)
            },
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(samples, vec![1]);
    }

    #[test]
    fn test_budget_bounds_sample_count() {
        let samples = run_budgeted(
            || {
                std::thread::sleep(Duration::from_millis(5));
                Ok(())
            },
            Duration::from_millis(30),
        )
        .unwrap();
        // 30ms / 5ms, plus the in-flight sample, minus scheduler slack
        assert!(samples.len() >= 2, "got {}", samples.len());
        assert!(samples.len() <= 7, "got {}", samples.len());
    }

    #[test]
    fn test_error_stops_sampling() {
        let mut calls = 0;
        let result: Result<Vec<()>> = run_budgeted(
            || {
                calls += 1;
                Err(Error::Backend("device lost".to_string()))
            },
            Duration::from_secs(10),
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median_bytes(&[10, 20]), Some(15));
        assert_eq!(median_bytes(&[1, 2]), Some(2));
        assert_eq!(median_bytes(&[u64::MAX, u64::MAX]), Some(u64::MAX));
        assert_eq!(median_bytes(&[7]), Some(7));
    }
}
