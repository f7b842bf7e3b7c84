//! Order statistics and variability measures over sample sets.
//!
//! Functions that need sorted input take `&mut [f64]` and sort in place;
//! the resulting order carries no meaning for the caller. `jitter` and
//! `average` only borrow the samples, since jitter depends on the order
//! in which the samples were collected.

use crate::errors::SpeedTestError;

fn ensure_not_empty(values: &[f64], operation: &str) -> Result<(), SpeedTestError> {
    if values.is_empty() {
        return Err(SpeedTestError::invalid_input(format!(
            "cannot compute {} of an empty sample set",
            operation
        )));
    }

    Ok(())
}

fn sort_ascending(values: &mut [f64]) {
    values.sort_by(|a, b| a.total_cmp(b));
}

/// Arithmetic mean.
pub fn average(values: &[f64]) -> Result<f64, SpeedTestError> {
    ensure_not_empty(values, "average")?;

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Middle element of the sorted samples, or the mean of the two central
/// elements for an even number of samples.
pub fn median(values: &mut [f64]) -> Result<f64, SpeedTestError> {
    ensure_not_empty(values, "median")?;
    sort_ascending(values);

    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Ok((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Ok(values[mid])
    }
}

/// Linearly interpolated percentile at fractional rank `(n - 1) * p`.
///
/// `p` must lie in `[0.0, 1.0]`. When the rank lands on the last element
/// (`p = 1.0`, or a single sample) that element is returned as is.
pub fn percentile(values: &mut [f64], p: f64) -> Result<f64, SpeedTestError> {
    ensure_not_empty(values, "percentile")?;

    if !(0.0..=1.0).contains(&p) {
        return Err(SpeedTestError::invalid_input(format!(
            "percentile must be between 0 and 1, got {}",
            p
        )));
    }

    sort_ascending(values);

    let pos = (values.len() - 1) as f64 * p;
    let base = pos.floor() as usize;
    let rest = pos - base as f64;

    if base + 1 < values.len() {
        return Ok(values[base] + rest * (values[base + 1] - values[base]));
    }

    Ok(values[base])
}

/// Mean absolute difference between consecutive samples, in input order.
///
/// A single sample has no variation, so its jitter is zero.
pub fn jitter(values: &[f64]) -> Result<f64, SpeedTestError> {
    ensure_not_empty(values, "jitter")?;

    if values.len() == 1 {
        return Ok(0.0);
    }

    let deltas: Vec<f64> =
        values.windows(2).map(|pair| (pair[0] - pair[1]).abs()).collect();

    average(&deltas)
}

pub fn min(values: &[f64]) -> Result<f64, SpeedTestError> {
    ensure_not_empty(values, "minimum")?;

    Ok(values.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn max(values: &[f64]) -> Result<f64, SpeedTestError> {
    ensure_not_empty(values, "maximum")?;

    Ok(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}
