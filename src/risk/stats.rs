//! Empirical distribution statistics for NPV and ROE samples.

use crate::core::{Percentiles, ValuationError};

/// Arithmetic mean; zero for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Empirical quantile by linear interpolation on a sorted ascending
/// sample: rank `p · (n − 1)` blended between its neighbours.
pub fn percentile(sorted: &[f64], p: f64) -> Result<f64, ValuationError> {
    if sorted.is_empty() {
        return Err(ValuationError::Numeric {
            message: "percentile requested on an empty distribution".into(),
        });
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Ok(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Ok(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// The five-point summary used throughout the result objects.
pub fn five_point(sorted: &[f64]) -> Result<Percentiles, ValuationError> {
    Ok(Percentiles {
        p5: percentile(sorted, 0.05)?,
        p25: percentile(sorted, 0.25)?,
        p50: percentile(sorted, 0.50)?,
        p75: percentile(sorted, 0.75)?,
        p95: percentile(sorted, 0.95)?,
    })
}
