use crate::error::{ArbitrageError, Result};
use crate::models::{Threshold, ThresholdSpec};

/// Resolve a threshold spec into a concrete price cutoff for `prices`.
///
/// Quantiles use linear interpolation between order statistics at rank `q * (n - 1)`.
pub fn resolve_threshold(prices: &[f64], spec: ThresholdSpec) -> Result<Threshold> {
    if prices.is_empty() {
        return Err(ArbitrageError::InvalidSpec(
            "cannot resolve a threshold against an empty price sample".to_string(),
        ));
    }

    match spec {
        ThresholdSpec::Absolute(value) => {
            if value.is_nan() {
                return Err(ArbitrageError::InvalidSpec(
                    "absolute threshold must be a number".to_string(),
                ));
            }
            Ok(Threshold(value))
        }
        ThresholdSpec::Quantile(q) => {
            if !(0.0..=1.0).contains(&q) {
                return Err(ArbitrageError::InvalidSpec(format!(
                    "quantile must be between 0 and 1, got {}",
                    q
                )));
            }
            let mut sorted = prices.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            Ok(Threshold(interpolate_sorted(&sorted, q)))
        }
    }
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
pub(crate) fn interpolate_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
