use crate::error::{ArbitrageError, Result};
use crate::models::{PriceSample, PriceSeries, SpikeReport, ThresholdSpec};
use crate::threshold::resolve_threshold;

/// Select every sample priced strictly above the resolved threshold.
///
/// Ties with the threshold are not spikes. An empty selection reports
/// `max_price` and `mean_spike_price` as `None`.
pub fn detect_spikes(series: &PriceSeries, spec: ThresholdSpec) -> Result<SpikeReport> {
    if series.is_empty() {
        return Err(ArbitrageError::EmptySeries("detect spikes"));
    }

    let threshold = resolve_threshold(&series.prices(), spec)?;

    let spikes: Vec<PriceSample> = series
        .samples()
        .iter()
        .filter(|s| s.price > threshold.value())
        .cloned()
        .collect();

    let count = spikes.len();
    let max_price = spikes.iter().map(|s| s.price).reduce(f64::max);
    let mean_spike_price = if count > 0 {
        Some(spikes.iter().map(|s| s.price).sum::<f64>() / count as f64)
    } else {
        None
    };

    log::debug!(
        "spike detection: cutoff {:.2}, {} of {} samples above",
        threshold.value(),
        count,
        series.len()
    );

    Ok(SpikeReport {
        threshold,
        spikes,
        count,
        max_price,
        mean_spike_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn series(prices: &[f64]) -> PriceSeries {
        let base = DateTime::parse_from_rfc3339("2021-01-01T00:00:00+10:00").unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceSample::new(base + Duration::minutes(30 * i as i64), "VIC1", p))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_absolute_threshold_spikes() {
        let report = detect_spikes(&series(&[50.0, 310.0, 90.0, 500.0]), ThresholdSpec::Absolute(300.0)).unwrap();

        assert_eq!(report.count, 2);
        assert_eq!(report.max_price, Some(500.0));
        assert_eq!(report.mean_spike_price, Some(405.0));
        assert_eq!(report.spikes[0].price, 310.0);
        assert_eq!(report.spikes[1].price, 500.0);
    }

    #[test]
    fn test_ties_are_not_spikes() {
        let report = detect_spikes(&series(&[100.0, 300.0, 300.0]), ThresholdSpec::Absolute(300.0)).unwrap();
        assert_eq!(report.count, 0);
        assert!(report.spikes.is_empty());
        assert_eq!(report.max_price, None);
        assert_eq!(report.mean_spike_price, None);
    }

    #[test]
    fn test_quantile_threshold_spikes() {
        // q = 0.9 over [50, 200, 100, 400]: rank 2.7 -> 200 + 200 * 0.7 = 340
        let report = detect_spikes(&series(&[50.0, 200.0, 100.0, 400.0]), ThresholdSpec::Quantile(0.9)).unwrap();
        assert!((report.threshold.value() - 340.0).abs() < 1e-9);
        assert_eq!(report.count, 1);
        assert_eq!(report.max_price, Some(400.0));
    }

    #[test]
    fn test_maximum_quantile_yields_no_spikes() {
        let report = detect_spikes(&series(&[1.0, 2.0, 3.0]), ThresholdSpec::Quantile(1.0)).unwrap();
        assert_eq!(report.count, 0);
    }

    #[test]
    fn test_empty_series_is_an_error() {
        let err = detect_spikes(&PriceSeries::default(), ThresholdSpec::Absolute(300.0)).unwrap_err();
        assert_eq!(err, ArbitrageError::EmptySeries("detect spikes"));
    }

    #[test]
    fn test_bad_quantile_is_an_error() {
        let err = detect_spikes(&series(&[1.0]), ThresholdSpec::Quantile(2.0)).unwrap_err();
        assert!(matches!(err, ArbitrageError::InvalidSpec(_)));
    }
}
