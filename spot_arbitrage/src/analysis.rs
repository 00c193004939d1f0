use crate::error::{ArbitrageError, Result};
use crate::models::{PriceSample, PriceSeries, PriceSummary};
use crate::threshold::interpolate_sorted;
use chrono::{DateTime, FixedOffset, Timelike};

/// Keep samples for `region` (case-insensitive) inside the inclusive `[start, end]` window.
pub fn filter_series(
    samples: &[PriceSample],
    region: Option<&str>,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
) -> Vec<PriceSample> {
    samples
        .iter()
        .filter(|s| region.map_or(true, |r| s.region.eq_ignore_ascii_case(r)))
        .filter(|s| start.map_or(true, |t| s.timestamp >= t))
        .filter(|s| end.map_or(true, |t| s.timestamp <= t))
        .cloned()
        .collect()
}

/// One series per region, regions in first-seen order.
///
/// Region names are grouped case-insensitively, matching `filter_series`.
pub fn split_by_region(samples: &[PriceSample]) -> Vec<PriceSeries> {
    let mut regions: Vec<(String, Vec<PriceSample>)> = Vec::new();

    for sample in samples {
        match regions
            .iter_mut()
            .find(|(r, _)| r.eq_ignore_ascii_case(&sample.region))
        {
            Some((_, group)) => group.push(sample.clone()),
            None => regions.push((sample.region.clone(), vec![sample.clone()])),
        }
    }

    regions.into_iter().map(|(_, group)| PriceSeries::new(group)).collect()
}

pub fn compute_summary(series: &PriceSeries) -> Result<PriceSummary> {
    if series.is_empty() {
        return Err(ArbitrageError::EmptySeries("compute a summary"));
    }

    let mut prices = series.prices();
    prices.sort_by(|a, b| a.total_cmp(b));

    let count = prices.len();
    let mean_price = prices.iter().sum::<f64>() / count as f64;
    let variance = prices.iter().map(|p| (p - mean_price).powi(2)).sum::<f64>() / count as f64;
    let std_price = variance.sqrt();

    let demand: Vec<f64> = series.samples().iter().filter_map(|s| s.demand).collect();
    let (mean_demand, max_demand) = if demand.is_empty() {
        (None, None)
    } else {
        (
            Some(demand.iter().sum::<f64>() / demand.len() as f64),
            demand.iter().copied().reduce(f64::max),
        )
    };

    Ok(PriceSummary {
        count,
        mean_price,
        median_price: interpolate_sorted(&prices, 0.5),
        min_price: prices[0],
        max_price: prices[count - 1],
        std_price,
        coeff_var: (mean_price != 0.0).then(|| std_price / mean_price),
        mean_demand,
        max_demand,
    })
}

/// Median spacing between consecutive samples, in hours.
///
/// Falls back to hourly when there is nothing to measure.
pub fn estimate_interval_hours(series: &PriceSeries) -> f64 {
    let mut timestamps: Vec<_> = series.samples().iter().map(|s| s.timestamp).collect();
    timestamps.sort();

    let mut deltas: Vec<f64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .collect();
    if deltas.is_empty() {
        return 1.0;
    }

    deltas.sort_by(|a, b| a.total_cmp(b));
    let median_seconds = interpolate_sorted(&deltas, 0.5);
    if median_seconds > 0.0 {
        median_seconds / 3600.0
    } else {
        1.0
    }
}

/// Mean price per local hour of day, ascending; hours without samples are omitted.
pub fn hourly_profile(series: &PriceSeries) -> Vec<(u32, f64)> {
    let mut sums = [(0.0_f64, 0_usize); 24];
    for sample in series.samples() {
        let slot = &mut sums[sample.timestamp.hour() as usize];
        slot.0 += sample.price;
        slot.1 += 1;
    }

    sums.iter()
        .enumerate()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(hour, (total, n))| (hour as u32, total / *n as f64))
        .collect()
}
