use chrono::{DateTime, Duration};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spot_arbitrage::{
    detect_spikes, run_battery_backtest, BatteryConfig, PriceSample, PriceSeries, ThresholdSpec,
};

/// One year of 5-minute dispatch prices with a daily evening peak.
fn synthetic_year() -> PriceSeries {
    let base = DateTime::parse_from_rfc3339("2023-01-01T00:00:00+10:00").unwrap();
    let intervals = 365 * 288;

    let mut samples = Vec::with_capacity(intervals);
    for i in 0..intervals {
        let hour = (i % 288) / 12;
        let price = match hour {
            0..=5 => 35.0,
            10..=14 => -5.0, // solar soak
            17..=20 => 280.0,
            _ => 80.0,
        } + (i % 7) as f64;

        samples.push(PriceSample::new(
            base + Duration::minutes(5 * i as i64),
            "SA1",
            price,
        ));
    }
    PriceSeries::new(samples)
}

fn benchmark_battery_backtest(c: &mut Criterion) {
    let series = synthetic_year();
    let config = BatteryConfig::new(200.0, 100.0, 0.88, 0.25, 0.75, 5.0 / 60.0).unwrap();

    c.bench_function("battery_backtest_year_5min", |b| {
        b.iter(|| {
            let _result = black_box(run_battery_backtest(&series, config.clone()));
        });
    });
}

fn benchmark_spike_detection(c: &mut Criterion) {
    let series = synthetic_year();

    c.bench_function("spike_detection_q95", |b| {
        b.iter(|| {
            let _report = black_box(detect_spikes(&series, ThresholdSpec::Quantile(0.95)));
        });
    });

    c.bench_function("spike_detection_absolute", |b| {
        b.iter(|| {
            let _report = black_box(detect_spikes(&series, ThresholdSpec::Absolute(300.0)));
        });
    });
}

criterion_group!(benches, benchmark_battery_backtest, benchmark_spike_detection);
criterion_main!(benches);
