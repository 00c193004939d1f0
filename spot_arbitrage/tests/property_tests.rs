//! Property tests for the threshold, spike and battery invariants.

use chrono::{DateTime, Duration};
use proptest::prelude::*;
use spot_arbitrage::{
    detect_spikes, resolve_threshold, run_battery_backtest, BatteryConfig, BatterySimulator,
    BatteryState, EfficiencyModel, PriceSample, PriceSeries, ThresholdSpec,
};

const TOLERANCE: f64 = 1e-9;

fn series_from(prices: &[f64]) -> PriceSeries {
    let base = DateTime::parse_from_rfc3339("2023-07-01T00:00:00+10:00").unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| PriceSample::new(base + Duration::minutes(5 * i as i64), "NSW1", p))
        .collect::<Vec<_>>()
        .into()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_prices() -> impl Strategy<Value = Vec<f64>> {
    // NEM prices run from the market floor to the cap
    prop::collection::vec(-1000.0..15_000.0_f64, 1..200)
}

fn arb_model() -> impl Strategy<Value = EfficiencyModel> {
    prop_oneof![Just(EfficiencyModel::Symmetric), Just(EfficiencyModel::DischargeOnly)]
}

fn arb_config() -> impl Strategy<Value = BatteryConfig> {
    (
        0.5..200.0_f64,
        0.5..100.0_f64,
        0.05..=1.0_f64,
        0.0..0.5_f64,
        0.5..=1.0_f64,
        prop_oneof![Just(5.0 / 60.0), Just(0.5), Just(1.0)],
        arb_model(),
    )
        .prop_map(|(capacity, power, rte, low, high, interval, model)| {
            BatteryConfig::new(capacity, power, rte, low, high, interval)
                .unwrap()
                .with_efficiency_model(model)
        })
}

// ── Threshold Resolver ───────────────────────────────────────────────

proptest! {
    #[test]
    fn quantile_stays_within_sample_range(prices in arb_prices(), q in 0.0..=1.0_f64) {
        let t = resolve_threshold(&prices, ThresholdSpec::Quantile(q)).unwrap().value();
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(t >= min - TOLERANCE && t <= max + TOLERANCE);
    }

    #[test]
    fn quantile_extremes_are_min_and_max(prices in arb_prices()) {
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(resolve_threshold(&prices, ThresholdSpec::Quantile(0.0)).unwrap().value(), min);
        prop_assert_eq!(resolve_threshold(&prices, ThresholdSpec::Quantile(1.0)).unwrap().value(), max);
    }
}

// ── Spike Detector ───────────────────────────────────────────────────

proptest! {
    /// Raising the cutoff never adds spikes.
    #[test]
    fn spike_count_is_monotone_in_quantile(
        prices in arb_prices(),
        a in 0.0..=1.0_f64,
        b in 0.0..=1.0_f64,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let series = series_from(&prices);
        let low = detect_spikes(&series, ThresholdSpec::Quantile(lo)).unwrap();
        let high = detect_spikes(&series, ThresholdSpec::Quantile(hi)).unwrap();
        prop_assert!(high.count <= low.count);
    }

    #[test]
    fn spike_count_is_monotone_in_absolute(
        prices in arb_prices(),
        a in -1000.0..15_000.0_f64,
        b in -1000.0..15_000.0_f64,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let series = series_from(&prices);
        let low = detect_spikes(&series, ThresholdSpec::Absolute(lo)).unwrap();
        let high = detect_spikes(&series, ThresholdSpec::Absolute(hi)).unwrap();
        prop_assert!(high.count <= low.count);
    }

    #[test]
    fn every_spike_is_strictly_above_cutoff(prices in arb_prices(), q in 0.0..=1.0_f64) {
        let report = detect_spikes(&series_from(&prices), ThresholdSpec::Quantile(q)).unwrap();
        prop_assert_eq!(report.count, report.spikes.len());
        for spike in &report.spikes {
            prop_assert!(spike.price > report.threshold.value());
        }
        prop_assert_eq!(report.max_price.is_some(), report.count > 0);
    }
}

// ── Battery State Machine ────────────────────────────────────────────

proptest! {
    /// Energy cannot be created by a round trip.
    #[test]
    fn discharged_energy_never_exceeds_charged_after_losses(
        prices in arb_prices(),
        config in arb_config(),
    ) {
        let rte = config.round_trip_efficiency;
        let result = run_battery_backtest(&series_from(&prices), config).unwrap();
        let state = &result.final_state;
        prop_assert!(
            state.energy_discharged_mwh <= state.energy_charged_mwh * rte * (1.0 + TOLERANCE) + TOLERANCE,
            "discharged {} > charged {} * {}",
            state.energy_discharged_mwh,
            state.energy_charged_mwh,
            rte
        );
    }

    #[test]
    fn state_of_charge_stays_within_bounds(prices in arb_prices(), config in arb_config()) {
        let capacity = config.capacity_mwh;
        let simulator = BatterySimulator::new(config).unwrap();
        let cutoffs = simulator.cutoffs(&prices).unwrap();
        let mut state = BatteryState::empty();

        for price in prices {
            simulator.step(&mut state, price, cutoffs);
            prop_assert!(state.state_of_charge_mwh >= 0.0);
            prop_assert!(state.state_of_charge_mwh <= capacity);
        }
    }

    #[test]
    fn backtest_is_bit_identical_on_rerun(prices in arb_prices(), config in arb_config()) {
        let series = series_from(&prices);
        let first = run_battery_backtest(&series, config.clone()).unwrap();
        let second = run_battery_backtest(&series, config).unwrap();

        prop_assert_eq!(first.total_profit.to_bits(), second.total_profit.to_bits());
        prop_assert_eq!(
            first.final_state.state_of_charge_mwh.to_bits(),
            second.final_state.state_of_charge_mwh.to_bits()
        );
        prop_assert_eq!(first, second);
    }

    #[test]
    fn capacity_factor_is_a_fraction(prices in arb_prices(), config in arb_config()) {
        let result = run_battery_backtest(&series_from(&prices), config).unwrap();
        prop_assert!(result.capacity_factor >= 0.0);
        prop_assert!(result.capacity_factor <= 1.0 + TOLERANCE);
        prop_assert!(result.hours_at_full + result.hours_empty <= result.series_duration_hours + TOLERANCE);
    }
}
