use chrono::{DateTime, Duration};
use spot_arbitrage::{
    detect_spikes, run_battery_backtest, BatteryConfig, PriceSample, PriceSeries, ThresholdSpec,
};

fn main() {
    // 1 MW / 2 MWh battery, hourly prices
    let config = BatteryConfig::new(2.0, 1.0, 0.85, 0.25, 0.75, 1.0).expect("valid config");

    let base_time = DateTime::parse_from_rfc3339("2024-01-15T00:00:00+10:00").unwrap();

    // Night hours (cheap): $20/MWh
    // Day hours (medium): $50/MWh
    // Evening peak (expensive): $300/MWh
    let samples: Vec<_> = (0..24)
        .map(|hour| {
            let price = match hour {
                0..=5 | 21..=23 => 20.0,
                18..=20 => 300.0,
                _ => 50.0,
            };
            PriceSample::new(base_time + Duration::hours(hour), "VIC1", price)
        })
        .collect();
    let series = PriceSeries::new(samples);

    let spikes = detect_spikes(&series, ThresholdSpec::Absolute(100.0)).expect("non-empty series");
    let result = run_battery_backtest(&series, config).expect("valid config");

    println!("Spot Arbitrage Example");
    println!("======================");
    println!("Region: {}", result.region.as_deref().unwrap_or("-"));
    println!(
        "Configuration: {} MW / {} MWh @ {:.0}% round trip",
        result.config.power_mw,
        result.config.capacity_mwh,
        result.config.round_trip_efficiency * 100.0
    );
    println!();
    println!("Spikes above $100: {}", spikes.count);
    if let Some(max) = spikes.max_price {
        println!("Highest spike: ${:.2}/MWh", max);
    }
    println!();
    println!(
        "Cutoffs: charge <= ${:.2}, discharge >= ${:.2}",
        result.low_cutoff().unwrap_or(f64::NAN),
        result.high_cutoff().unwrap_or(f64::NAN)
    );
    println!("Profit: ${:.2}", result.total_profit);
    println!("Cycles: {}", result.cycles);
    println!("Energy bought: {:.2} MWh", result.final_state.energy_charged_mwh);
    println!("Energy sold: {:.2} MWh", result.final_state.energy_discharged_mwh);
    println!("Capacity factor: {:.1}%", result.capacity_factor * 100.0);
}
