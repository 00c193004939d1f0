use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use spot_arbitrage::{BacktestResult, PriceSummary, SpikeReport};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Summary,
    Json,
    Csv,
}

const SPIKE_PREVIEW_ROWS: usize = 5;

pub fn write_summary<W: Write>(out: &mut W, region: Option<&str>, summary: &PriceSummary) -> Result<()> {
    writeln!(out, "Price Summary")?;
    writeln!(out, "=============")?;
    if let Some(region) = region {
        writeln!(out, "Region: {}", region)?;
    }
    writeln!(out, "Samples: {}", summary.count)?;
    writeln!(out, "Mean price: ${:.2}/MWh", summary.mean_price)?;
    writeln!(out, "Median price: ${:.2}/MWh", summary.median_price)?;
    writeln!(out, "Min price: ${:.2}/MWh", summary.min_price)?;
    writeln!(out, "Max price: ${:.2}/MWh", summary.max_price)?;
    writeln!(out, "Std dev: ${:.2}/MWh", summary.std_price)?;
    if let Some(cv) = summary.coeff_var {
        writeln!(out, "Coefficient of variation: {:.3}", cv)?;
    }
    if let Some(mean) = summary.mean_demand {
        writeln!(out, "Mean demand: {:.1} MW", mean)?;
    }
    if let Some(max) = summary.max_demand {
        writeln!(out, "Max demand: {:.1} MW", max)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct SpikeRow<'a> {
    timestamp: String,
    region: &'a str,
    price: f64,
    demand: Option<f64>,
}

pub fn write_spikes<W: Write>(out: &mut W, report: &SpikeReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for spike in &report.spikes {
                writer.serialize(SpikeRow {
                    timestamp: spike.timestamp.to_rfc3339(),
                    region: &spike.region,
                    price: spike.price,
                    demand: spike.demand,
                })?;
            }
            writer.flush()?;
        }
        OutputFormat::Summary => {
            writeln!(out, "Spike threshold: ${:.2}/MWh", report.threshold.value())?;
            writeln!(out, "Spikes: {}", report.count)?;
            if let Some(max) = report.max_price {
                writeln!(out, "Max spike price: ${:.2}/MWh", max)?;
            }
            if let Some(mean) = report.mean_spike_price {
                writeln!(out, "Mean spike price: ${:.2}/MWh", mean)?;
            }

            if report.spikes.is_empty() {
                writeln!(out, "No spikes detected.")?;
            } else {
                writeln!(out)?;
                for spike in report.spikes.iter().take(SPIKE_PREVIEW_ROWS) {
                    writeln!(
                        out,
                        "  {}  {:<6} ${:.2}",
                        spike.timestamp.format("%Y-%m-%d %H:%M %:z"),
                        spike.region,
                        spike.price
                    )?;
                }
                if report.count > SPIKE_PREVIEW_ROWS {
                    writeln!(out, "  ... {} more", report.count - SPIKE_PREVIEW_ROWS)?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct BacktestRow<'a> {
    region: &'a str,
    total_profit: f64,
    cycles: u64,
    equivalent_full_cycles: f64,
    capacity_factor: f64,
    low_cutoff: Option<f64>,
    high_cutoff: Option<f64>,
    energy_charged_mwh: f64,
    energy_discharged_mwh: f64,
    final_soc_mwh: f64,
    hours_at_full: f64,
    hours_empty: f64,
    series_duration_hours: f64,
}

impl<'a> From<&'a BacktestResult> for BacktestRow<'a> {
    fn from(result: &'a BacktestResult) -> Self {
        Self {
            region: result.region.as_deref().unwrap_or(""),
            total_profit: result.total_profit,
            cycles: result.cycles,
            equivalent_full_cycles: result.equivalent_full_cycles,
            capacity_factor: result.capacity_factor,
            low_cutoff: result.low_cutoff(),
            high_cutoff: result.high_cutoff(),
            energy_charged_mwh: result.final_state.energy_charged_mwh,
            energy_discharged_mwh: result.final_state.energy_discharged_mwh,
            final_soc_mwh: result.final_state.state_of_charge_mwh,
            hours_at_full: result.hours_at_full,
            hours_empty: result.hours_empty,
            series_duration_hours: result.series_duration_hours,
        }
    }
}

pub fn write_backtests<W: Write>(out: &mut W, results: &[BacktestResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            // A single run prints as an object, several as an array
            match results {
                [single] => serde_json::to_writer_pretty(&mut *out, single)?,
                _ => serde_json::to_writer_pretty(&mut *out, results)?,
            }
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for result in results {
                writer.serialize(BacktestRow::from(result))?;
            }
            writer.flush()?;
        }
        OutputFormat::Summary => {
            for (i, result) in results.iter().enumerate() {
                if i > 0 {
                    writeln!(out)?;
                }
                write_backtest_summary(out, result)?;
            }
        }
    }
    Ok(())
}

fn write_backtest_summary<W: Write>(out: &mut W, result: &BacktestResult) -> Result<()> {
    let config = &result.config;

    writeln!(out, "Battery Backtest: {}", result.region.as_deref().unwrap_or("-"))?;
    writeln!(out, "=================")?;
    writeln!(
        out,
        "Configuration: {} MW / {} MWh @ {:.1}% round trip",
        config.power_mw,
        config.capacity_mwh,
        config.round_trip_efficiency * 100.0
    )?;
    match (result.low_cutoff(), result.high_cutoff()) {
        (Some(low), Some(high)) => writeln!(
            out,
            "Cutoffs: charge <= ${:.2} (q{:.2}), discharge >= ${:.2} (q{:.2})",
            low, config.low_quantile, high, config.high_quantile
        )?,
        _ => writeln!(out, "Cutoffs: n/a")?,
    }
    writeln!(out, "Interval: {:.4} h over {:.1} h", result.interval_hours, result.series_duration_hours)?;
    writeln!(out, "Total profit: ${:.2}", result.total_profit)?;
    writeln!(out, "Cycles: {}", result.cycles)?;
    writeln!(out, "Equivalent full cycles: {:.2}", result.equivalent_full_cycles)?;
    writeln!(out, "Capacity factor: {:.1}%", result.capacity_factor * 100.0)?;
    writeln!(out, "Final state of charge: {:.3} MWh", result.final_state.state_of_charge_mwh)?;
    writeln!(out, "Hours at full: {:.1}", result.hours_at_full)?;
    writeln!(out, "Hours empty: {:.1}", result.hours_empty)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use spot_arbitrage::{
        detect_spikes, run_battery_backtest, BatteryConfig, PriceSample, PriceSeries, ThresholdSpec,
    };

    fn series(prices: &[f64]) -> PriceSeries {
        let base = DateTime::parse_from_rfc3339("2021-01-01T00:00:00+10:00").unwrap();
        PriceSeries::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, p)| PriceSample::new(base + Duration::minutes(30 * i as i64), "QLD1", *p))
                .collect(),
        )
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_spike_summary_without_spikes() {
        let report = detect_spikes(&series(&[10.0, 20.0]), ThresholdSpec::Absolute(300.0)).unwrap();
        let text = render(|out| write_spikes(out, &report, OutputFormat::Summary));

        assert!(text.contains("Spikes: 0"));
        assert!(text.contains("No spikes detected."));
        assert!(!text.contains("Max spike price"));
    }

    #[test]
    fn test_spike_summary_previews_first_rows() {
        let prices: Vec<f64> = (0..8).map(|i| 400.0 + i as f64).collect();
        let report = detect_spikes(&series(&prices), ThresholdSpec::Absolute(300.0)).unwrap();
        let text = render(|out| write_spikes(out, &report, OutputFormat::Summary));

        assert!(text.contains("$404.00"));
        assert!(!text.contains("$405.00"));
        assert!(text.contains("... 3 more"));
    }

    #[test]
    fn test_spike_csv_has_header_and_rows() {
        let report = detect_spikes(&series(&[50.0, 310.0, 500.0]), ThresholdSpec::Absolute(300.0)).unwrap();
        let text = render(|out| write_spikes(out, &report, OutputFormat::Csv));
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "timestamp,region,price,demand");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",QLD1,310.0,"));
    }

    #[test]
    fn test_backtest_json_single_is_object() {
        let result = run_battery_backtest(&series(&[10.0, 100.0]), BatteryConfig::default()).unwrap();
        let text = render(|out| write_backtests(out, &[result], OutputFormat::Json));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert!(value.is_object());
        assert_eq!(value["region"], "QLD1");
    }

    #[test]
    fn test_backtest_csv_rows() {
        let a = run_battery_backtest(&series(&[10.0, 100.0]), BatteryConfig::default()).unwrap();
        let b = run_battery_backtest(&series(&[20.0, 80.0]), BatteryConfig::default()).unwrap();
        let text = render(|out| write_backtests(out, &[a, b], OutputFormat::Csv));
        let lines: Vec<_> = text.lines().collect();

        assert!(lines[0].starts_with("region,total_profit,cycles"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_backtest_summary_lists_profit() {
        let result = run_battery_backtest(&series(&[10.0, 100.0]), BatteryConfig::default()).unwrap();
        let text = render(|out| write_backtests(out, &[result], OutputFormat::Summary));

        assert!(text.contains("Battery Backtest: QLD1"));
        assert!(text.contains("Total profit: $"));
        assert!(text.contains("Cycles: 1"));
    }
}
