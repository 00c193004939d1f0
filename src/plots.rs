use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use plotters::prelude::*;
use serde::Deserialize;
use spot_arbitrage::{hourly_profile, PriceSeries};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    Timeseries,
    Daily,
}

impl PlotKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PlotKind::Timeseries => "price_timeseries.png",
            PlotKind::Daily => "daily_profile.png",
        }
    }

    /// Render `series` into `output_dir` and return the written path.
    pub fn render(self, series: &PriceSeries, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(self.file_name());
        match self {
            PlotKind::Timeseries => plot_price_timeseries(series, &path),
            PlotKind::Daily => plot_daily_profile(series, &path),
        }
    }
}

fn prepare_output(series: &PriceSeries, path: &Path) -> Result<()> {
    if series.is_empty() {
        bail!("Cannot plot an empty series");
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn padded_range(min: f64, max: f64) -> (f64, f64) {
    let pad = ((max - min) * 0.05).max(1.0);
    (min - pad, max + pad)
}

/// Price against hours elapsed since the first sample.
pub fn plot_price_timeseries(series: &PriceSeries, path: &Path) -> Result<PathBuf> {
    prepare_output(series, path)?;

    let samples = series.samples();
    let start = samples[0].timestamp;
    let points: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| ((s.timestamp - start).num_seconds() as f64 / 3600.0, s.price))
        .collect();

    let x_max = points.iter().map(|p| p.0).fold(0.0_f64, f64::max).max(1.0);
    let (y_min, y_max) = padded_range(
        points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min),
        points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max),
    );
    let region = series.region().unwrap_or("all regions");

    let root = BitMapBackend::new(path, (1200, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Spot price: {}", region), ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(format!("Hours since {}", start.format("%Y-%m-%d %H:%M")))
        .y_desc("Price ($/MWh)")
        .draw()?;

    chart.draw_series(LineSeries::new(points, &BLUE))?;

    root.present()?;
    log::info!("wrote {}", path.display());
    Ok(path.to_path_buf())
}

/// Mean price by hour of day as a bar chart.
pub fn plot_daily_profile(series: &PriceSeries, path: &Path) -> Result<PathBuf> {
    prepare_output(series, path)?;

    let profile = hourly_profile(series);
    let (y_min, y_max) = padded_range(
        profile.iter().map(|p| p.1).fold(0.0_f64, f64::min),
        profile.iter().map(|p| p.1).fold(0.0_f64, f64::max),
    );
    let region = series.region().unwrap_or("all regions");

    let root = BitMapBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Average daily profile: {}", region), ("sans-serif", 30).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5..23.5, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Hour of day")
        .y_desc("Mean price ($/MWh)")
        .x_labels(24)
        .draw()?;

    chart.draw_series(profile.iter().map(|(hour, mean)| {
        let x = *hour as f64;
        Rectangle::new(
            [(x - 0.4, 0.0), (x + 0.4, *mean)],
            if *mean >= 0.0 { BLUE.filled() } else { RED.filled() },
        )
    }))?;

    root.present()?;
    log::info!("wrote {}", path.display());
    Ok(path.to_path_buf())
}
