use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use spot_arbitrage::{
    backtest_regions, compute_summary, detect_spikes, estimate_interval_hours, filter_series,
    split_by_region, BatteryConfig, EfficiencyModel, PriceSample, PriceSeries, ThresholdSpec,
};
use std::io::Write;
use std::path::PathBuf;

mod config;
mod data_loader;
mod output;
mod plots;

use config::{load_config, AppConfig};
use data_loader::{expand_inputs, load_csvs, parse_timestamp, LoadOptions};
use output::OutputFormat;
use plots::PlotKind;

const DEFAULT_SPIKE_QUANTILE: f64 = 0.95;
const DEFAULT_OUTPUT_DIR: &str = "plots";

#[derive(Parser)]
#[command(name = "nem_price_analyzer", version)]
#[command(about = "Analyse electricity spot prices: summaries, spikes, plots and battery arbitrage backtests")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print summary statistics for the price series
    Analyze {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Find prices strictly above a threshold
    Spikes {
        #[command(flatten)]
        data: DataArgs,

        /// Absolute spike threshold in $/MWh (wins over --quantile)
        #[arg(long)]
        threshold: Option<f64>,

        /// Quantile of the price distribution to use as threshold (0-1)
        #[arg(long)]
        quantile: Option<f64>,

        #[arg(short, long, value_enum, default_value = "summary")]
        output: OutputFormat,
    },

    /// Render a PNG chart of the series
    Plot {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long, value_enum)]
        kind: Option<PlotKind>,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Backtest the quantile battery arbitrage strategy
    BatteryBacktest {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        battery: BatteryArgs,

        /// Run every region in the filtered data separately
        #[arg(long)]
        all_regions: bool,

        #[arg(short, long, value_enum, default_value = "summary")]
        output: OutputFormat,
    },
}

#[derive(Args, Debug)]
struct DataArgs {
    /// CSV files, directories or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Region to keep (case-insensitive)
    #[arg(short, long)]
    region: Option<String>,

    /// Inclusive start, e.g. 2021-01-01 or "2021-01-01 06:00"
    #[arg(long)]
    start: Option<String>,

    /// Inclusive end
    #[arg(long)]
    end: Option<String>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep rows that repeat an earlier timestamp/region pair
    #[arg(long)]
    keep_duplicates: bool,
}

#[derive(Args, Debug)]
struct BatteryArgs {
    /// Quantile at or below which the battery charges
    #[arg(long)]
    low_quantile: Option<f64>,

    /// Quantile at or above which the battery discharges
    #[arg(long)]
    high_quantile: Option<f64>,

    /// Round-trip efficiency (0-1]
    #[arg(long)]
    round_trip_efficiency: Option<f64>,

    #[arg(long)]
    capacity_mwh: Option<f64>,

    #[arg(long)]
    power_mw: Option<f64>,

    /// Interval length in hours; estimated from timestamps when omitted
    #[arg(long)]
    interval_hours: Option<f64>,

    #[arg(long, value_enum)]
    efficiency_model: Option<EfficiencyModelArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EfficiencyModelArg {
    Symmetric,
    DischargeOnly,
}

impl From<EfficiencyModelArg> for EfficiencyModel {
    fn from(arg: EfficiencyModelArg) -> Self {
        match arg {
            EfficiencyModelArg::Symmetric => EfficiencyModel::Symmetric,
            EfficiencyModelArg::DischargeOnly => EfficiencyModel::DischargeOnly,
        }
    }
}

/// Region and inclusive time window to keep, after merging flags with config.
#[derive(Debug, PartialEq)]
struct DataFilter {
    region: Option<String>,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
}

/// Flags win over `[defaults]`; bounds are parsed in `timezone`.
fn resolve_filter(args: &DataArgs, app: &AppConfig, timezone: &Tz) -> Result<DataFilter> {
    let defaults = &app.defaults;
    let bound = |flag: &Option<String>,
                 fallback: &Option<String>,
                 name: &str|
     -> Result<Option<DateTime<FixedOffset>>> {
        match flag.as_ref().or(fallback.as_ref()) {
            Some(value) => parse_timestamp(value, timezone)
                .map(Some)
                .with_context(|| format!("Invalid --{} timestamp: {}", name, value)),
            None => Ok(None),
        }
    };

    Ok(DataFilter {
        region: args.region.clone().or_else(|| defaults.region.clone()),
        start: bound(&args.start, &defaults.start, "start")?,
        end: bound(&args.end, &defaults.end, "end")?,
    })
}

/// Load, merge and filter the inputs named in `args`.
fn load_dataset(args: &DataArgs, app: &AppConfig) -> Result<Vec<PriceSample>> {
    let options = LoadOptions::new(app.columns.clone(), app.timezone_name())?;
    let filter = resolve_filter(args, app, &options.timezone)?;

    let paths = expand_inputs(&args.inputs)?;
    info!("Loading {} input file(s)", paths.len());
    let samples = load_csvs(&paths, &options, !args.keep_duplicates)?;

    let region = filter.region.as_deref();
    let filtered = filter_series(&samples, region, filter.start, filter.end);
    if filtered.is_empty() {
        bail!("No data left after filtering (region: {})", region.unwrap_or("any"));
    }
    info!("{} of {} rows after filtering", filtered.len(), samples.len());
    Ok(filtered)
}

/// The filtered data as a single-region series.
fn single_region(samples: Vec<PriceSample>) -> Result<PriceSeries> {
    let mut regions = split_by_region(&samples);
    if regions.len() > 1 {
        let names: Vec<_> = regions.iter().filter_map(|s| s.region()).collect();
        bail!(
            "Data contains {} regions ({}); choose one with --region",
            names.len(),
            names.join(", ")
        );
    }
    regions
        .pop()
        .context("No data left after filtering")
}

fn run_analyze(data: DataArgs) -> Result<()> {
    let app = load_config(data.config.as_deref())?;
    let samples = load_dataset(&data, &app)?;
    let regions = split_by_region(&samples);
    let series = PriceSeries::new(samples);

    let summary = compute_summary(&series)?;
    let region = match regions.as_slice() {
        [only] => only.region(),
        _ => None,
    };

    let mut stdout = std::io::stdout().lock();
    output::write_summary(&mut stdout, region, &summary)?;
    if regions.len() > 1 {
        writeln!(stdout, "Regions: {}", regions.len())?;
    }
    Ok(())
}

fn run_spikes(data: DataArgs, threshold: Option<f64>, quantile: Option<f64>, format: OutputFormat) -> Result<()> {
    let app = load_config(data.config.as_deref())?;
    let series = single_region(load_dataset(&data, &app)?)?;

    let defaults = &app.defaults;
    let spec = match (threshold, quantile) {
        (Some(t), _) => ThresholdSpec::Absolute(t),
        (None, Some(q)) => ThresholdSpec::Quantile(q),
        (None, None) => match (defaults.threshold, defaults.quantile) {
            (Some(t), _) => ThresholdSpec::Absolute(t),
            (None, Some(q)) => ThresholdSpec::Quantile(q),
            (None, None) => ThresholdSpec::Quantile(DEFAULT_SPIKE_QUANTILE),
        },
    };

    let report = detect_spikes(&series, spec)?;
    output::write_spikes(&mut std::io::stdout().lock(), &report, format)
}

fn run_plot(data: DataArgs, kind: Option<PlotKind>, output_dir: Option<PathBuf>) -> Result<()> {
    let app = load_config(data.config.as_deref())?;
    let series = single_region(load_dataset(&data, &app)?)?;

    let kind = kind.or(app.defaults.plot_kind).unwrap_or(PlotKind::Timeseries);
    let output_dir = output_dir
        .or_else(|| app.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let path = kind.render(&series, &output_dir)?;
    println!("{}", path.display());
    Ok(())
}

fn battery_config(args: &BatteryArgs, app: &AppConfig, estimate_from: &PriceSeries) -> Result<BatteryConfig> {
    let defaults = &app.defaults;
    let builtin = BatteryConfig::default();

    let interval_hours = match args.interval_hours.or(defaults.interval_hours) {
        Some(hours) => hours,
        None => {
            let estimated = estimate_interval_hours(estimate_from);
            info!("Estimated interval: {:.4} h", estimated);
            estimated
        }
    };
    let model = args
        .efficiency_model
        .map(EfficiencyModel::from)
        .or(defaults.efficiency_model)
        .unwrap_or_default();

    let config = BatteryConfig::new(
        args.capacity_mwh.or(defaults.capacity_mwh).unwrap_or(builtin.capacity_mwh),
        args.power_mw.or(defaults.power_mw).unwrap_or(builtin.power_mw),
        args.round_trip_efficiency
            .or(defaults.round_trip_efficiency)
            .unwrap_or(builtin.round_trip_efficiency),
        args.low_quantile.or(defaults.low_quantile).unwrap_or(builtin.low_quantile),
        args.high_quantile.or(defaults.high_quantile).unwrap_or(builtin.high_quantile),
        interval_hours,
    )?
    .with_efficiency_model(model);

    Ok(config)
}

fn run_battery_backtest(data: DataArgs, battery: BatteryArgs, all_regions: bool, format: OutputFormat) -> Result<()> {
    let app = load_config(data.config.as_deref())?;
    let samples = load_dataset(&data, &app)?;

    let series_list = if all_regions {
        split_by_region(&samples)
    } else {
        vec![single_region(samples)?]
    };
    let config = battery_config(&battery, &app, &series_list[0])?;

    let results = backtest_regions(&series_list, &config)
        .into_iter()
        .map(|(region, result)| result.with_context(|| format!("Backtest failed for {}", region)))
        .collect::<Result<Vec<_>>>()?;

    output::write_backtests(&mut std::io::stdout().lock(), &results, format)
}

fn main() -> Result<()> {
    env_logger::init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()
        .unwrap_or_else(|e| log::warn!("rayon pool already initialised: {}", e));

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze { data } => run_analyze(data),
        Command::Spikes {
            data,
            threshold,
            quantile,
            output,
        } => run_spikes(data, threshold, quantile, output),
        Command::Plot {
            data,
            kind,
            output_dir,
        } => run_plot(data, kind, output_dir),
        Command::BatteryBacktest {
            data,
            battery,
            all_regions,
            output,
        } => run_battery_backtest(data, battery, all_regions, output),
    }
}
