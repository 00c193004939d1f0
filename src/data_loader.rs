use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use rayon::prelude::*;
use spot_arbitrage::PriceSample;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::ColumnOverrides;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no CSV files provided")]
    NoInputFiles,

    #[error("CSV file not found: {0}")]
    NotFound(PathBuf),

    #[error("CSV file is empty: {0}")]
    EmptyFile(PathBuf),

    #[error("missing required column for '{field}' in {path}")]
    MissingColumn { field: &'static str, path: PathBuf },

    #[error("override for '{field}' not found in CSV: {column}")]
    OverrideNotFound { field: &'static str, column: String },

    #[error("invalid timestamp '{value}' at row {row} of {path}")]
    InvalidTimestamp { value: String, row: usize, path: PathBuf },

    #[error("invalid or missing {field} at row {row} of {path}")]
    InvalidValue { field: &'static str, row: usize, path: PathBuf },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to walk input directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Logical columns every loaded file is normalised to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Timestamp,
    Region,
    Price,
    Demand,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Timestamp => "timestamp",
            Field::Region => "region",
            Field::Price => "price",
            Field::Demand => "demand",
        }
    }

    /// Lower-case header names recognised without an override.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Timestamp => &["timestamp", "datetime", "settlementdate", "trading_interval"],
            Field::Region => &["region", "regionid"],
            Field::Price => &["price", "rrp"],
            Field::Demand => &["demand", "totaldemand", "total_demand", "demandmw"],
        }
    }

    fn override_in(self, overrides: &ColumnOverrides) -> Option<&str> {
        match self {
            Field::Timestamp => overrides.timestamp.as_deref(),
            Field::Region => overrides.region.as_deref(),
            Field::Price => overrides.price.as_deref(),
            Field::Demand => overrides.demand.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub column_overrides: ColumnOverrides,
    pub timezone: Tz,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            column_overrides: ColumnOverrides::default(),
            timezone: Tz::UTC,
        }
    }
}

impl LoadOptions {
    pub fn new(column_overrides: ColumnOverrides, timezone: &str) -> Result<Self, LoadError> {
        let timezone = timezone
            .parse::<Tz>()
            .map_err(|_| LoadError::UnknownTimezone(timezone.to_string()))?;
        Ok(Self {
            column_overrides,
            timezone,
        })
    }
}

/// Find the source column for `field`: explicit override first, then aliases.
fn resolve_column(
    columns: &[&str],
    field: Field,
    overrides: &ColumnOverrides,
) -> Result<Option<String>, LoadError> {
    if let Some(column) = field.override_in(overrides) {
        if columns.contains(&column) {
            return Ok(Some(column.to_string()));
        }
        return Err(LoadError::OverrideNotFound {
            field: field.name(),
            column: column.to_string(),
        });
    }

    for alias in field.aliases() {
        if let Some(column) = columns.iter().find(|c| c.to_lowercase() == *alias) {
            return Ok(Some(column.to_string()));
        }
    }
    Ok(None)
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp and express it in `tz`.
///
/// Values with an offset are converted; naive values are localised, and local
/// times that are ambiguous or skipped by a DST change are rejected.
pub fn parse_timestamp(value: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    let with_offset = DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z"));
    if let Ok(dt) = with_offset {
        return Some(dt.with_timezone(tz).fixed_offset());
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    tz.from_local_datetime(&naive).single().map(|dt| dt.fixed_offset())
}

/// Load one CSV and normalise it to price samples sorted by timestamp.
pub fn load_csv(path: &Path, options: &LoadOptions) -> Result<Vec<PriceSample>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    if std::fs::metadata(path)?.len() == 0 {
        return Err(LoadError::EmptyFile(path.to_path_buf()));
    }

    // Every column is read as text; numeric conversion happens in the casts below
    let df = CsvReader::from_path(path)?
        .has_header(true)
        .infer_schema(Some(0))
        .finish()?;
    if df.height() == 0 {
        return Err(LoadError::EmptyFile(path.to_path_buf()));
    }

    let columns = df.get_column_names();
    let overrides = &options.column_overrides;
    let required = |field: Field| -> Result<String, LoadError> {
        resolve_column(&columns, field, overrides)?.ok_or_else(|| LoadError::MissingColumn {
            field: field.name(),
            path: path.to_path_buf(),
        })
    };
    let timestamp_col = required(Field::Timestamp)?;
    let region_col = required(Field::Region)?;
    let price_col = required(Field::Price)?;
    let demand_col = resolve_column(&columns, Field::Demand, overrides)?;

    // Non-strict casts: unparsable numbers become null and are reported per row
    let timestamps = df.column(&timestamp_col)?.cast(&DataType::Utf8)?;
    let timestamps = timestamps.utf8()?;
    let regions = df.column(&region_col)?.cast(&DataType::Utf8)?;
    let regions = regions.utf8()?;
    let prices = df.column(&price_col)?.cast(&DataType::Float64)?;
    let prices = prices.f64()?;
    let demand = match &demand_col {
        Some(name) => Some(df.column(name)?.cast(&DataType::Float64)?),
        None => None,
    };
    let demand = demand.as_ref().map(|s| s.f64()).transpose()?;

    let mut samples = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let row = idx + 1;

        let raw = timestamps.get(idx).ok_or_else(|| LoadError::InvalidValue {
            field: "timestamp",
            row,
            path: path.to_path_buf(),
        })?;
        let timestamp =
            parse_timestamp(raw, &options.timezone).ok_or_else(|| LoadError::InvalidTimestamp {
                value: raw.to_string(),
                row,
                path: path.to_path_buf(),
            })?;

        let region = regions
            .get(idx)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| LoadError::InvalidValue {
                field: "region",
                row,
                path: path.to_path_buf(),
            })?;

        let price = prices
            .get(idx)
            .filter(|p| p.is_finite())
            .ok_or_else(|| LoadError::InvalidValue {
                field: "price",
                row,
                path: path.to_path_buf(),
            })?;

        samples.push(PriceSample {
            timestamp,
            region: region.to_string(),
            price,
            demand: demand.and_then(|d| d.get(idx)),
        });
    }

    samples.sort_by_key(|s| s.timestamp);
    log::info!("Loaded {} rows from {}", samples.len(), path.display());
    Ok(samples)
}

/// Load several CSVs in parallel and merge them in argument order.
///
/// With `drop_duplicates`, only the first row for each `(timestamp, region)` is kept.
pub fn load_csvs(
    paths: &[PathBuf],
    options: &LoadOptions,
    drop_duplicates: bool,
) -> Result<Vec<PriceSample>, LoadError> {
    if paths.is_empty() {
        return Err(LoadError::NoInputFiles);
    }

    let pb = if paths.len() > 1 {
        ProgressBar::new(paths.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
    {
        pb.set_style(style);
    }

    let frames: Vec<Vec<PriceSample>> = paths
        .par_iter()
        .map(|path| {
            let loaded = load_csv(path, options);
            pb.inc(1);
            loaded
        })
        .collect::<Result<_, _>>()?;
    pb.finish_and_clear();

    let mut combined: Vec<PriceSample> = frames.into_iter().flatten().collect();
    if drop_duplicates {
        let before = combined.len();
        let mut seen = HashSet::new();
        combined.retain(|s| seen.insert((s.timestamp, s.region.clone())));
        if combined.len() < before {
            log::info!("Dropped {} duplicate timestamp/region rows", before - combined.len());
        }
    }

    combined.sort_by_key(|s| s.timestamp);
    Ok(combined)
}

/// Expand CLI inputs: directories are walked for `*.csv`, patterns are globbed,
/// anything else is taken as a file path.
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>, LoadError> {
    let mut paths = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path) {
                let entry = entry?;
                let is_csv = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
                if entry.file_type().is_file() && is_csv {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            paths.extend(found);
        } else if input.contains(['*', '?', '[']) {
            let mut found: Vec<PathBuf> = glob::glob(input)?.filter_map(Result::ok).collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(path.to_path_buf());
        }
    }

    Ok(paths)
}
