use anyhow::{Context, Result};
use serde::Deserialize;
use spot_arbitrage::EfficiencyModel;
use std::path::{Path, PathBuf};

use crate::plots::PlotKind;

/// Optional TOML configuration.
///
/// ```toml
/// timezone = "Australia/Brisbane"
/// output_dir = "charts"
///
/// [columns]
/// timestamp = "SETTLEMENTDATE"
/// price = "RRP"
///
/// [defaults]
/// region = "QLD1"
/// quantile = 0.95
/// low_quantile = 0.2
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub timezone: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub columns: ColumnOverrides,
    pub defaults: Defaults,
}

/// Source column names for the logical fields, when the aliases don't match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnOverrides {
    pub timestamp: Option<String>,
    pub region: Option<String>,
    pub price: Option<String>,
    pub demand: Option<String>,
}

/// Fallbacks for CLI flags that were not given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    pub region: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub threshold: Option<f64>,
    pub quantile: Option<f64>,
    pub low_quantile: Option<f64>,
    pub high_quantile: Option<f64>,
    pub round_trip_efficiency: Option<f64>,
    pub capacity_mwh: Option<f64>,
    pub power_mw: Option<f64>,
    pub interval_hours: Option<f64>,
    pub efficiency_model: Option<EfficiencyModel>,
    pub plot_kind: Option<PlotKind>,
}

impl AppConfig {
    pub fn timezone_name(&self) -> &str {
        self.timezone.as_deref().unwrap_or("UTC")
    }
}

/// Load the config at `path`, or the empty config when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Config file not found or unreadable: {}", path.display()))?;
    let config: AppConfig = toml::from_str(&text)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.timezone_name(), "UTC");
        assert_eq!(config.columns, ColumnOverrides::default());
        assert!(config.defaults.region.is_none());
    }

    #[test]
    fn test_parses_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
timezone = "Australia/Melbourne"
output_dir = "charts"

[columns]
timestamp = "time"
region = "zone"

[defaults]
region = "VIC1"
quantile = 0.9
round_trip_efficiency = 0.85
efficiency_model = "discharge-only"
plot_kind = "daily"
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.timezone_name(), "Australia/Melbourne");
        assert_eq!(config.output_dir, Some(PathBuf::from("charts")));
        assert_eq!(config.columns.timestamp.as_deref(), Some("time"));
        assert_eq!(config.columns.price, None);
        assert_eq!(config.defaults.region.as_deref(), Some("VIC1"));
        assert_eq!(config.defaults.quantile, Some(0.9));
        assert_eq!(config.defaults.efficiency_model, Some(EfficiencyModel::DischargeOnly));
        assert_eq!(config.defaults.plot_kind, Some(PlotKind::Daily));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timezon = \"UTC\"").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }
}
