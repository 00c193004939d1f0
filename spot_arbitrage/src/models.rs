use crate::error::{ArbitrageError, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<FixedOffset>,
    pub region: String,
    pub price: f64, // $/MWh
    pub demand: Option<f64>,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<FixedOffset>, region: impl Into<String>, price: f64) -> Self {
        Self {
            timestamp,
            region: region.into(),
            price,
            demand: None,
        }
    }

    pub fn with_demand(mut self, demand: f64) -> Self {
        self.demand = Some(demand);
        self
    }
}

/// Time-ordered samples for a single region.
///
/// Ordering is the loader's responsibility; nothing here re-sorts or checks it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    samples: Vec<PriceSample>,
}

impl PriceSeries {
    pub fn new(samples: Vec<PriceSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[PriceSample] {
        &self.samples
    }

    pub fn prices(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.price).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Region of the first sample, if any.
    pub fn region(&self) -> Option<&str> {
        self.samples.first().map(|s| s.region.as_str())
    }

    /// Each sample covers one interval, so the series spans `len * interval_hours`.
    pub fn duration_hours(&self, interval_hours: f64) -> f64 {
        self.samples.len() as f64 * interval_hours
    }

    pub fn into_samples(self) -> Vec<PriceSample> {
        self.samples
    }
}

impl From<Vec<PriceSample>> for PriceSeries {
    fn from(samples: Vec<PriceSample>) -> Self {
        Self::new(samples)
    }
}

/// How a price cutoff is specified before it is resolved against a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSpec {
    Absolute(f64),
    Quantile(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Threshold(pub f64);

impl Threshold {
    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeReport {
    pub threshold: Threshold,
    pub spikes: Vec<PriceSample>,
    pub count: usize,
    /// `None` when no sample exceeded the threshold.
    pub max_price: Option<f64>,
    /// `None` when no sample exceeded the threshold.
    pub mean_spike_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub count: usize,
    pub mean_price: f64,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub std_price: f64,
    pub coeff_var: Option<f64>,
    pub mean_demand: Option<f64>,
    pub max_demand: Option<f64>,
}

/// Where the round-trip loss is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EfficiencyModel {
    /// `sqrt(rte)` lost on the charge leg and again on the discharge leg.
    #[default]
    Symmetric,
    /// Charging is lossless; the full `rte` is applied to energy drawn on discharge.
    DischargeOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryConfig {
    pub capacity_mwh: f64,
    pub power_mw: f64,
    pub round_trip_efficiency: f64,
    pub low_quantile: f64,
    pub high_quantile: f64,
    pub interval_hours: f64,
    #[serde(default)]
    pub efficiency_model: EfficiencyModel,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_mwh: 1.0,
            power_mw: 1.0,
            round_trip_efficiency: 0.9,
            low_quantile: 0.25,
            high_quantile: 0.75,
            interval_hours: 1.0,
            efficiency_model: EfficiencyModel::Symmetric,
        }
    }
}

impl BatteryConfig {
    pub fn new(
        capacity_mwh: f64,
        power_mw: f64,
        round_trip_efficiency: f64,
        low_quantile: f64,
        high_quantile: f64,
        interval_hours: f64,
    ) -> Result<Self> {
        let config = Self {
            capacity_mwh,
            power_mw,
            round_trip_efficiency,
            low_quantile,
            high_quantile,
            interval_hours,
            efficiency_model: EfficiencyModel::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_efficiency_model(mut self, model: EfficiencyModel) -> Self {
        self.efficiency_model = model;
        self
    }

    /// Checks every parameter. Comparisons are written so NaN fails them.
    pub fn validate(&self) -> Result<()> {
        if !(self.capacity_mwh > 0.0 && self.capacity_mwh.is_finite()) {
            return Err(invalid(format!("capacity_mwh must be > 0, got {}", self.capacity_mwh)));
        }
        if !(self.power_mw > 0.0 && self.power_mw.is_finite()) {
            return Err(invalid(format!("power_mw must be > 0, got {}", self.power_mw)));
        }
        if !(self.interval_hours > 0.0 && self.interval_hours.is_finite()) {
            return Err(invalid(format!(
                "interval_hours must be > 0, got {}",
                self.interval_hours
            )));
        }
        if !(self.round_trip_efficiency > 0.0 && self.round_trip_efficiency <= 1.0) {
            return Err(invalid(format!(
                "round_trip_efficiency must be in (0, 1], got {}",
                self.round_trip_efficiency
            )));
        }
        if !(self.low_quantile >= 0.0 && self.low_quantile < 1.0) {
            return Err(invalid(format!(
                "low_quantile must be in [0, 1), got {}",
                self.low_quantile
            )));
        }
        if !(self.high_quantile > 0.0 && self.high_quantile <= 1.0) {
            return Err(invalid(format!(
                "high_quantile must be in (0, 1], got {}",
                self.high_quantile
            )));
        }
        if self.low_quantile >= self.high_quantile {
            return Err(invalid(format!(
                "low_quantile ({}) must be below high_quantile ({})",
                self.low_quantile, self.high_quantile
            )));
        }
        Ok(())
    }

    /// Energy that can cross the grid connection in one interval.
    pub fn max_step_energy_mwh(&self) -> f64 {
        self.power_mw * self.interval_hours
    }

    pub fn one_way_efficiency(&self) -> f64 {
        self.round_trip_efficiency.sqrt()
    }
}

fn invalid(msg: String) -> ArbitrageError {
    ArbitrageError::InvalidConfig(msg)
}

/// Mutable state of one backtest run. Never shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    pub state_of_charge_mwh: f64,
    pub cumulative_profit: f64,
    pub charge_cycles: u64,
    pub discharge_cycles: u64,
    /// Grid-side energy bought.
    pub energy_charged_mwh: f64,
    /// Grid-side energy sold.
    pub energy_discharged_mwh: f64,
    pub hours_at_full: f64,
    pub hours_empty: f64,
}

impl BatteryState {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchCutoffs {
    pub low: Threshold,
    pub high: Threshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub region: Option<String>,
    pub config: BatteryConfig,
    pub final_state: BatteryState,
    /// `None` when the series was empty and no cutoffs could be resolved.
    pub cutoffs: Option<DispatchCutoffs>,
    pub interval_hours: f64,
    pub series_duration_hours: f64,

    pub total_profit: f64,
    pub cycles: u64,
    pub equivalent_full_cycles: f64,
    pub capacity_factor: f64,
    pub hours_at_full: f64,
    pub hours_empty: f64,
}

impl BacktestResult {
    pub fn low_cutoff(&self) -> Option<f64> {
        self.cutoffs.map(|c| c.low.value())
    }

    pub fn high_cutoff(&self) -> Option<f64> {
        self.cutoffs.map(|c| c.high.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_equal_quantiles() {
        let err = BatteryConfig::new(1.0, 1.0, 0.9, 0.5, 0.5, 1.0).unwrap_err();
        assert!(matches!(err, ArbitrageError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_rejects_bad_parameters() {
        assert!(BatteryConfig::new(0.0, 1.0, 0.9, 0.25, 0.75, 1.0).is_err());
        assert!(BatteryConfig::new(1.0, -1.0, 0.9, 0.25, 0.75, 1.0).is_err());
        assert!(BatteryConfig::new(1.0, 1.0, 0.0, 0.25, 0.75, 1.0).is_err());
        assert!(BatteryConfig::new(1.0, 1.0, 1.2, 0.25, 0.75, 1.0).is_err());
        assert!(BatteryConfig::new(1.0, 1.0, 0.9, 0.8, 0.75, 1.0).is_err());
        assert!(BatteryConfig::new(1.0, 1.0, 0.9, 0.25, 0.75, 0.0).is_err());
        assert!(BatteryConfig::new(f64::NAN, 1.0, 0.9, 0.25, 0.75, 1.0).is_err());
    }

    #[test]
    fn test_config_accepts_full_efficiency_and_unit_high_quantile() {
        let config = BatteryConfig::new(2.0, 1.0, 1.0, 0.0, 1.0, 0.5).unwrap();
        assert_eq!(config.max_step_energy_mwh(), 0.5);
        assert_eq!(config.one_way_efficiency(), 1.0);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(BatteryConfig::default().validate().is_ok());
    }
}
