pub mod analysis;
pub mod battery;
pub mod error;
pub mod models;
pub mod reporter;
pub mod spikes;
pub mod threshold;

pub use analysis::{compute_summary, estimate_interval_hours, filter_series, hourly_profile, split_by_region};
pub use battery::{backtest_regions, run_battery_backtest, BatterySimulator, StepAction};
pub use error::{ArbitrageError, Result};
pub use models::{
    BacktestResult, BatteryConfig, BatteryState, DispatchCutoffs, EfficiencyModel, PriceSample,
    PriceSeries, PriceSummary, SpikeReport, Threshold, ThresholdSpec,
};
pub use reporter::summarize;
pub use spikes::detect_spikes;
pub use threshold::resolve_threshold;
