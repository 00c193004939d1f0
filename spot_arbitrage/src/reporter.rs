use crate::models::{BacktestResult, BatteryConfig, BatteryState};

/// Turn the terminal state of a run into reportable metrics.
///
/// Cutoffs and region are not known here; the simulator fills them in.
pub fn summarize(
    final_state: BatteryState,
    config: &BatteryConfig,
    series_duration_hours: f64,
) -> BacktestResult {
    let max_deliverable = config.power_mw * series_duration_hours;
    let capacity_factor = if max_deliverable > 0.0 {
        final_state.energy_discharged_mwh / max_deliverable
    } else {
        0.0
    };

    BacktestResult {
        region: None,
        config: config.clone(),
        cutoffs: None,
        interval_hours: config.interval_hours,
        series_duration_hours,
        total_profit: final_state.cumulative_profit,
        cycles: final_state.charge_cycles.min(final_state.discharge_cycles),
        equivalent_full_cycles: final_state.energy_discharged_mwh / config.capacity_mwh,
        capacity_factor,
        hours_at_full: final_state.hours_at_full,
        hours_empty: final_state.hours_empty,
        final_state,
    }
}
