use crate::error::Result;
use crate::models::{
    BacktestResult, BatteryConfig, BatteryState, DispatchCutoffs, EfficiencyModel, PriceSeries,
    ThresholdSpec,
};
use crate::reporter::summarize;
use crate::threshold::resolve_threshold;
use rayon::prelude::*;

/// What the battery did in one interval. Energies are in MWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepAction {
    Charge { grid_mwh: f64, stored_mwh: f64 },
    Discharge { drawn_mwh: f64, delivered_mwh: f64 },
    Hold,
}

/// Myopic quantile strategy: charge at or below the low cutoff, discharge at or
/// above the high cutoff. Cutoffs are fixed for the whole series.
#[derive(Debug, Clone)]
pub struct BatterySimulator {
    config: BatteryConfig,
}

impl BatterySimulator {
    pub fn new(config: BatteryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatteryConfig {
        &self.config
    }

    /// Resolve both dispatch cutoffs once from the full price distribution.
    pub fn cutoffs(&self, prices: &[f64]) -> Result<DispatchCutoffs> {
        let low = resolve_threshold(prices, ThresholdSpec::Quantile(self.config.low_quantile))?;
        let high = resolve_threshold(prices, ThresholdSpec::Quantile(self.config.high_quantile))?;

        if low >= high {
            log::warn!(
                "degenerate cutoffs: low {:.2} >= high {:.2}; charging takes precedence",
                low.value(),
                high.value()
            );
        }

        Ok(DispatchCutoffs { low, high })
    }

    /// Advance `state` by one interval at `price`.
    pub fn step(&self, state: &mut BatteryState, price: f64, cutoffs: DispatchCutoffs) -> StepAction {
        let capacity = self.config.capacity_mwh;
        let max_step = self.config.max_step_energy_mwh();
        let (charge_leg, discharge_leg) = self.leg_efficiencies();

        // The guards keep headroom and charge positive, so each branch always moves energy
        let action = if price <= cutoffs.low.value() && state.state_of_charge_mwh < capacity {
            let headroom = capacity - state.state_of_charge_mwh;
            let stored = (max_step * charge_leg).min(headroom);
            let grid = stored / charge_leg;
            state.state_of_charge_mwh = if stored >= headroom {
                capacity
            } else {
                (state.state_of_charge_mwh + stored).min(capacity)
            };
            state.cumulative_profit -= grid * price;
            state.energy_charged_mwh += grid;
            state.charge_cycles += 1;
            StepAction::Charge {
                grid_mwh: grid,
                stored_mwh: stored,
            }
        } else if price >= cutoffs.high.value() && state.state_of_charge_mwh > 0.0 {
            let draw_limit = match self.config.efficiency_model {
                EfficiencyModel::Symmetric => max_step / discharge_leg,
                EfficiencyModel::DischargeOnly => max_step,
            };
            let drawn = draw_limit.min(state.state_of_charge_mwh);
            let delivered = drawn * discharge_leg;
            state.state_of_charge_mwh = if drawn >= state.state_of_charge_mwh {
                0.0
            } else {
                (state.state_of_charge_mwh - drawn).max(0.0)
            };
            state.cumulative_profit += delivered * price;
            state.energy_discharged_mwh += delivered;
            state.discharge_cycles += 1;
            StepAction::Discharge {
                drawn_mwh: drawn,
                delivered_mwh: delivered,
            }
        } else {
            StepAction::Hold
        };

        if state.state_of_charge_mwh >= capacity {
            state.hours_at_full += self.config.interval_hours;
        } else if state.state_of_charge_mwh <= 0.0 {
            state.hours_empty += self.config.interval_hours;
        }

        action
    }

    /// Fold the series through `step`, starting from an empty battery.
    pub fn simulate(&self, series: &PriceSeries) -> Result<(BatteryState, Option<DispatchCutoffs>)> {
        let mut state = BatteryState::empty();
        if series.is_empty() {
            return Ok((state, None));
        }

        let cutoffs = self.cutoffs(&series.prices())?;
        for sample in series.samples() {
            self.step(&mut state, sample.price, cutoffs);
        }

        Ok((state, Some(cutoffs)))
    }

    pub fn run(&self, series: &PriceSeries) -> Result<BacktestResult> {
        let (state, cutoffs) = self.simulate(series)?;
        let duration = series.duration_hours(self.config.interval_hours);

        let mut result = summarize(state, &self.config, duration);
        result.region = series.region().map(str::to_string);
        result.cutoffs = cutoffs;

        log::debug!(
            "backtest {}: {} samples, profit {:.2}, {} cycles",
            result.region.as_deref().unwrap_or("-"),
            series.len(),
            result.total_profit,
            result.cycles
        );

        Ok(result)
    }

    /// (charge, discharge) multipliers applied to energy crossing each leg.
    fn leg_efficiencies(&self) -> (f64, f64) {
        match self.config.efficiency_model {
            EfficiencyModel::Symmetric => {
                let leg = self.config.one_way_efficiency();
                (leg, leg)
            }
            EfficiencyModel::DischargeOnly => (1.0, self.config.round_trip_efficiency),
        }
    }
}

/// Validate `config`, then run the quantile strategy over `series`.
pub fn run_battery_backtest(series: &PriceSeries, config: BatteryConfig) -> Result<BacktestResult> {
    BatterySimulator::new(config)?.run(series)
}

/// Independent backtests for several single-region series, in parallel.
///
/// Results come back in input order; each run owns its own state.
pub fn backtest_regions(
    series_list: &[PriceSeries],
    config: &BatteryConfig,
) -> Vec<(String, Result<BacktestResult>)> {
    series_list
        .par_iter()
        .map(|series| {
            let region = series.region().unwrap_or_default().to_string();
            (region, run_battery_backtest(series, config.clone()))
        })
        .collect()
}
