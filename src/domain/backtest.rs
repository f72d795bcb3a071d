//! Strategy-versus-hold equity simulation.
//!
//! The allocation `w[t]` decided on day `t` is held over `t -> t+1`:
//!
//! hold[t+1]     = hold[t] * r
//! strategy[t+1] = strategy[t] * (w[t] * r + (1 - w[t]))
//!
//! with `r = price[t+1] / price[t]`. The uninvested fraction earns nothing.
//! The first step with a missing price or allocation ends the simulation; the
//! remaining entries stay `None`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::channel::ChannelDataset;
use super::error::PowerbandError;
use super::metrics::{final_return, max_drawdown, CurveMetrics, PositionStats};
use super::price::start_index_for;
use super::strategy::{compute_allocation_series, AllocationEvent, StrategyConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityCurves {
    pub strategy: Vec<Option<f64>>,
    pub hold: Vec<Option<f64>>,
    /// Number of leading entries that were filled before any halt.
    pub filled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: StrategyConfig,
    pub start_index: usize,
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    pub positions: Vec<Option<f64>>,
    pub allocations: Vec<Option<f64>>,
    pub strategy_equity: Vec<Option<f64>>,
    pub hold_equity: Vec<Option<f64>>,
    pub strategy_return: f64,
    pub hold_return: f64,
    pub strategy_max_drawdown: f64,
    pub hold_max_drawdown: f64,
    pub last_event: Option<AllocationEvent>,
}

impl BacktestResult {
    pub fn performance_delta(&self) -> f64 {
        self.strategy_return - self.hold_return
    }

    /// True when a data gap stopped the simulation before the last day.
    pub fn halted(&self) -> bool {
        self.strategy_equity.last().is_some_and(|v| v.is_none())
    }

    pub fn strategy_metrics(&self) -> CurveMetrics {
        CurveMetrics::compute(&defined(&self.strategy_equity))
    }

    pub fn hold_metrics(&self) -> CurveMetrics {
        CurveMetrics::compute(&defined(&self.hold_equity))
    }

    pub fn position_stats(&self) -> PositionStats {
        PositionStats::compute(&self.positions)
    }

    pub fn last_allocation(&self) -> Option<f64> {
        self.allocations.iter().rev().find_map(|a| *a)
    }
}

fn defined(curve: &[Option<f64>]) -> Vec<f64> {
    curve.iter().map_while(|v| *v).collect()
}

/// Compound both curves over aligned `prices` and `allocations`, both of
/// which start at the first day of the backtest window.
pub fn simulate(prices: &[f64], allocations: &[Option<f64>]) -> EquityCurves {
    let n = prices.len().min(allocations.len());
    let mut strategy = vec![None; n];
    let mut hold = vec![None; n];
    if n == 0 {
        return EquityCurves {
            strategy,
            hold,
            filled: 0,
        };
    }

    strategy[0] = Some(1.0);
    hold[0] = Some(1.0);
    let mut strat_eq = 1.0_f64;
    let mut hold_eq = 1.0_f64;
    let mut filled = 1;

    for t in 0..n - 1 {
        let (p0, p1) = (prices[t], prices[t + 1]);
        let Some(w) = allocations[t].filter(|w| w.is_finite()) else {
            tracing::warn!(index = t, "backtest halted: undefined allocation");
            break;
        };
        if !p0.is_finite() || !p1.is_finite() || p0 <= 0.0 {
            tracing::warn!(index = t, "backtest halted: missing price");
            break;
        }

        let asset_return = p1 / p0;
        hold_eq *= asset_return;
        strat_eq *= w * asset_return + (1.0 - w);
        hold[t + 1] = Some(hold_eq);
        strategy[t + 1] = Some(strat_eq);
        filled += 1;
    }

    EquityCurves {
        strategy,
        hold,
        filled,
    }
}

/// Run the strategy over `dataset` from `config.start_date` and simulate it.
pub fn run_backtest(
    dataset: &ChannelDataset,
    config: &StrategyConfig,
) -> Result<BacktestResult, PowerbandError> {
    let dates = &dataset.series.date;
    let start_index = start_index_for(dates, config.start_date)
        .filter(|&i| i + 1 < dates.len())
        .ok_or(PowerbandError::NoBacktestWindow {
            start_date: config.start_date,
        })?;

    let series =
        compute_allocation_series(dates, &dataset.series.position, config, start_index);

    let prices = dataset.series.price[start_index..].to_vec();
    let allocations = series.allocations[start_index..].to_vec();
    let curves = simulate(&prices, &allocations);

    let strategy_values = defined(&curves.strategy);
    let hold_values = defined(&curves.hold);

    tracing::debug!(
        start_index,
        days = prices.len(),
        filled = curves.filled,
        "backtest simulated"
    );

    Ok(BacktestResult {
        config: *config,
        start_index,
        dates: dates[start_index..].to_vec(),
        prices,
        positions: dataset.series.position[start_index..].to_vec(),
        allocations,
        strategy_return: final_return(&strategy_values),
        hold_return: final_return(&hold_values),
        strategy_max_drawdown: max_drawdown(&strategy_values),
        hold_max_drawdown: max_drawdown(&hold_values),
        strategy_equity: curves.strategy,
        hold_equity: curves.hold,
        last_event: series.last_event,
    })
}
