//! Rebalancing strategy driven by the channel position.
//!
//! The only state is the current allocation fraction. Each day:
//! - undefined position: hold;
//! - position >= sell_start: allocation = min(current, ladder(position)),
//!   so it can only fall while in the sell regime;
//! - position < sell_start: re-enter according to [`ReentryMode`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Allocation changes at or below this magnitude count as no change.
pub const CHANGE_EPSILON: f64 = 1e-12;

/// Shape of the sell ladder over the sell regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ladder {
    /// 1 - x²
    Soft,
    /// 1 - x
    Linear,
    /// (1 - x)²
    Aggressive,
}

impl Ladder {
    /// Allocation at normalized depth `x` into the sell regime.
    pub fn value(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Ladder::Soft => 1.0 - x * x,
            Ladder::Linear => 1.0 - x,
            Ladder::Aggressive => (1.0 - x) * (1.0 - x),
        }
    }
}

impl fmt::Display for Ladder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ladder::Soft => write!(f, "soft"),
            Ladder::Linear => write!(f, "linear"),
            Ladder::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for Ladder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "soft" | "g0" => Ok(Ladder::Soft),
            "linear" | "g1" => Ok(Ladder::Linear),
            "aggressive" | "g2" => Ok(Ladder::Aggressive),
            other => Err(format!(
                "unknown ladder '{other}' (expected soft, linear or aggressive)"
            )),
        }
    }
}

/// How allocation returns toward full exposure below sell_start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReentryMode {
    Instant,
    Wait,
    Gradual,
}

impl fmt::Display for ReentryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReentryMode::Instant => write!(f, "instant"),
            ReentryMode::Wait => write!(f, "wait"),
            ReentryMode::Gradual => write!(f, "gradual"),
        }
    }
}

impl FromStr for ReentryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instant" => Ok(ReentryMode::Instant),
            "wait" => Ok(ReentryMode::Wait),
            "gradual" => Ok(ReentryMode::Gradual),
            other => Err(format!(
                "unknown re-entry mode '{other}' (expected instant, wait or gradual)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub ladder: Ladder,
    pub sell_start: f64,
    pub buy_threshold: f64,
    pub reentry_mode: ReentryMode,
    pub initial_allocation: f64,
    pub start_date: NaiveDate,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            ladder: Ladder::Linear,
            sell_start: 46.0,
            buy_threshold: 14.0,
            reentry_mode: ReentryMode::Instant,
            initial_allocation: 1.0,
            start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY / REBALANCE UP"),
            Action::Sell => write!(f, "SELL / REBALANCE DOWN"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub allocation: f64,
    pub action: Action,
}

/// The most recent day on which the allocation changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationEvent {
    pub date: NaiveDate,
    pub action: Action,
    pub position: f64,
    pub previous: f64,
    pub allocation: f64,
}

/// One allocation per observed day; `None` before the start index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSeries {
    pub start_index: usize,
    pub allocations: Vec<Option<f64>>,
    pub last_event: Option<AllocationEvent>,
}

/// Ladder allocation for `position`, ignoring the current allocation.
///
/// 1.0 at or below `sell_start` (and for undefined positions), 0.0 at 100.
pub fn sell_weight(position: f64, sell_start: f64, ladder: Ladder) -> f64 {
    if !position.is_finite() || position <= sell_start {
        return 1.0;
    }
    if position >= 100.0 {
        return 0.0;
    }
    let span = 100.0 - sell_start;
    if span <= 0.0 {
        return 0.0;
    }
    ladder.value((position - sell_start) / span)
}

/// Next allocation from `current` given today's `position`.
pub fn target_allocation(current: f64, position: Option<f64>, config: &StrategyConfig) -> f64 {
    let Some(position) = position.filter(|p| p.is_finite()) else {
        return current;
    };

    if position >= config.sell_start {
        return current.min(sell_weight(position, config.sell_start, config.ladder));
    }

    match config.reentry_mode {
        ReentryMode::Instant => 1.0,
        ReentryMode::Wait => {
            if position <= config.buy_threshold {
                1.0
            } else {
                current
            }
        }
        ReentryMode::Gradual => {
            let denom = config.sell_start.max(1e-9);
            let f = ((config.sell_start - position) / denom).clamp(0.0, 1.0);
            let eased = f * f;
            (current + (1.0 - current) * eased).clamp(0.0, 1.0)
        }
    }
}

/// [`target_allocation`] tagged with the direction of the change.
pub fn step(current: f64, position: Option<f64>, config: &StrategyConfig) -> Step {
    let target = target_allocation(current, position, config);
    let delta = target - current;

    if delta.abs() <= CHANGE_EPSILON {
        Step {
            allocation: current,
            action: Action::Hold,
        }
    } else if delta > 0.0 {
        Step {
            allocation: target,
            action: Action::Buy,
        }
    } else {
        Step {
            allocation: target,
            action: Action::Sell,
        }
    }
}

/// Walk the strategy from `start_index` to the end of `positions`.
pub fn compute_allocation_series(
    dates: &[NaiveDate],
    positions: &[Option<f64>],
    config: &StrategyConfig,
    start_index: usize,
) -> AllocationSeries {
    let n = dates.len().min(positions.len());
    let mut allocations = vec![None; n];
    let mut current = config.initial_allocation;
    let mut last_event = None;

    for i in start_index..n {
        let s = step(current, positions[i], config);
        if s.action != Action::Hold {
            last_event = Some(AllocationEvent {
                date: dates[i],
                action: s.action,
                position: positions[i].unwrap_or(f64::NAN),
                previous: current,
                allocation: s.allocation,
            });
        }
        current = s.allocation;
        allocations[i] = Some(current);
    }

    AllocationSeries {
        start_index,
        allocations,
        last_event,
    }
}
