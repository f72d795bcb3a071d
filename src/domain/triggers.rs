//! Forward-looking hints: ladder allocations at reference positions and the
//! next position/price levels at which the strategy would act.

use serde::Serialize;
use std::fmt;

use super::position::price_for_position;
use super::strategy::{sell_weight, Ladder, ReentryMode, StrategyConfig};

/// Ladder allocation, in percent, at positions 50, 70 and 90.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LadderHints {
    pub w50: f64,
    pub w70: f64,
    pub w90: f64,
}

pub fn ladder_hints(sell_start: f64, ladder: Ladder) -> LadderHints {
    let pct = |position: f64| sell_weight(position, sell_start, ladder) * 100.0;
    LadderHints {
        w50: pct(50.0),
        w70: pct(70.0),
        w90: pct(90.0),
    }
}

impl fmt::Display for LadderHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ladder weights @ 50%={:.1}%, 70%={:.1}%, 90%={:.1}%",
            self.w50, self.w70, self.w90
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SellTrigger {
    /// Below sell_start; selling begins once the position reaches it.
    Begins { position: f64, price: Option<f64> },
    /// Already selling; the next reduction happens one point higher.
    Reduces { position: f64, price: Option<f64> },
}

impl SellTrigger {
    pub fn position(&self) -> f64 {
        match self {
            SellTrigger::Begins { position, .. } | SellTrigger::Reduces { position, .. } => {
                *position
            }
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            SellTrigger::Begins { price, .. } | SellTrigger::Reduces { price, .. } => *price,
        }
    }
}

impl fmt::Display for SellTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellTrigger::Begins { position, .. } => write!(f, "SELL begins @ position {position:.1}%"),
            SellTrigger::Reduces { position, .. } => {
                write!(f, "DOWN: lower allocation @ position {position:.1}%")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuyTrigger {
    /// Wait mode: back to full allocation at `position`.
    Threshold { position: f64, price: Option<f64> },
    /// Instant mode: full allocation as soon as the position drops below `sell_start`.
    BelowSellStart { sell_start: f64 },
    /// Gradual mode: allocation rises as the position falls below `sell_start`.
    Gradual { sell_start: f64 },
}

impl BuyTrigger {
    /// Price of the re-entry level; only wait mode has one.
    pub fn price(&self) -> Option<f64> {
        match self {
            BuyTrigger::Threshold { price, .. } => *price,
            _ => None,
        }
    }
}

impl fmt::Display for BuyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuyTrigger::Threshold { position, .. } => {
                write!(f, "RE-ENTRY: 100% @ position {position:.1}%")
            }
            BuyTrigger::BelowSellStart { sell_start } => {
                write!(f, "BUY: below sell start ({sell_start:.1}%) instantly 100%")
            }
            BuyTrigger::Gradual { sell_start } => {
                write!(f, "UP: below sell start ({sell_start:.1}%) gradually")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NextTriggers {
    pub sell: SellTrigger,
    pub buy: BuyTrigger,
}

/// Next trigger levels from the current `position` and the latest channel bounds.
pub fn next_triggers(
    position: f64,
    config: &StrategyConfig,
    trough: f64,
    peak: f64,
) -> NextTriggers {
    let sell = if position < config.sell_start {
        SellTrigger::Begins {
            position: config.sell_start,
            price: price_for_position(config.sell_start, trough, peak),
        }
    } else {
        let next = (position + 1.0).min(100.0);
        SellTrigger::Reduces {
            position: next,
            price: price_for_position(next, trough, peak),
        }
    };

    let buy = match config.reentry_mode {
        ReentryMode::Wait => BuyTrigger::Threshold {
            position: config.buy_threshold,
            price: price_for_position(config.buy_threshold, trough, peak),
        },
        ReentryMode::Instant => BuyTrigger::BelowSellStart {
            sell_start: config.sell_start,
        },
        ReentryMode::Gradual => BuyTrigger::Gradual {
            sell_start: config.sell_start,
        },
    };

    NextTriggers { sell, buy }
}
