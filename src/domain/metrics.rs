//! Performance metrics for equity curves and position statistics.

use serde::{Deserialize, Serialize};

/// Observations per year; the price series has one point per calendar day.
const PERIODS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    /// Most negative `equity / running_peak - 1`; 0 if the curve never falls.
    pub max_drawdown: f64,
    /// Longest run of observations spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
}

impl CurveMetrics {
    /// Metrics over the finite values of `equity`, which starts at 1.0.
    pub fn compute(equity: &[f64]) -> Self {
        let values: Vec<f64> = equity.iter().copied().filter(|v| v.is_finite()).collect();

        let total_return = final_return(&values);

        let periods = values.len().saturating_sub(1) as f64;
        let years = periods / PERIODS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&values);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&values);

        CurveMetrics {
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
        }
    }
}

/// Last finite equity value minus one; 0 for an empty curve.
pub fn final_return(equity: &[f64]) -> f64 {
    equity
        .iter()
        .rev()
        .find(|v| v.is_finite())
        .map(|v| v - 1.0)
        .unwrap_or(0.0)
}

/// Most negative drawdown of `equity`, as a fraction (e.g. -0.25).
/// Non-finite values are skipped.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    compute_drawdown(equity).0
}

fn compute_drawdown(equity: &[f64]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut duration = 0usize;
    let mut max_duration = 0usize;

    for &value in equity.iter().filter(|v| v.is_finite()) {
        if value >= peak {
            peak = value;
            duration = 0;
            continue;
        }
        if peak > 0.0 {
            let dd = value / peak - 1.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
        duration += 1;
        max_duration = max_duration.max(duration);
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(equity: &[f64]) -> (f64, f64) {
    if equity.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let sharpe = if stddev > 0.0 {
        (mean / stddev) * PERIODS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r * r)
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    let sortino = if downside_stddev > 0.0 {
        (mean / downside_stddev) * PERIODS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

/// Distribution of channel positions over a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); 0 for fewer than two values.
    pub std_dev: f64,
}

impl PositionStats {
    /// Welford's single-pass mean / variance over the defined, finite positions.
    pub fn compute(positions: &[Option<f64>]) -> Self {
        let mut count = 0usize;
        let mut mean = 0.0_f64;
        let mut m2 = 0.0_f64;

        for v in positions.iter().flatten().filter(|v| v.is_finite()) {
            count += 1;
            let delta = v - mean;
            mean += delta / count as f64;
            m2 += delta * (v - mean);
        }

        let variance = if count > 1 {
            m2 / (count - 1) as f64
        } else {
            0.0
        };

        PositionStats {
            count,
            mean,
            std_dev: variance.max(0.0).sqrt(),
        }
    }
}
