//! Channel lines through detected extrema and their forward projection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{ExtremumKind, PowerbandError};
use super::extrema::{Extrema, MIN_EXTREMA};
use super::trend::PowerLaw;

/// y = slope * age + intercept, in log10-deviation space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

impl Line {
    /// Ordinary least squares through `(x, y)` pairs.
    ///
    /// Returns `None` for fewer than two points or when every `x` is equal.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return None;
        }

        let nf = n as f64;
        let x_mean = xs[..n].iter().sum::<f64>() / nf;
        let y_mean = ys[..n].iter().sum::<f64>() / nf;

        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (x, y) in xs[..n].iter().zip(&ys[..n]) {
            let dx = x - x_mean;
            sxy += dx * (y - y_mean);
            sxx += dx * dx;
        }
        if sxx == 0.0 {
            return None;
        }

        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }

    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelLines {
    pub peak: Line,
    pub trough: Line,
}

/// Both channel lines evaluated over an age range, in log and price space.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub dates: Vec<NaiveDate>,
    pub age_days: Vec<i64>,
    pub fair: Vec<f64>,
    pub peak_log10: Vec<f64>,
    pub trough_log10: Vec<f64>,
    pub peak_price: Vec<f64>,
    pub trough_price: Vec<f64>,
}

impl ChannelLines {
    /// Fit one line through the peaks and one through the troughs, using
    /// `age_days` as x and `log_deviation` as y at each extremum index.
    pub fn fit(
        age_days: &[i64],
        log_deviation: &[f64],
        extrema: &Extrema,
    ) -> Result<Self, PowerbandError> {
        let peak = fit_through(age_days, log_deviation, &extrema.peaks, ExtremumKind::Peak)?;
        let trough = fit_through(
            age_days,
            log_deviation,
            &extrema.troughs,
            ExtremumKind::Trough,
        )?;
        Ok(Self { peak, trough })
    }

    /// Evaluate both lines at every `(date, age)` pair and convert them back
    /// to prices via the fair-value curve.
    pub fn project(&self, law: &PowerLaw, dates: &[NaiveDate], age_days: &[i64]) -> Projection {
        let n = dates.len().min(age_days.len());
        let mut projection = Projection {
            dates: dates[..n].to_vec(),
            age_days: age_days[..n].to_vec(),
            fair: Vec::with_capacity(n),
            peak_log10: Vec::with_capacity(n),
            trough_log10: Vec::with_capacity(n),
            peak_price: Vec::with_capacity(n),
            trough_price: Vec::with_capacity(n),
        };

        for &age in &age_days[..n] {
            let fair = law.fair_value(age);
            let peak = self.peak.at(age as f64);
            let trough = self.trough.at(age as f64);
            projection.fair.push(fair);
            projection.peak_log10.push(peak);
            projection.trough_log10.push(trough);
            projection.peak_price.push(10f64.powf(peak) * fair);
            projection.trough_price.push(10f64.powf(trough) * fair);
        }

        projection
    }
}

fn fit_through(
    age_days: &[i64],
    log_deviation: &[f64],
    indices: &[usize],
    kind: ExtremumKind,
) -> Result<Line, PowerbandError> {
    let xs: Vec<f64> = indices.iter().map(|&i| age_days[i] as f64).collect();
    let ys: Vec<f64> = indices.iter().map(|&i| log_deviation[i]).collect();
    Line::fit(&xs, &ys).ok_or(PowerbandError::TooFewExtrema {
        kind,
        found: indices.len(),
        minimum: MIN_EXTREMA,
    })
}

/// Observed dates followed by one entry per calendar day after the last
/// observation, up to and including `horizon`.
pub fn extend_to_horizon(
    dates: &[NaiveDate],
    age_days: &[i64],
    horizon: NaiveDate,
) -> (Vec<NaiveDate>, Vec<i64>) {
    let mut ext_dates = dates.to_vec();
    let mut ext_ages = age_days.to_vec();

    if let (Some(&last_date), Some(&last_age)) = (dates.last(), age_days.last()) {
        let extra = (horizon - last_date).num_days().max(0);
        ext_dates.reserve(extra as usize);
        ext_ages.reserve(extra as usize);
        for k in 1..=extra {
            ext_dates.push(last_date + chrono::Duration::days(k));
            ext_ages.push(last_age + k);
        }
    }

    (ext_dates, ext_ages)
}
