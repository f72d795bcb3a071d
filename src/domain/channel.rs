//! Channel pipeline: trend fit → extremum detection → line projection →
//! position normalisation, producing an immutable [`ChannelDataset`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::PowerbandError;
use super::extrema::{detect_extrema, PeakParams};
use super::position::normalize_positions;
use super::price::PriceHistory;
use super::projection::{extend_to_horizon, ChannelLines};
use super::trend::{age_in_days, PowerLaw, DEFAULT_EXPONENT};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub exponent: f64,
    pub genesis: NaiveDate,
    pub peaks: PeakParams,
    pub horizon: NaiveDate,
}

impl ChannelParams {
    pub fn default_genesis() -> NaiveDate {
        NaiveDate::from_ymd_opt(2009, 1, 3).unwrap_or(NaiveDate::MIN)
    }

    pub fn default_horizon() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 12, 31).unwrap_or(NaiveDate::MAX)
    }
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            exponent: DEFAULT_EXPONENT,
            genesis: Self::default_genesis(),
            peaks: PeakParams::default(),
            horizon: Self::default_horizon(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMeta {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub updated_utc: DateTime<Utc>,
}

/// Per-observation series, aligned by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedSeries {
    pub date: Vec<NaiveDate>,
    pub age_days: Vec<i64>,
    pub price: Vec<f64>,
    pub fair: Vec<f64>,
    pub log10_deviation: Vec<f64>,
    /// `None` where the channel is degenerate (peak bound <= trough bound).
    pub position: Vec<Option<f64>>,
}

/// Observed range followed by daily projections up to the horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedSeries {
    pub date: Vec<NaiveDate>,
    pub age_days: Vec<i64>,
    pub fair: Vec<f64>,
    pub peak_line_price: Vec<f64>,
    pub trough_line_price: Vec<f64>,
    pub peak_line_log10: Vec<f64>,
    pub trough_line_log10: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDataset {
    pub meta: ChannelMeta,
    pub trend: PowerLaw,
    pub lines: ChannelLines,
    pub peak_indices: Vec<usize>,
    pub trough_indices: Vec<usize>,
    pub series: ObservedSeries,
    pub extended: ExtendedSeries,
}

impl ChannelDataset {
    pub fn observed_len(&self) -> usize {
        self.series.date.len()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series.date.last().copied()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.series.price.last().copied()
    }

    /// Position on the most recent observed day; `None` if undefined there.
    pub fn last_position(&self) -> Option<f64> {
        self.series.position.last().copied().flatten()
    }

    pub fn last_peak_bound(&self) -> Option<f64> {
        let idx = self.observed_len().checked_sub(1)?;
        self.extended.peak_line_price.get(idx).copied()
    }

    pub fn last_trough_bound(&self) -> Option<f64> {
        let idx = self.observed_len().checked_sub(1)?;
        self.extended.trough_line_price.get(idx).copied()
    }
}

/// Run the full channel pipeline over `history`.
///
/// `computed_at` is stamped into the metadata only; the numbers depend solely
/// on `history` and `params`.
pub fn compute_channel(
    history: &PriceHistory,
    params: &ChannelParams,
    computed_at: DateTime<Utc>,
) -> Result<ChannelDataset, PowerbandError> {
    let dates = history.dates();
    let prices = history.closes();
    let age_days = dates
        .iter()
        .map(|&d| age_in_days(params.genesis, d))
        .collect::<Result<Vec<_>, _>>()?;

    let trend = PowerLaw::fit(history, params.genesis, params.exponent)?;
    tracing::debug!(scale = trend.scale, exponent = trend.exponent, "fitted power law");

    let fair: Vec<f64> = age_days.iter().map(|&a| trend.fair_value(a)).collect();
    let log10_deviation: Vec<f64> = prices
        .iter()
        .zip(&fair)
        .map(|(p, f)| (p / f).log10())
        .collect();

    let extrema = detect_extrema(&log10_deviation, &params.peaks)?;
    tracing::debug!(
        peaks = extrema.peaks.len(),
        troughs = extrema.troughs.len(),
        "detected extrema"
    );

    let lines = ChannelLines::fit(&age_days, &log10_deviation, &extrema)?;
    tracing::debug!(
        peak_slope = lines.peak.slope,
        peak_intercept = lines.peak.intercept,
        trough_slope = lines.trough.slope,
        trough_intercept = lines.trough.intercept,
        "fitted channel lines"
    );

    let (ext_dates, ext_ages) = extend_to_horizon(&dates, &age_days, params.horizon);
    let projection = lines.project(&trend, &ext_dates, &ext_ages);

    let n = prices.len();
    let position = normalize_positions(
        &prices,
        &projection.trough_price[..n],
        &projection.peak_price[..n],
    );
    let undefined = position.iter().filter(|p| p.is_none()).count();
    if undefined > 0 {
        tracing::debug!(days = undefined, "channel degenerate on some days");
    }

    Ok(ChannelDataset {
        meta: ChannelMeta {
            start: history.first_date(),
            end: history.last_date(),
            updated_utc: computed_at,
        },
        trend,
        lines,
        peak_indices: extrema.peaks,
        trough_indices: extrema.troughs,
        series: ObservedSeries {
            date: dates,
            age_days,
            price: prices,
            fair,
            log10_deviation,
            position,
        },
        extended: ExtendedSeries {
            date: projection.dates,
            age_days: projection.age_days,
            fair: projection.fair,
            peak_line_price: projection.peak_price,
            trough_line_price: projection.trough_price,
            peak_line_log10: projection.peak_log10,
            trough_line_log10: projection.trough_log10,
        },
    })
}
