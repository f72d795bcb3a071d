//! Domain error types.

use chrono::NaiveDate;
use std::fmt;

/// Which side of the channel an extremum belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremumKind {
    Peak,
    Trough,
}

impl fmt::Display for ExtremumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtremumKind::Peak => write!(f, "peaks"),
            ExtremumKind::Trough => write!(f, "troughs"),
        }
    }
}

/// Top-level error type for powerband.
#[derive(Debug, thiserror::Error)]
pub enum PowerbandError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("invalid price {price} on {date}: prices must be finite and positive")]
    InvalidPrice { date: NaiveDate, price: f64 },

    #[error("dates must be strictly increasing: {date} follows {previous}")]
    NonMonotonicDates { previous: NaiveDate, date: NaiveDate },

    #[error("insufficient data: have {points} points, need {minimum}")]
    InsufficientData { points: usize, minimum: usize },

    #[error("observation on {date} precedes the epoch {genesis}")]
    BeforeEpoch { date: NaiveDate, genesis: NaiveDate },

    #[error("found {found} {kind}, need at least {minimum} to fit a channel line")]
    TooFewExtrema {
        kind: ExtremumKind,
        found: usize,
        minimum: usize,
    },

    #[error("no backtest window starting {start_date}: need at least two observations on or after it")]
    NoBacktestWindow { start_date: NaiveDate },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PowerbandError> for std::process::ExitCode {
    fn from(err: &PowerbandError) -> Self {
        let code: u8 = match err {
            PowerbandError::Io(_) | PowerbandError::Json(_) => 1,
            PowerbandError::ConfigParse { .. }
            | PowerbandError::ConfigMissing { .. }
            | PowerbandError::ConfigInvalid { .. } => 2,
            PowerbandError::DataSource { .. } => 3,
            PowerbandError::InvalidPrice { .. }
            | PowerbandError::NonMonotonicDates { .. }
            | PowerbandError::BeforeEpoch { .. } => 4,
            PowerbandError::InsufficientData { .. }
            | PowerbandError::TooFewExtrema { .. }
            | PowerbandError::NoBacktestWindow { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
