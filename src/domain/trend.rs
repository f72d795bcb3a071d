//! Power-law fair-value trend.
//!
//! fair(age) = scale * age^exponent, with `age` counted in days since the
//! epoch (the epoch day itself is day 1). The exponent is fixed up front; only
//! the scale is fitted, as the mean intercept in log10-log10 space:
//!
//! log10(scale) = mean(log10(price[i]) - exponent * log10(age[i]))

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::PowerbandError;
use super::price::PriceHistory;

pub const DEFAULT_EXPONENT: f64 = 5.93;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLaw {
    pub exponent: f64,
    pub scale: f64,
}

impl PowerLaw {
    /// Fit the scale constant to `history` with the exponent held fixed.
    pub fn fit(
        history: &PriceHistory,
        genesis: NaiveDate,
        exponent: f64,
    ) -> Result<Self, PowerbandError> {
        let mut sum = 0.0_f64;
        for point in history.points() {
            let age = age_in_days(genesis, point.date)?;
            sum += point.close.log10() - exponent * (age as f64).log10();
        }
        let log_scale = sum / history.len() as f64;

        Ok(Self {
            exponent,
            scale: 10f64.powf(log_scale),
        })
    }

    pub fn fair_value(&self, age_days: i64) -> f64 {
        self.scale * (age_days as f64).powf(self.exponent)
    }

    /// log10(price / fair(age))
    pub fn log_deviation(&self, age_days: i64, price: f64) -> f64 {
        (price / self.fair_value(age_days)).log10()
    }
}

/// Days since `genesis`, counting the genesis day as 1.
pub fn age_in_days(genesis: NaiveDate, date: NaiveDate) -> Result<i64, PowerbandError> {
    let age = (date - genesis).num_days() + 1;
    if age < 1 {
        return Err(PowerbandError::BeforeEpoch { date, genesis });
    }
    Ok(age)
}
