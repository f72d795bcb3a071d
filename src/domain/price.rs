//! Daily price observations and the validated history the pipeline runs on.

use chrono::NaiveDate;

use super::error::PowerbandError;

pub const MIN_PRICE_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// An ordered, validated sequence of daily closes.
///
/// Construction enforces strictly increasing dates, finite positive prices and
/// at least [`MIN_PRICE_POINTS`] observations. Gaps between dates are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    points: Vec<PricePoint>,
}

impl PriceHistory {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, PowerbandError> {
        if points.len() < MIN_PRICE_POINTS {
            return Err(PowerbandError::InsufficientData {
                points: points.len(),
                minimum: MIN_PRICE_POINTS,
            });
        }

        for (i, point) in points.iter().enumerate() {
            if !point.close.is_finite() || point.close <= 0.0 {
                return Err(PowerbandError::InvalidPrice {
                    date: point.date,
                    price: point.close,
                });
            }
            if i > 0 && points[i - 1].date >= point.date {
                return Err(PowerbandError::NonMonotonicDates {
                    previous: points[i - 1].date,
                    date: point.date,
                });
            }
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }
}

/// Index of the first date on or after `start`, if any.
pub fn start_index_for(dates: &[NaiveDate], start: NaiveDate) -> Option<usize> {
    dates.iter().position(|d| *d >= start)
}
