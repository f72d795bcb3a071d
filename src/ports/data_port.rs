//! Price data access port trait.

use crate::domain::error::PowerbandError;
use crate::domain::price::PricePoint;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily closes in `[start_date, end_date]`, sorted by date.
    fn fetch_prices(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, PowerbandError>;

    /// First date, last date and number of usable points, or `None` when empty.
    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PowerbandError>;

    /// Every available close.
    fn fetch_all(&self) -> Result<Vec<PricePoint>, PowerbandError> {
        self.fetch_prices(NaiveDate::MIN, NaiveDate::MAX)
    }
}
