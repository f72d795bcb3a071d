//! CSV price file adapter and equity curve export.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PowerbandError;
use crate::domain::price::PricePoint;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads a `date,close` file. Column names are matched case-insensitively and
/// other columns are ignored.
pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All usable rows, sorted by date, one per date (the last row wins).
    fn load(&self) -> Result<Vec<PricePoint>, PowerbandError> {
        let content = fs::read_to_string(&self.path).map_err(|e| PowerbandError::DataSource {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr.headers().map_err(|e| PowerbandError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?;
        let date_col = column(headers, "date")?;
        let close_col = column(headers, "close")?;

        let mut by_date = BTreeMap::new();
        let mut dropped = 0usize;

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| PowerbandError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_col).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                PowerbandError::DataSource {
                    reason: format!("invalid date '{}' on row {}: {}", date_str, row + 1, e),
                }
            })?;

            let close = record
                .get(close_col)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|c| c.is_finite() && *c > 0.0);

            match close {
                Some(close) => {
                    by_date.insert(date, close);
                }
                None => {
                    dropped += 1;
                    tracing::warn!(%date, row = row + 1, "dropping row without a positive close");
                }
            }
        }

        if dropped > 0 {
            tracing::warn!(dropped, path = %self.path.display(), "rows dropped while loading prices");
        }

        Ok(by_date
            .into_iter()
            .map(|(date, close)| PricePoint::new(date, close))
            .collect())
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize, PowerbandError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| PowerbandError::DataSource {
            reason: format!("missing {} column", name),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, PowerbandError> {
        let mut points = self.load()?;
        points.retain(|p| p.date >= start_date && p.date <= end_date);
        Ok(points)
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PowerbandError> {
        let points = self.load()?;
        Ok(match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, points.len())),
            _ => None,
        })
    }
}

#[derive(Serialize)]
struct EquityRow {
    date: NaiveDate,
    price: f64,
    allocation: Option<f64>,
    strategy_equity: Option<f64>,
    hold_equity: Option<f64>,
}

/// Write the backtest window as `date,price,allocation,strategy_equity,hold_equity`.
/// Undefined values are left empty.
pub fn write_equity_csv(result: &BacktestResult, path: &Path) -> Result<(), PowerbandError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path).map_err(csv_io)?;
    for (i, &date) in result.dates.iter().enumerate() {
        wtr.serialize(EquityRow {
            date,
            price: result.prices[i],
            allocation: result.allocations.get(i).copied().flatten(),
            strategy_equity: result.strategy_equity.get(i).copied().flatten(),
            hold_equity: result.hold_equity.get(i).copied().flatten(),
        })
        .map_err(csv_io)?;
    }
    wtr.flush()?;
    Ok(())
}

fn csv_io(e: csv::Error) -> PowerbandError {
    PowerbandError::Io(std::io::Error::other(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn write_csv(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn fetch_prices_returns_sorted_points() {
        let (_dir, path) = write_csv(
            "date,close\n\
             2024-01-17,115.0\n\
             2024-01-15,105.0\n\
             2024-01-16,110.0\n",
        );
        let adapter = CsvAdapter::new(path);
        let points = adapter.fetch_all().unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0], PricePoint::new(d(2024, 1, 15), 105.0));
        assert_eq!(points[2], PricePoint::new(d(2024, 1, 17), 115.0));
    }

    #[test]
    fn fetch_prices_filters_by_date() {
        let (_dir, path) = write_csv("date,close\n2024-01-15,1\n2024-01-16,2\n2024-01-17,3\n");
        let adapter = CsvAdapter::new(path);
        let points = adapter.fetch_prices(d(2024, 1, 16), d(2024, 1, 16)).unwrap();
        assert_eq!(points, vec![PricePoint::new(d(2024, 1, 16), 2.0)]);
    }

    #[test]
    fn headers_are_case_insensitive_and_extra_columns_ignored() {
        let (_dir, path) = write_csv("Open,Close,Date\n9,10.5,2024-03-01\n");
        let points = CsvAdapter::new(path).fetch_all().unwrap();
        assert_eq!(points, vec![PricePoint::new(d(2024, 3, 1), 10.5)]);
    }

    #[test]
    fn drops_non_positive_and_unparseable_closes() {
        let (_dir, path) = write_csv(
            "date,close\n\
             2024-01-01,0\n\
             2024-01-02,-5\n\
             2024-01-03,\n\
             2024-01-04,NaN\n\
             2024-01-05,42\n",
        );
        let points = CsvAdapter::new(path).fetch_all().unwrap();
        assert_eq!(points, vec![PricePoint::new(d(2024, 1, 5), 42.0)]);
    }

    #[test]
    fn duplicate_dates_keep_last_row() {
        let (_dir, path) = write_csv("date,close\n2024-01-01,1\n2024-01-01,2\n");
        let points = CsvAdapter::new(path).fetch_all().unwrap();
        assert_eq!(points, vec![PricePoint::new(d(2024, 1, 1), 2.0)]);
    }

    #[test]
    fn invalid_date_is_an_error() {
        let (_dir, path) = write_csv("date,close\n01/02/2024,1\n");
        let err = CsvAdapter::new(path).fetch_all().unwrap_err();
        assert!(matches!(err, PowerbandError::DataSource { .. }));
    }

    #[test]
    fn missing_close_column_is_an_error() {
        let (_dir, path) = write_csv("date,price\n2024-01-01,1\n");
        let err = CsvAdapter::new(path).fetch_all().unwrap_err();
        assert!(matches!(err, PowerbandError::DataSource { reason } if reason.contains("close")));
    }

    #[test]
    fn missing_file_is_an_error() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/prices.csv"));
        assert!(matches!(adapter.fetch_all(), Err(PowerbandError::DataSource { .. })));
    }

    #[test]
    fn data_range_reports_span_and_count() {
        let (_dir, path) = write_csv("date,close\n2024-01-03,3\n2024-01-01,1\n2024-01-02,0\n");
        let range = CsvAdapter::new(path).get_data_range().unwrap();
        assert_eq!(range, Some((d(2024, 1, 1), d(2024, 1, 3), 2)));
    }

    #[test]
    fn data_range_of_empty_file_is_none() {
        let (_dir, path) = write_csv("date,close\n");
        assert_eq!(CsvAdapter::new(path).get_data_range().unwrap(), None);
    }
}
