#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use powerband::domain::channel::ChannelParams;
use powerband::domain::error::PowerbandError;
pub use powerband::domain::price::PricePoint;
use powerband::domain::trend::DEFAULT_EXPONENT;
use powerband::ports::data_port::DataPort;
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Cycle length of the synthetic series, in days.
pub const CYCLE_DAYS: f64 = 1400.0;
/// Age (days since genesis, genesis = 1) of the first synthetic observation.
pub const FIRST_AGE: i64 = 500;

pub struct MockDataPort {
    pub points: Vec<PricePoint>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self {
            points,
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            points: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, PowerbandError> {
        if let Some(reason) = &self.error {
            return Err(PowerbandError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .points
            .iter()
            .filter(|p| p.date >= start_date && p.date <= end_date)
            .copied()
            .collect())
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PowerbandError> {
        if let Some(reason) = &self.error {
            return Err(PowerbandError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, self.points.len())),
            _ => None,
        })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn stamp() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Daily closes on a power-law trend times a sinusoidal cycle of `amplitude`
/// log10 units, starting [`FIRST_AGE`] days after the default genesis.
///
/// With the default detector settings, `days = 5000` and `amplitude = 0.6`
/// yield peaks at indices 350, 1750, 3150, 4550 and troughs at 1050, 2450, 3850.
pub fn synthetic_points(days: i64, amplitude: f64) -> Vec<PricePoint> {
    let genesis = ChannelParams::default_genesis();
    (0..days)
        .map(|i| {
            let age = FIRST_AGE + i;
            let cycle = amplitude * (2.0 * PI * i as f64 / CYCLE_DAYS).sin();
            let price = 1.0e-17 * (age as f64).powf(DEFAULT_EXPONENT) * 10f64.powf(cycle);
            PricePoint::new(genesis + Duration::days(age - 1), price)
        })
        .collect()
}

pub fn prices_csv(points: &[PricePoint]) -> String {
    let mut out = String::from("date,close\n");
    for p in points {
        writeln!(out, "{},{}", p.date, p.close).unwrap();
    }
    out
}

pub fn write_prices_csv(dir: &Path, points: &[PricePoint]) -> PathBuf {
    let path = dir.join("prices.csv");
    std::fs::write(&path, prices_csv(points)).unwrap();
    path
}

pub fn write_ini(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("powerband.ini");
    std::fs::write(&path, content).unwrap();
    path
}
