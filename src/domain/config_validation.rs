//! Configuration validation.
//!
//! Reads the `[channel]` and `[strategy]` sections into typed parameters,
//! falling back to defaults for absent keys. A key that is present but does not
//! parse, or parses out of range, is an error.

use std::str::FromStr;

use crate::domain::channel::ChannelParams;
use crate::domain::error::PowerbandError;
use crate::domain::extrema::PeakParams;
use crate::domain::strategy::{Ladder, ReentryMode, StrategyConfig};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

const CHANNEL: &str = "channel";
const STRATEGY: &str = "strategy";

pub fn validate_channel_config(config: &dyn ConfigPort) -> Result<ChannelParams, PowerbandError> {
    let defaults = ChannelParams::default();

    let exponent = get_f64(config, CHANNEL, "exponent", defaults.exponent)?;
    if exponent <= 0.0 {
        return Err(invalid(CHANNEL, "exponent", "exponent must be positive"));
    }

    let prominence = get_f64(config, CHANNEL, "prominence", defaults.peaks.prominence)?;
    if prominence < 0.0 {
        return Err(invalid(CHANNEL, "prominence", "prominence must be non-negative"));
    }

    let distance = get_parsed::<i64>(config, CHANNEL, "distance", defaults.peaks.distance as i64)?;
    if distance < 1 {
        return Err(invalid(CHANNEL, "distance", "distance must be at least 1"));
    }

    let width = get_f64(config, CHANNEL, "width", defaults.peaks.width)?;
    if width < 0.0 {
        return Err(invalid(CHANNEL, "width", "width must be non-negative"));
    }

    let genesis = get_date(config, CHANNEL, "genesis_date", defaults.genesis)?;
    let horizon = get_date(config, CHANNEL, "horizon_date", defaults.horizon)?;
    if horizon <= genesis {
        return Err(invalid(
            CHANNEL,
            "horizon_date",
            "horizon_date must be after genesis_date",
        ));
    }

    Ok(ChannelParams {
        exponent,
        genesis,
        peaks: PeakParams {
            prominence,
            distance: distance as usize,
            width,
        },
        horizon,
    })
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, PowerbandError> {
    let defaults = StrategyConfig::default();

    let ladder = get_named::<Ladder>(config, STRATEGY, "ladder", defaults.ladder)?;
    let reentry_mode =
        get_named::<ReentryMode>(config, STRATEGY, "reentry_mode", defaults.reentry_mode)?;

    let sell_start = get_f64(config, STRATEGY, "sell_start", defaults.sell_start)?;
    check_percent(sell_start, "sell_start")?;

    let buy_threshold = get_f64(config, STRATEGY, "buy_threshold", defaults.buy_threshold)?;
    check_percent(buy_threshold, "buy_threshold")?;

    let initial_allocation = get_f64(
        config,
        STRATEGY,
        "initial_allocation",
        defaults.initial_allocation,
    )?;
    if !(0.0..=1.0).contains(&initial_allocation) {
        return Err(invalid(
            STRATEGY,
            "initial_allocation",
            "initial_allocation must be between 0 and 1",
        ));
    }

    let start_date = get_date(config, STRATEGY, "start_date", defaults.start_date)?;

    Ok(StrategyConfig {
        ladder,
        sell_start,
        buy_threshold,
        reentry_mode,
        initial_allocation,
        start_date,
    })
}

/// Parse a `YYYY-MM-DD` date as used throughout the config and CLI.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn check_percent(value: f64, key: &str) -> Result<(), PowerbandError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid(
            STRATEGY,
            key,
            &format!("{key} must be between 0 and 100"),
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> PowerbandError {
    PowerbandError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn get_parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, PowerbandError> {
    match present(config, section, key) {
        None => Ok(default),
        Some(s) => s
            .parse::<T>()
            .map_err(|_| invalid(section, key, &format!("'{s}' is not a valid number"))),
    }
}

fn get_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, PowerbandError> {
    let value = get_parsed::<f64>(config, section, key, default)?;
    if !value.is_finite() {
        return Err(invalid(section, key, "value must be finite"));
    }
    Ok(value)
}

fn get_named<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, PowerbandError>
where
    T: FromStr<Err = String>,
{
    match present(config, section, key) {
        None => Ok(default),
        Some(s) => s.parse::<T>().map_err(|reason| invalid(section, key, &reason)),
    }
}

fn get_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: NaiveDate,
) -> Result<NaiveDate, PowerbandError> {
    match present(config, section, key) {
        None => Ok(default),
        Some(s) => parse_date(&s).ok_or_else(|| {
            invalid(
                section,
                key,
                &format!("invalid {key} '{s}', expected YYYY-MM-DD"),
            )
        }),
    }
}
