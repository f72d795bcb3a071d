//! Core domain types and numerical pipeline.

pub mod price;
pub mod trend;
pub mod extrema;
pub mod projection;
pub mod position;
pub mod channel;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod triggers;
pub mod config_validation;
pub mod error;
