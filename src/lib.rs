//! powerband — power-law valuation channel and rebalancing backtester.
//!
//! Hexagonal architecture: numerical pipeline in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`], command dispatch in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
