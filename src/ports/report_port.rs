//! Result persistence port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::channel::ChannelDataset;
use crate::domain::error::PowerbandError;
use std::path::Path;

/// Port for persisting channel datasets and backtest results.
pub trait ReportPort {
    fn write_channel(&self, dataset: &ChannelDataset, output_path: &Path)
        -> Result<(), PowerbandError>;

    fn write_backtest(
        &self,
        result: &BacktestResult,
        output_path: &Path,
    ) -> Result<(), PowerbandError>;
}
