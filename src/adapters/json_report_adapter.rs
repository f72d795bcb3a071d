//! JSON persistence for channel datasets and backtest results.
//!
//! Files are written to a sibling temporary path and renamed into place, so a
//! reader never sees a half-written dataset.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::channel::ChannelDataset;
use crate::domain::error::PowerbandError;
use crate::domain::metrics::{CurveMetrics, PositionStats};
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter {
    pretty: bool,
}

/// Backtest result plus the statistics derived from it.
#[derive(Serialize)]
struct BacktestReport<'a> {
    #[serde(flatten)]
    result: &'a BacktestResult,
    performance_delta: f64,
    halted: bool,
    strategy_metrics: CurveMetrics,
    hold_metrics: CurveMetrics,
    position_stats: PositionStats,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn read_channel(path: &Path) -> Result<ChannelDataset, PowerbandError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_json<T: Serialize>(&self, value: &T, output_path: &Path) -> Result<(), PowerbandError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let body = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        let tmp = tmp_path(output_path);
        fs::write(&tmp, body)?;
        fs::rename(&tmp, output_path)?;
        tracing::debug!(path = %output_path.display(), "wrote JSON");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl ReportPort for JsonReportAdapter {
    fn write_channel(
        &self,
        dataset: &ChannelDataset,
        output_path: &Path,
    ) -> Result<(), PowerbandError> {
        self.write_json(dataset, output_path)
    }

    fn write_backtest(
        &self,
        result: &BacktestResult,
        output_path: &Path,
    ) -> Result<(), PowerbandError> {
        let report = BacktestReport {
            result,
            performance_delta: result.performance_delta(),
            halted: result.halted(),
            strategy_metrics: result.strategy_metrics(),
            hold_metrics: result.hold_metrics(),
            position_stats: result.position_stats(),
        };
        self.write_json(&report, output_path)
    }
}
