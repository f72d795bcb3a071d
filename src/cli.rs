//! CLI definition and dispatch.

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{write_equity_csv, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{run_backtest as run_strategy_backtest, BacktestResult};
use crate::domain::channel::{compute_channel, ChannelDataset, ChannelParams};
use crate::domain::config_validation::{validate_channel_config, validate_strategy_config};
use crate::domain::error::PowerbandError;
use crate::domain::price::PriceHistory;
use crate::domain::strategy::{Ladder, ReentryMode, StrategyConfig};
use crate::domain::triggers::{ladder_hints, next_triggers};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const KNOWN_SECTIONS: [&str; 4] = ["channel", "data", "output", "strategy"];

#[derive(Parser, Debug)]
#[command(
    name = "powerband",
    about = "Power-law valuation channel and rebalancing backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fit the channel and write the dataset as JSON
    Channel {
        #[arg(short, long)]
        config: PathBuf,
        /// Price CSV, overriding [data] csv_path
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Fit the channel, run the strategy and compare it against holding
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        equity_csv: Option<PathBuf>,
        #[command(flatten)]
        overrides: StrategyOverrides,
        #[arg(long)]
        pretty: bool,
    },
    /// Show the latest position, bounds and next trigger levels
    Status {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        overrides: StrategyOverrides,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line replacements for `[strategy]` values.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct StrategyOverrides {
    #[arg(long)]
    pub ladder: Option<Ladder>,
    #[arg(long = "reentry")]
    pub reentry_mode: Option<ReentryMode>,
    #[arg(long)]
    pub sell_start: Option<f64>,
    #[arg(long)]
    pub buy_threshold: Option<f64>,
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
}

impl StrategyOverrides {
    pub fn apply(&self, base: StrategyConfig) -> Result<StrategyConfig, PowerbandError> {
        let config = StrategyConfig {
            ladder: self.ladder.unwrap_or(base.ladder),
            reentry_mode: self.reentry_mode.unwrap_or(base.reentry_mode),
            sell_start: self.sell_start.unwrap_or(base.sell_start),
            buy_threshold: self.buy_threshold.unwrap_or(base.buy_threshold),
            start_date: self.start_date.unwrap_or(base.start_date),
            ..base
        };
        for (key, value) in [
            ("sell_start", config.sell_start),
            ("buy_threshold", config.buy_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(PowerbandError::ConfigInvalid {
                    section: "strategy".to_string(),
                    key: key.to_string(),
                    reason: format!("{key} must be between 0 and 100"),
                });
            }
        }
        Ok(config)
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Channel {
            config,
            input,
            output,
            pretty,
        } => run_channel(&config, input.as_deref(), output.as_deref(), pretty),
        Command::Backtest {
            config,
            input,
            output,
            equity_csv,
            overrides,
            pretty,
        } => run_backtest(
            &config,
            input.as_deref(),
            output.as_deref(),
            equity_csv.as_deref(),
            &overrides,
            pretty,
        ),
        Command::Status {
            config,
            input,
            overrides,
        } => run_status(&config, input.as_deref(), &overrides),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: PowerbandError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Price file from `--input`, falling back to `[data] csv_path`.
pub fn resolve_input(
    input_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, PowerbandError> {
    if let Some(path) = input_override {
        return Ok(path.to_path_buf());
    }
    config
        .get_path("data", "csv_path")
        .ok_or_else(|| PowerbandError::ConfigMissing {
            section: "data".to_string(),
            key: "csv_path".to_string(),
        })
}

/// Output path from the command line, then `[output] <key>`, then `fallback`.
pub fn resolve_output(
    output_override: Option<&Path>,
    config: &dyn ConfigPort,
    key: &str,
    fallback: Option<&str>,
) -> Option<PathBuf> {
    output_override
        .map(Path::to_path_buf)
        .or_else(|| config.get_path("output", key))
        .or_else(|| fallback.map(PathBuf::from))
}

pub fn load_history(data_port: &dyn DataPort) -> Result<PriceHistory, PowerbandError> {
    PriceHistory::new(data_port.fetch_all()?)
}

/// Load prices and fit the channel.
pub fn build_channel(
    data_port: &dyn DataPort,
    params: &ChannelParams,
) -> Result<ChannelDataset, PowerbandError> {
    let history = load_history(data_port)?;
    eprintln!(
        "Loaded {} prices, {} to {}",
        history.len(),
        history.first_date(),
        history.last_date()
    );
    compute_channel(&history, params, Utc::now())
}

fn prepare_channel(
    config: &FileConfigAdapter,
    input_override: Option<&Path>,
) -> Result<ChannelDataset, PowerbandError> {
    let params = validate_channel_config(config)?;
    let input = resolve_input(input_override, config)?;
    eprintln!("Reading prices from {}", input.display());
    let data_port = CsvAdapter::new(input);
    build_channel(&data_port, &params)
}

fn run_channel(
    config_path: &Path,
    input_override: Option<&Path>,
    output_override: Option<&Path>,
    pretty: bool,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // Stage 2: Fit channel
    let dataset = match prepare_channel(&config, input_override) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    print_channel_summary(&dataset);

    // Stage 3: Persist
    let output = resolve_output(output_override, &config, "channel_path", Some("channel.json"))
        .unwrap_or_else(|| PathBuf::from("channel.json"));
    if let Err(e) = JsonReportAdapter::new(pretty).write_channel(&dataset, &output) {
        return fail(e);
    }
    eprintln!("\nChannel written to: {}", output.display());
    ExitCode::SUCCESS
}

fn run_backtest(
    config_path: &Path,
    input_override: Option<&Path>,
    output_override: Option<&Path>,
    equity_override: Option<&Path>,
    overrides: &StrategyOverrides,
    pretty: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let strategy = match validate_strategy_config(&config).and_then(|s| overrides.apply(s)) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 2: Fit channel
    let dataset = match prepare_channel(&config, input_override) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    // Stage 3: Run strategy and simulate
    eprintln!(
        "Running backtest: ladder={}, sell_start={:.1}, re-entry={}, from {}",
        strategy.ladder, strategy.sell_start, strategy.reentry_mode, strategy.start_date
    );
    let result = match run_strategy_backtest(&dataset, &strategy) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_backtest_summary(&result);

    // Stage 4: Persist
    if let Some(output) = resolve_output(output_override, &config, "backtest_path", None) {
        if let Err(e) = JsonReportAdapter::new(pretty).write_backtest(&result, &output) {
            return fail(e);
        }
        eprintln!("\nBacktest written to: {}", output.display());
    }
    if let Some(equity) = resolve_output(equity_override, &config, "equity_csv", None) {
        if let Err(e) = write_equity_csv(&result, &equity) {
            return fail(e);
        }
        eprintln!("Equity curves written to: {}", equity.display());
    }
    ExitCode::SUCCESS
}

fn run_status(
    config_path: &Path,
    input_override: Option<&Path>,
    overrides: &StrategyOverrides,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let strategy = match validate_strategy_config(&config).and_then(|s| overrides.apply(s)) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let dataset = match prepare_channel(&config, input_override) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    for line in status_lines(&dataset, &strategy) {
        println!("{line}");
    }

    // Allocation needs a backtest window; a missing one is not fatal here.
    match run_strategy_backtest(&dataset, &strategy) {
        Ok(result) => {
            if let Some(allocation) = result.last_allocation() {
                println!("Allocation:      {:.1}%", allocation * 100.0);
            }
            match result.last_event {
                Some(event) => println!(
                    "Last change:     {} on {} @ position {:.1}% ({:.1}% -> {:.1}%)",
                    event.action,
                    event.date,
                    event.position,
                    event.previous * 100.0,
                    event.allocation * 100.0
                ),
                None => println!("Last change:     none since {}", strategy.start_date),
            }
        }
        Err(e @ PowerbandError::NoBacktestWindow { .. }) => eprintln!("note: {e}"),
        Err(e) => return fail(e),
    }
    ExitCode::SUCCESS
}

/// Human-readable status of the latest observed day.
pub fn status_lines(dataset: &ChannelDataset, strategy: &StrategyConfig) -> Vec<String> {
    let mut lines = Vec::new();
    let (Some(date), Some(close)) = (dataset.last_date(), dataset.last_close()) else {
        return lines;
    };
    lines.push(format!("Date:            {date}"));
    lines.push(format!("Close:           {close:.2}"));

    let (trough, peak) = (dataset.last_trough_bound(), dataset.last_peak_bound());
    if let (Some(trough), Some(peak)) = (trough, peak) {
        lines.push(format!("Channel:         {trough:.2} .. {peak:.2}"));
    }

    match dataset.last_position() {
        Some(position) => {
            lines.push(format!("Position:        {position:.1}%"));
            lines.push(format!(
                "Hints:           {}",
                ladder_hints(strategy.sell_start, strategy.ladder)
            ));
            if let (Some(trough), Some(peak)) = (trough, peak) {
                let triggers = next_triggers(position, strategy, trough, peak);
                lines.push(format!(
                    "Next sell:       {}{}",
                    triggers.sell,
                    price_suffix(triggers.sell.price())
                ));
                lines.push(format!(
                    "Next buy:        {}{}",
                    triggers.buy,
                    price_suffix(triggers.buy.price())
                ));
            }
        }
        None => lines.push("Position:        undefined (channel bounds crossed)".to_string()),
    }
    lines
}

fn price_suffix(price: Option<f64>) -> String {
    price.map(|p| format!(" (~{p:.2})")).unwrap_or_default()
}

fn print_channel_summary(dataset: &ChannelDataset) {
    eprintln!("\n=== Channel ===");
    eprintln!("Observed:         {} to {}", dataset.meta.start, dataset.meta.end);
    eprintln!("Power-law scale:  {:.6e}", dataset.trend.scale);
    eprintln!(
        "Peaks:            {} (slope {:.3e}/day)",
        dataset.peak_indices.len(),
        dataset.lines.peak.slope
    );
    eprintln!(
        "Troughs:          {} (slope {:.3e}/day)",
        dataset.trough_indices.len(),
        dataset.lines.trough.slope
    );
    match dataset.last_position() {
        Some(p) => eprintln!("Last position:    {:.1}%", p),
        None => eprintln!("Last position:    undefined"),
    }
}

fn print_backtest_summary(result: &BacktestResult) {
    let strategy = result.strategy_metrics();
    let hold = result.hold_metrics();
    let stats = result.position_stats();

    eprintln!("\n=== Backtest ===");
    eprintln!("Window:           {} days from {}", result.dates.len(), result.config.start_date);
    eprintln!("                  Strategy     Hold");
    eprintln!(
        "Total Return:     {:>8.2}%  {:>8.2}%",
        result.strategy_return * 100.0,
        result.hold_return * 100.0
    );
    eprintln!(
        "Annualized:       {:>8.2}%  {:>8.2}%",
        strategy.annualized_return * 100.0,
        hold.annualized_return * 100.0
    );
    eprintln!(
        "Max Drawdown:     {:>8.1}%  {:>8.1}%",
        result.strategy_max_drawdown * 100.0,
        result.hold_max_drawdown * 100.0
    );
    eprintln!(
        "Sharpe Ratio:     {:>9.2}  {:>9.2}",
        strategy.sharpe_ratio, hold.sharpe_ratio
    );
    eprintln!(
        "Sortino Ratio:    {:>9.2}  {:>9.2}",
        strategy.sortino_ratio, hold.sortino_ratio
    );
    eprintln!("Delta:            {:+.2}%", result.performance_delta() * 100.0);
    eprintln!(
        "Positions:        mean {:.1}%, std {:.1}% over {} days",
        stats.mean, stats.std_dev, stats.count
    );
    if result.halted() {
        eprintln!("warning: simulation stopped early on a data gap");
    }
    match &result.last_event {
        Some(event) => eprintln!(
            "Last change:      {} on {} ({:.1}% -> {:.1}%)",
            event.action,
            event.date,
            event.previous * 100.0,
            event.allocation * 100.0
        ),
        None => eprintln!("Last change:      none"),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    for section in config.sections() {
        if !KNOWN_SECTIONS.contains(&section.as_str()) {
            eprintln!("warning: unknown section [{section}]");
        }
    }

    let params = match validate_channel_config(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let strategy = match validate_strategy_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("\nChannel:");
    eprintln!("  exponent:      {}", params.exponent);
    eprintln!("  genesis:       {}", params.genesis);
    eprintln!(
        "  peaks:         prominence {}, distance {}, width {}",
        params.peaks.prominence, params.peaks.distance, params.peaks.width
    );
    eprintln!("  horizon:       {}", params.horizon);
    eprintln!("\nStrategy:");
    eprintln!("  ladder:        {}", strategy.ladder);
    eprintln!("  sell_start:    {}", strategy.sell_start);
    eprintln!("  re-entry:      {}", strategy.reentry_mode);
    if strategy.reentry_mode == ReentryMode::Wait {
        eprintln!("  buy_threshold: {}", strategy.buy_threshold);
    }
    eprintln!("  initial:       {}", strategy.initial_allocation);
    eprintln!("  start_date:    {}", strategy.start_date);

    match config.get_path("data", "csv_path") {
        Some(path) => {
            let data_port = CsvAdapter::new(path.clone());
            match data_port.get_data_range() {
                Ok(Some((first, last, count))) => {
                    eprintln!("\nData: {} prices, {} to {}", count, first, last)
                }
                Ok(None) => eprintln!("\nwarning: {} has no usable prices", path.display()),
                Err(e) => eprintln!("\nwarning: {e}"),
            }
        }
        None => eprintln!("\nnote: no [data] csv_path; pass --input when running"),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_backtest_overrides() {
        let cli = Cli::try_parse_from([
            "powerband",
            "backtest",
            "-c",
            "cfg.ini",
            "--ladder",
            "g2",
            "--reentry",
            "wait",
            "--sell-start",
            "55",
            "--start-date",
            "2020-01-01",
        ])
        .unwrap();
        let Command::Backtest { overrides, .. } = cli.command else {
            panic!("expected backtest command");
        };
        assert_eq!(overrides.ladder, Some(Ladder::Aggressive));
        assert_eq!(overrides.reentry_mode, Some(ReentryMode::Wait));
        assert_eq!(overrides.sell_start, Some(55.0));
        assert_eq!(overrides.start_date, NaiveDate::from_ymd_opt(2020, 1, 1));
    }

    #[test]
    fn rejects_unknown_ladder() {
        let result = Cli::try_parse_from(["powerband", "status", "-c", "x.ini", "--ladder", "steep"]);
        assert!(result.is_err());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = StrategyOverrides {
            sell_start: Some(60.0),
            ..StrategyOverrides::default()
        };
        let base = StrategyConfig::default();
        let applied = overrides.apply(base).unwrap();
        assert_eq!(applied.sell_start, 60.0);
        assert_eq!(applied.ladder, base.ladder);
        assert_eq!(applied.start_date, base.start_date);
    }

    #[test]
    fn overrides_are_range_checked() {
        let overrides = StrategyOverrides {
            buy_threshold: Some(101.0),
            ..StrategyOverrides::default()
        };
        let err = overrides.apply(StrategyConfig::default()).unwrap_err();
        assert!(matches!(err, PowerbandError::ConfigInvalid { key, .. } if key == "buy_threshold"));
    }

    #[test]
    fn input_override_wins_over_config() {
        let config = FileConfigAdapter::from_string("[data]\ncsv_path = a.csv\n").unwrap();
        assert_eq!(resolve_input(Some(Path::new("b.csv")), &config).unwrap(), PathBuf::from("b.csv"));
        assert_eq!(resolve_input(None, &config).unwrap(), PathBuf::from("a.csv"));
    }

    #[test]
    fn missing_input_is_a_config_error() {
        let config = FileConfigAdapter::from_string("[channel]\nexponent = 5.93\n").unwrap();
        let err = resolve_input(None, &config).unwrap_err();
        assert!(matches!(err, PowerbandError::ConfigMissing { key, .. } if key == "csv_path"));
    }

    #[test]
    fn output_resolution_order() {
        let config = FileConfigAdapter::from_string("[output]\nchannel_path = cfg.json\n").unwrap();
        assert_eq!(
            resolve_output(Some(Path::new("cli.json")), &config, "channel_path", Some("d.json")),
            Some(PathBuf::from("cli.json"))
        );
        assert_eq!(
            resolve_output(None, &config, "channel_path", Some("d.json")),
            Some(PathBuf::from("cfg.json"))
        );
        assert_eq!(
            resolve_output(None, &config, "backtest_path", Some("d.json")),
            Some(PathBuf::from("d.json"))
        );
        assert_eq!(resolve_output(None, &config, "equity_csv", None), None);
    }
}
