//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config and price files on disk feeding the channel / backtest commands
//! - Output path resolution and written artefacts
//! - Status report lines
//! - Exit codes for missing or invalid configuration

mod common;

use clap::Parser;
use common::*;
use powerband::adapters::csv_adapter::CsvAdapter;
use powerband::adapters::file_config_adapter::FileConfigAdapter;
use powerband::cli::{self, Cli};
use powerband::domain::backtest::run_backtest;
use powerband::domain::config_validation::{validate_channel_config, validate_strategy_config};
use powerband::domain::strategy::{Ladder, ReentryMode};
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

fn exit_code_is(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}

fn run_args(args: &[&str]) -> ExitCode {
    let mut argv = vec!["powerband"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Temp dir holding a 5000-day synthetic price file and an INI pointing at it.
fn workspace(extra_ini: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let csv = write_prices_csv(dir.path(), &synthetic_points(5000, 0.6));
    let ini = format!("[data]\ncsv_path = {}\n{}", csv.display(), extra_ini);
    let ini_path = write_ini(dir.path(), &ini);
    (dir, ini_path)
}

mod config_on_disk {
    use super::*;

    #[test]
    fn ini_file_builds_typed_configs() {
        let (_dir, ini) = workspace(
            "[channel]\nprominence = 0.25\ndistance = 500\n\n[strategy]\nladder = soft\nreentry_mode = gradual\nsell_start = 55\n",
        );
        let config = FileConfigAdapter::from_file(&ini).unwrap();
        let params = validate_channel_config(&config).unwrap();
        let strategy = validate_strategy_config(&config).unwrap();

        assert_eq!(params.peaks.prominence, 0.25);
        assert_eq!(params.peaks.distance, 500);
        assert_eq!(strategy.ladder, Ladder::Soft);
        assert_eq!(strategy.reentry_mode, ReentryMode::Gradual);
        assert_eq!(strategy.sell_start, 55.0);
    }

    #[test]
    fn configured_csv_feeds_pipeline() {
        let (_dir, ini) = workspace("");
        let config = FileConfigAdapter::from_file(&ini).unwrap();
        let input = cli::resolve_input(None, &config).unwrap();
        let params = validate_channel_config(&config).unwrap();
        let dataset = cli::build_channel(&CsvAdapter::new(input), &params).unwrap();

        assert_eq!(dataset.observed_len(), 5000);
        let strategy = validate_strategy_config(&config).unwrap();
        let result = run_backtest(&dataset, &strategy).unwrap();
        assert!(result.strategy_equity.iter().all(Option::is_some));
    }

    #[test]
    fn status_lines_describe_latest_day() {
        let (_dir, ini) = workspace("[strategy]\nreentry_mode = wait\n");
        let config = FileConfigAdapter::from_file(&ini).unwrap();
        let input = cli::resolve_input(None, &config).unwrap();
        let dataset = cli::build_channel(
            &CsvAdapter::new(input),
            &validate_channel_config(&config).unwrap(),
        )
        .unwrap();
        let strategy = validate_strategy_config(&config).unwrap();

        let lines = cli::status_lines(&dataset, &strategy);
        let text = lines.join("\n");
        assert!(text.contains(&format!("Date:            {}", dataset.last_date().unwrap())));
        assert!(text.contains("Position:"));
        assert!(text.contains("ladder weights @ 50%="));
        assert!(text.contains("Next sell:"));
        assert!(text.contains("RE-ENTRY: 100% @ position 14.0%"));
    }
}

mod commands {
    use super::*;

    #[test]
    fn channel_command_writes_dataset() {
        let (dir, ini) = workspace("");
        let out = dir.path().join("out").join("channel.json");
        let code = run_args(&["channel", "-c", path_str(&ini), "-o", path_str(&out)]);

        assert!(is_success(code));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["series"]["date"].as_array().unwrap().len(), 5000);
    }

    #[test]
    fn channel_command_uses_configured_output() {
        let dir = TempDir::new().unwrap();
        let csv = write_prices_csv(dir.path(), &synthetic_points(5000, 0.6));
        let out = dir.path().join("configured.json");
        let ini = write_ini(
            dir.path(),
            &format!(
                "[data]\ncsv_path = {}\n[output]\nchannel_path = {}\n",
                csv.display(),
                out.display()
            ),
        );

        assert!(is_success(run_args(&["channel", "-c", path_str(&ini)])));
        assert!(out.exists());
    }

    #[test]
    fn backtest_command_writes_json_and_equity_csv() {
        let (dir, ini) = workspace("");
        let json = dir.path().join("backtest.json");
        let equity = dir.path().join("equity.csv");
        let code = run_args(&[
            "backtest",
            "-c",
            path_str(&ini),
            "-o",
            path_str(&json),
            "--equity-csv",
            path_str(&equity),
            "--ladder",
            "aggressive",
            "--start-date",
            "2019-01-01",
        ]);

        assert!(is_success(code));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["config"]["ladder"], "aggressive");
        assert_eq!(value["dates"][0], "2019-01-01");
        assert!(std::fs::read_to_string(&equity).unwrap().starts_with("date,price"));
    }

    #[test]
    fn input_flag_overrides_config() {
        let dir = TempDir::new().unwrap();
        let csv = write_prices_csv(dir.path(), &synthetic_points(5000, 0.6));
        let ini = write_ini(dir.path(), "[data]\ncsv_path = /nonexistent/prices.csv\n");
        let out = dir.path().join("channel.json");

        let code = run_args(&[
            "channel",
            "-c",
            path_str(&ini),
            "-i",
            path_str(&csv),
            "-o",
            path_str(&out),
        ]);
        assert!(is_success(code));
    }

    #[test]
    fn status_command_succeeds() {
        let (_dir, ini) = workspace("");
        assert!(is_success(run_args(&["status", "-c", path_str(&ini)])));
    }

    #[test]
    fn status_without_backtest_window_still_succeeds() {
        let (_dir, ini) = workspace("[strategy]\nstart_date = 2040-01-01\n");
        assert!(is_success(run_args(&["status", "-c", path_str(&ini)])));
    }

    #[test]
    fn validate_command_accepts_defaults() {
        let (_dir, ini) = workspace("");
        assert!(is_success(run_args(&["validate", "-c", path_str(&ini)])));
    }

    #[test]
    fn validate_command_rejects_bad_value() {
        let (_dir, ini) = workspace("[strategy]\nsell_start = 150\n");
        assert!(exit_code_is(run_args(&["validate", "-c", path_str(&ini)]), 2));
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let code = run_args(&["validate", "-c", "/nonexistent/powerband.ini"]);
        assert!(exit_code_is(code, 2));
    }

    #[test]
    fn missing_price_file_is_data_error() {
        let dir = TempDir::new().unwrap();
        let ini = write_ini(dir.path(), "[data]\ncsv_path = /nonexistent/prices.csv\n");
        let out = dir.path().join("channel.json");
        let code = run_args(&["channel", "-c", path_str(&ini), "-o", path_str(&out)]);
        assert!(exit_code_is(code, 3));
        assert!(!out.exists());
    }

    #[test]
    fn short_history_is_degenerate_error() {
        let dir = TempDir::new().unwrap();
        let csv = write_prices_csv(dir.path(), &synthetic_points(800, 0.6));
        let ini = write_ini(dir.path(), &format!("[data]\ncsv_path = {}\n", csv.display()));
        let out = dir.path().join("channel.json");
        let code = run_args(&["channel", "-c", path_str(&ini), "-o", path_str(&out)]);
        assert!(exit_code_is(code, 5));
    }

    #[test]
    fn backtest_window_past_data_is_degenerate_error() {
        let (_dir, ini) = workspace("");
        let code = run_args(&["backtest", "-c", path_str(&ini), "--start-date", "2040-01-01"]);
        assert!(exit_code_is(code, 5));
    }
}
