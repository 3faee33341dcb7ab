//! CLI interface for backtest-lab
//!
//! Provides subcommands for:
//! - `backtest`: Replay recorded events through the crossover strategy
//! - `optimize`: Search strategy parameters with repeated backtests
//! - `config`: Show the effective configuration

mod backtest;
mod optimize;

pub use backtest::BacktestArgs;
pub use optimize::OptimizeArgs;

use crate::config::Config;
use crate::data::InMemoryDataSource;
use crate::strategy::{MovingAverageCrossover, ParameterSet, Strategy};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "backtest-lab")]
#[command(about = "Backtest trading strategies and optimize their parameters")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single backtest
    Backtest(BacktestArgs),
    /// Search for the best strategy parameters
    Optimize(OptimizeArgs),
    /// Show configuration
    Config,
}

/// Result output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date (UTC midnight) to epoch ms
pub fn parse_time(value: &str) -> anyhow::Result<i64> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid time '{value}', expected RFC 3339 or YYYY-MM-DD"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid date '{value}'"))?;
    Ok(Utc.from_utc_datetime(&midnight).timestamp_millis())
}

/// Format epoch ms as RFC 3339, or the raw value when out of range
pub fn format_time(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

/// Load the event file named on the command line or in the config
pub(crate) fn load_events(
    config: &Config,
    events: Option<&Path>,
) -> anyhow::Result<Arc<InMemoryDataSource>> {
    let path: PathBuf = events
        .map(Path::to_path_buf)
        .or_else(|| config.data.events_path.clone())
        .context("No events file given; pass --events or set data.events_path")?;
    Ok(Arc::new(InMemoryDataSource::from_json_file(path)?))
}

/// Factory for the built-in crossover strategy
///
/// Parameters reach the strategy through `StrategyConfig` at initialization.
pub(crate) fn crossover_factory(_parameters: &ParameterSet) -> Box<dyn Strategy> {
    Box::new(MovingAverageCrossover::new())
}

/// Print the effective configuration
pub fn show_config(config: &Config) {
    let backtest = &config.backtest;
    println!("Current configuration:");
    println!("  Strategy: {} on {}", backtest.strategy_name, backtest.symbol);
    println!(
        "  Window: {} .. {}",
        format_time(backtest.start_time),
        format_time(backtest.end_time)
    );
    println!(
        "  Capital: {}  MaxPos: {}",
        backtest.initial_balance, backtest.max_position_size
    );
    println!(
        "  Fill: slippage={} fee={} cost_basis={:?}",
        backtest.fill.slippage_rate, backtest.fill.fee_rate, backtest.fill.cost_basis
    );
    for (name, value) in &backtest.strategy_parameters {
        println!("  Param {name} = {value}");
    }
    match &config.data.events_path {
        Some(path) => println!("  Events: {}", path.display()),
        None => println!("  Events: (none)"),
    }
    println!(
        "  Optimizer: {:?} target={}",
        config.optimizer.method,
        config.optimizer.optimization_target()
    );
    for (name, range) in &config.optimizer.ranges {
        println!("  Range {name} = [{}, {}]", range.min, range.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_rfc3339() {
        assert_eq!(parse_time("1970-01-01T00:00:01Z").unwrap(), 1_000);
        assert_eq!(
            parse_time("2024-01-01T00:00:00+01:00").unwrap(),
            parse_time("2023-12-31T23:00:00Z").unwrap()
        );
    }

    #[test]
    fn test_parse_time_date_only() {
        assert_eq!(parse_time("1970-01-02").unwrap(), 86_400_000);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(format_time(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn test_cli_parses_optimize_method() {
        let cli = Cli::parse_from(["backtest-lab", "optimize", "--method", "bayesian"]);
        match cli.command {
            Commands::Optimize(args) => {
                assert_eq!(args.method, Some(crate::config::OptimizerMethod::Bayesian))
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_load_events_requires_path() {
        assert!(load_events(&Config::default(), None).is_err());
    }
}
