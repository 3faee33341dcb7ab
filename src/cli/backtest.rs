//! Backtest command implementation

use super::{crossover_factory, load_events, parse_time, OutputFormat};
use crate::backtest::BacktestEngine;
use crate::config::Config;
use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// JSON file of market events (overrides data.events_path)
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Symbol to replay
    #[arg(long)]
    pub symbol: Option<String>,

    /// Start time filter (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// End time filter, exclusive (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Initial capital
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Strategy parameter override, repeatable (e.g. --param fast_period=8)
    #[arg(long = "param", value_parser = parse_parameter)]
    pub params: Vec<(String, f64)>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Also write the full result as JSON to this file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Parse `name=value`
pub(crate) fn parse_parameter(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for '{name}': {e}"))?;
    Ok((name.trim().to_string(), value))
}

impl BacktestArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut backtest = config.backtest.clone();
        if let Some(symbol) = &self.symbol {
            backtest.symbol = symbol.clone();
        }
        if let Some(start) = &self.start {
            backtest.start_time = parse_time(start)?;
        }
        if let Some(end) = &self.end {
            backtest.end_time = parse_time(end)?;
        }
        if let Some(capital) = self.capital {
            backtest.initial_balance = capital;
        }
        backtest
            .strategy_parameters
            .extend(self.params.iter().cloned());

        let source = load_events(config, self.events.as_deref())?;
        tracing::info!(
            symbol = %backtest.symbol,
            events = source.len(),
            parameters = ?backtest.strategy_parameters,
            "Running backtest"
        );

        let mut engine = BacktestEngine::new();
        engine.initialize(backtest.clone());
        engine.set_data_source(source);
        engine.set_strategy(crossover_factory(&backtest.strategy_parameters));
        let mut next_report = 0.1;
        engine.set_progress_callback(move |progress| {
            if progress >= next_report {
                tracing::debug!(progress = format!("{:.0}%", progress * 100.0), "Backtest progress");
                next_report += 0.1;
            }
        });

        let result = engine.run().await?;

        match self.format {
            OutputFormat::Table => println!("{}", result.format_table()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        }

        if let Some(path) = &self.output {
            std::fs::write(path, serde_json::to_string_pretty(&result)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Result written");
        }

        Ok(())
    }
}
