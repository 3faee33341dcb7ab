//! Configuration types for backtest-lab

use crate::backtest::BacktestConfig;
use crate::optimize::{
    BayesianConfig, GeneticConfig, GridSearchConfig, OptimizationTarget, ParameterRange,
    ParameterRanges, RandomSearchConfig,
};
use crate::telemetry::LogFormat;
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Market data input
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// JSON array of market events, loaded into memory
    #[serde(default)]
    pub events_path: Option<PathBuf>,
}

/// Search method selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerMethod {
    #[default]
    Grid,
    Genetic,
    Random,
    Bayesian,
}

/// Parameter search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub method: OptimizerMethod,

    /// Fitness metric: sharpe, return, win_rate or profit_factor
    #[serde(default = "default_target")]
    pub target: String,

    /// Bounds per strategy parameter
    #[serde(default)]
    pub ranges: BTreeMap<String, ParameterRange>,

    #[serde(default)]
    pub grid: GridSearchConfig,
    #[serde(default)]
    pub genetic: GeneticConfig,
    #[serde(default)]
    pub random: RandomSearchConfig,
    #[serde(default)]
    pub bayesian: BayesianConfig,
}

fn default_target() -> String {
    "sharpe".to_string()
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: OptimizerMethod::default(),
            target: default_target(),
            ranges: BTreeMap::new(),
            grid: GridSearchConfig::default(),
            genetic: GeneticConfig::default(),
            random: RandomSearchConfig::default(),
            bayesian: BayesianConfig::default(),
        }
    }
}

impl OptimizerConfig {
    /// Parsed fitness metric
    pub fn optimization_target(&self) -> OptimizationTarget {
        OptimizationTarget::parse(&self.target)
    }

    /// Parameter bounds for the optimizer
    pub fn parameter_ranges(&self) -> ParameterRanges {
        self.ranges.clone()
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus exporter port; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}
