//! Configuration loading

use backtest_lab::config::{Config, OptimizerMethod};
use backtest_lab::optimize::OptimizationTarget;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.backtest.symbol, "BTCUSDT");
    assert_eq!(config.backtest.initial_balance, dec!(10000));
    assert_eq!(config.backtest.strategy_parameters["fast_period"], 5.0);
    assert_eq!(config.optimizer.method, OptimizerMethod::Grid);
    assert_eq!(config.optimizer.optimization_target(), OptimizationTarget::Sharpe);
    assert_eq!(config.optimizer.ranges.len(), 2);
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_partial_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[backtest]
symbol = "SOLUSDT"

[backtest.fill]
cost_basis = "fifo"

[optimizer]
method = "random"
target = "profit_factor"

[optimizer.random]
max_iterations = 12
seed = 42
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.backtest.symbol, "SOLUSDT");
    assert_eq!(config.backtest.fill.fee_rate, dec!(0.001));
    assert_eq!(config.optimizer.method, OptimizerMethod::Random);
    assert_eq!(
        config.optimizer.optimization_target(),
        OptimizationTarget::ProfitFactor
    );
    assert_eq!(config.optimizer.random.max_iterations, 12);
    assert_eq!(config.optimizer.random.seed, Some(42));
}

#[test]
fn test_invalid_config_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[optimizer]\nmethod = \"annealing\"").unwrap();
    assert!(Config::load(file.path()).is_err());
}
