//! Backtesting module
//!
//! Replays historical events through a strategy with simulated fills,
//! position accounting and performance analytics

mod analytics;
mod engine;
mod execution_model;
mod replay;
mod types;

pub use analytics::{BacktestResult, DrawdownPoint, EquityCurvePoint, PerformanceAnalyzer};
pub use engine::{BacktestEngine, ProgressCallback};
pub use execution_model::{FillRejection, FillSimulator};
pub use replay::EventStream;
pub use types::{BacktestError, EngineState, StopHandle, TradeRecord};

use crate::ledger::CostBasisMethod;
use crate::strategy::{ParameterSet, StrategyConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Backtest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Strategy name recorded on the result
    pub strategy_name: String,
    /// Symbol requested from the data source
    pub symbol: String,
    /// Start of the replay window (ms, inclusive)
    pub start_time: i64,
    /// End of the replay window (ms, exclusive)
    pub end_time: i64,
    /// Initial capital
    pub initial_balance: Decimal,
    /// Fraction of capital risked per trade, passed to the strategy
    pub risk_per_trade: Decimal,
    /// Maximum absolute position size per symbol
    pub max_position_size: Decimal,
    /// Strategy parameters
    pub strategy_parameters: ParameterSet,
    /// Data source identifier
    pub data_source: String,
    /// Data type requested from the source
    pub data_type: String,
    /// Bar interval requested from the source
    pub time_frame: String,
    /// Fill model settings
    pub fill: FillModelConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            strategy_name: String::new(),
            symbol: String::new(),
            start_time: 0,
            end_time: i64::MAX,
            initial_balance: dec!(10000),
            risk_per_trade: dec!(0.02),
            max_position_size: dec!(1000),
            strategy_parameters: ParameterSet::new(),
            data_source: "memory".to_string(),
            data_type: "trade".to_string(),
            time_frame: "1m".to_string(),
            fill: FillModelConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Copy of this config with the given strategy parameters merged in
    pub fn with_parameters(&self, parameters: &ParameterSet) -> Self {
        let mut config = self.clone();
        config
            .strategy_parameters
            .extend(parameters.iter().map(|(k, v)| (k.clone(), *v)));
        config
    }

    /// Strategy-facing view of the config
    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            name: self.strategy_name.clone(),
            symbol: self.symbol.clone(),
            parameters: self.strategy_parameters.clone(),
            risk_per_trade: self.risk_per_trade,
            max_position_size: self.max_position_size,
        }
    }
}

/// Fill model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillModelConfig {
    /// Slippage as a fraction of price
    pub slippage_rate: Decimal,
    /// Fee as a fraction of notional
    pub fee_rate: Decimal,
    /// Cost-basis method for positions
    pub cost_basis: CostBasisMethod,
}

impl Default for FillModelConfig {
    fn default() -> Self {
        Self {
            slippage_rate: dec!(0.001),
            fee_rate: dec!(0.001),
            cost_basis: CostBasisMethod::WeightedAverage,
        }
    }
}
