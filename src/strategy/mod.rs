//! Strategy module
//!
//! The pluggable strategy boundary driven by the backtest engine

mod crossover;

pub use crossover::MovingAverageCrossover;

use crate::data::MarketEvent;
use crate::ledger::Position;
use crate::signal::OrderSignal;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Named strategy parameters, ordered by name
pub type ParameterSet = BTreeMap<String, f64>;

/// Configuration handed to a strategy before a run
#[derive(Debug, Clone, Default)]
pub struct StrategyConfig {
    /// Strategy name
    pub name: String,
    /// Primary symbol
    pub symbol: String,
    /// Tunable parameters
    pub parameters: ParameterSet,
    /// Fraction of capital risked per trade
    pub risk_per_trade: Decimal,
    /// Maximum absolute position size
    pub max_position_size: Decimal,
}

impl StrategyConfig {
    /// Look up a parameter, falling back to a default
    pub fn parameter(&self, name: &str, default: f64) -> f64 {
        self.parameters.get(name).copied().unwrap_or(default)
    }
}

/// Trait for strategy implementations
///
/// The engine calls `on_event` then `get_signals` once per event, and
/// `on_position_update` after every fill.
pub trait Strategy: Send {
    /// Strategy identifier recorded on trades
    fn name(&self) -> &str;
    /// Prepare for a run; called once before the first event
    fn initialize(&mut self, config: &StrategyConfig) -> anyhow::Result<()>;
    /// Consume one market event
    fn on_event(&mut self, event: &MarketEvent) -> anyhow::Result<()>;
    /// Drain signals produced since the last call
    fn get_signals(&mut self) -> Vec<OrderSignal>;
    /// Receive the position after a fill
    fn on_position_update(&mut self, position: &Position);
    /// Called once after the last event
    fn on_stop(&mut self) {}
}

/// Builds a fresh strategy for a parameter assignment
pub trait StrategyFactory: Send + Sync {
    /// Create a strategy instance
    fn create(&self, parameters: &ParameterSet) -> Box<dyn Strategy>;
}

impl<F> StrategyFactory for F
where
    F: Fn(&ParameterSet) -> Box<dyn Strategy> + Send + Sync,
{
    fn create(&self, parameters: &ParameterSet) -> Box<dyn Strategy> {
        self(parameters)
    }
}
