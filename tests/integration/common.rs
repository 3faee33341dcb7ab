//! Shared fixtures

use backtest_lab::backtest::BacktestConfig;
use backtest_lab::data::{InMemoryDataSource, MarketEvent};
use backtest_lab::strategy::{MovingAverageCrossover, ParameterSet, Strategy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const SYMBOL: &str = "BTCUSDT";

/// One trade per millisecond at the given prices
pub fn trades(prices: &[Decimal]) -> Vec<MarketEvent> {
    prices
        .iter()
        .enumerate()
        .map(|(i, price)| MarketEvent::trade(SYMBOL, (i as i64 + 1) * 1_000_000, *price, dec!(1)))
        .collect()
}

/// Two up legs and two down legs
pub fn zigzag_prices() -> Vec<Decimal> {
    let mut prices = vec![];
    let mut price = dec!(100);
    for leg in 0..4 {
        for _ in 0..10 {
            price += if leg % 2 == 0 { dec!(2) } else { dec!(-2) };
            prices.push(price);
        }
    }
    prices
}

pub fn source(prices: &[Decimal]) -> Arc<InMemoryDataSource> {
    Arc::new(InMemoryDataSource::new(trades(prices)))
}

pub fn crossover_config(fast: f64, slow: f64) -> BacktestConfig {
    let mut config = BacktestConfig {
        strategy_name: "ma_crossover".to_string(),
        symbol: SYMBOL.to_string(),
        initial_balance: dec!(10000),
        max_position_size: dec!(10),
        ..Default::default()
    };
    config.strategy_parameters.insert("fast_period".to_string(), fast);
    config.strategy_parameters.insert("slow_period".to_string(), slow);
    config
}

pub fn crossover(_parameters: &ParameterSet) -> Box<dyn Strategy> {
    Box::new(MovingAverageCrossover::new())
}
