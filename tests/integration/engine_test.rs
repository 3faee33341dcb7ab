//! End-to-end backtests with the crossover strategy

use crate::common::{crossover, crossover_config, source, trades, zigzag_prices, SYMBOL};
use backtest_lab::backtest::{BacktestEngine, EngineState};
use backtest_lab::data::InMemoryDataSource;
use backtest_lab::signal::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
async fn test_crossover_flips_position() {
    let prices = [dec!(100), dec!(101), dec!(102), dec!(103), dec!(90), dec!(80)];
    let mut engine = BacktestEngine::new();
    engine.initialize(crossover_config(2.0, 3.0));
    engine.set_data_source(source(&prices));
    engine.set_strategy(crossover(&Default::default()));

    let result = engine.run().await.unwrap();
    assert_eq!(engine.state(), EngineState::Completed);
    assert_eq!(result.trade_count, 2);

    // Uptrend confirmed on the third print, reversal on the fifth
    let trades = engine.trades();
    assert_eq!(trades[0].side, Side::Buy);
    assert_eq!(trades[0].quantity, dec!(1));
    assert_eq!(trades[0].price, dec!(102.102));
    assert_eq!(trades[1].side, Side::Sell);
    assert_eq!(trades[1].quantity, dec!(2));
    assert_eq!(trades[1].price, dec!(89.91));

    let positions = engine.positions();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol, SYMBOL);
    assert_eq!(positions[0].size, dec!(-1));
}

#[tokio::test]
async fn test_result_invariants_on_zigzag() {
    let mut engine = BacktestEngine::new();
    engine.initialize(crossover_config(3.0, 8.0));
    engine.set_data_source(source(&zigzag_prices()));
    engine.set_strategy(crossover(&Default::default()));

    let result = engine.run().await.unwrap();
    assert!(result.trade_count >= 2);
    assert!(result.win_count + result.lose_count <= result.trade_count);
    assert!((0.0..=1.0).contains(&result.win_rate));
    assert!(result.max_drawdown >= 0.0);

    let equity = result.equity_curve();
    assert_eq!(equity.len(), result.trade_count + 1);
    assert_eq!(equity[0].equity, result.initial_balance);
    for (window, trade) in equity.windows(2).zip(&result.trades) {
        assert_eq!(window[1].equity, window[0].equity + trade.pnl);
    }

    let drawdown = result.drawdown_curve();
    assert!(drawdown.iter().all(|p| p.drawdown >= 0.0));
    assert!(drawdown.windows(2).all(|w| w[1].peak >= w[0].peak));
}

#[tokio::test]
async fn test_reused_engine_matches_fresh_engine() {
    let prices = zigzag_prices();
    let mut reused = BacktestEngine::new();
    reused.initialize(crossover_config(2.0, 5.0));
    reused.set_data_source(source(&prices));
    reused.set_strategy(crossover(&Default::default()));
    reused.run().await.unwrap();

    reused.reset();
    reused.initialize(crossover_config(3.0, 8.0));
    reused.set_data_source(source(&prices));
    reused.set_strategy(crossover(&Default::default()));
    let second = reused.run().await.unwrap();

    let mut fresh = BacktestEngine::new();
    fresh.initialize(crossover_config(3.0, 8.0));
    fresh.set_data_source(source(&prices));
    fresh.set_strategy(crossover(&Default::default()));
    let expected = fresh.run().await.unwrap();

    assert_eq!(second.trade_count, expected.trade_count);
    assert_eq!(second.final_balance, expected.final_balance);
    assert_eq!(second.total_fees, expected.total_fees);
}

#[tokio::test]
async fn test_events_loaded_from_json_file() {
    let events = trades(&[dec!(100), dec!(101), dec!(102), dec!(98), dec!(95)]);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&events).unwrap()).unwrap();

    let source = InMemoryDataSource::from_json_file(file.path()).unwrap();
    assert_eq!(source.len(), 5);

    let source = Arc::new(source);
    let mut engine = BacktestEngine::new();
    engine.initialize(crossover_config(2.0, 3.0));
    engine.set_data_source(source.clone());
    engine.set_strategy(crossover(&Default::default()));
    let result = engine.run().await.unwrap();

    assert_eq!(result.trade_count, 2);
    assert!(!source.is_connected());
    assert_eq!(source.disconnect_count(), 1);
}

#[tokio::test]
async fn test_out_of_order_events_are_replayed_sorted() {
    let mut events = trades(&[dec!(100), dec!(101), dec!(102)]);
    events.swap(0, 2);

    let mut engine = BacktestEngine::new();
    engine.initialize(crossover_config(2.0, 3.0));
    engine.set_data_source(Arc::new(InMemoryDataSource::new(events)));
    engine.set_strategy(crossover(&Default::default()));
    let result = engine.run().await.unwrap();

    // Sorted replay sees a rising market and buys once at the last print
    assert_eq!(result.trade_count, 1);
    assert_eq!(engine.trades()[0].side, Side::Buy);
    assert_eq!(engine.trades()[0].price, dec!(102.102));
}

#[tokio::test]
async fn test_serialized_result_has_summary_fields() {
    let mut engine = BacktestEngine::new();
    engine.initialize(crossover_config(2.0, 3.0));
    engine.set_data_source(source(&[dec!(100), dec!(101), dec!(102)]));
    engine.set_strategy(crossover(&Default::default()));
    let result = engine.run().await.unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["symbol"], SYMBOL);
    assert_eq!(json["trade_count"], 1);
    assert!(result.format_table().contains("BACKTEST RESULTS"));
    assert!(result.total_fees > Decimal::ZERO);
}
