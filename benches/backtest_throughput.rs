//! Benchmarks for backtest replay throughput

use backtest_lab::backtest::{BacktestConfig, BacktestEngine};
use backtest_lab::data::{InMemoryDataSource, MarketEvent};
use backtest_lab::strategy::MovingAverageCrossover;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn sine_events(count: usize) -> Vec<MarketEvent> {
    (0..count)
        .map(|i| {
            let offset = ((i as f64 / 50.0).sin() * 1000.0).round() as i64;
            let price = dec!(50000) + Decimal::from(offset);
            MarketEvent::trade("BTCUSDT", (i as i64 + 1) * 1_000_000, price, dec!(0.1))
        })
        .collect()
}

fn crossover_config() -> BacktestConfig {
    let mut config = BacktestConfig {
        strategy_name: "ma_crossover".to_string(),
        symbol: "BTCUSDT".to_string(),
        ..Default::default()
    };
    config.strategy_parameters.insert("fast_period".to_string(), 10.0);
    config.strategy_parameters.insert("slow_period".to_string(), 40.0);
    config
}

fn benchmark_crossover_replay(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let source = Arc::new(InMemoryDataSource::new(sine_events(10_000)));
    let config = crossover_config();

    c.bench_function("crossover_replay_10k", |b| {
        b.to_async(&runtime).iter(|| {
            let source = source.clone();
            let config = config.clone();
            async move {
                let mut engine = BacktestEngine::new();
                engine.initialize(config);
                engine.set_data_source(source);
                engine.set_strategy(Box::new(MovingAverageCrossover::new()));
                black_box(engine.run().await.unwrap())
            }
        })
    });
}

criterion_group!(benches, benchmark_crossover_replay);
criterion_main!(benches);
