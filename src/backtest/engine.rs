//! Backtest engine

use super::{
    BacktestConfig, BacktestError, BacktestResult, EngineState, EventStream, FillSimulator,
    PerformanceAnalyzer, StopHandle, TradeRecord,
};
use crate::data::{DataRequest, DataSource, MarketEvent};
use crate::ledger::{Position, PositionManager};
use crate::signal::OrderSignal;
use crate::strategy::Strategy;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Callback receiving run progress in `[0, 1]`
pub type ProgressCallback = Box<dyn FnMut(f64) + Send>;

/// Drives one strategy over one data source
///
/// Lifecycle: `initialize` -> `run` -> `reset`. A finished engine refuses to
/// run again until it is reset and re-initialized.
pub struct BacktestEngine {
    state: EngineState,
    config: BacktestConfig,
    strategy: Option<Box<dyn Strategy>>,
    data_source: Option<Arc<dyn DataSource>>,
    progress: Option<ProgressCallback>,
    positions: PositionManager,
    trades: Vec<TradeRecord>,
    last_prices: HashMap<String, Decimal>,
    result: Option<BacktestResult>,
    stop: StopHandle,
}

impl BacktestEngine {
    /// Create an uninitialized engine
    pub fn new() -> Self {
        Self {
            state: EngineState::Uninitialized,
            config: BacktestConfig::default(),
            strategy: None,
            data_source: None,
            progress: None,
            positions: PositionManager::default(),
            trades: vec![],
            last_prices: HashMap::new(),
            result: None,
            stop: StopHandle::default(),
        }
    }

    /// Load a configuration and clear any previous run state
    pub fn initialize(&mut self, config: BacktestConfig) {
        if self.state.is_terminal() {
            tracing::debug!(previous = %self.state, "Discarding finished run");
        }
        // Positions are zeroed in place unless the cost-basis method changes
        if self.positions.method() == config.fill.cost_basis {
            self.positions.reset();
        } else {
            self.positions.clear(config.fill.cost_basis);
        }
        self.trades.clear();
        self.last_prices.clear();
        self.result = None;
        self.stop.clear();
        self.config = config;
        self.state = EngineState::Initialized;

        tracing::debug!(
            strategy = %self.config.strategy_name,
            symbol = %self.config.symbol,
            "Backtest engine initialized"
        );
    }

    /// Attach the strategy to drive
    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = Some(strategy);
    }

    /// Attach the event source
    pub fn set_data_source(&mut self, source: Arc<dyn DataSource>) {
        self.data_source = Some(source);
    }

    /// Receive progress after every event
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Active configuration
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Result of the last finished run
    pub fn result(&self) -> Option<&BacktestResult> {
        self.result.as_ref()
    }

    /// Fills executed so far
    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Snapshot of all positions
    pub fn positions(&self) -> Vec<Position> {
        self.positions.positions()
    }

    /// Request a cooperative stop
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Handle that can stop the run from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Drop config, collaborators and run state
    pub fn reset(&mut self) {
        self.config = BacktestConfig::default();
        self.strategy = None;
        self.data_source = None;
        self.progress = None;
        self.positions.clear(self.config.fill.cost_basis);
        self.trades.clear();
        self.last_prices.clear();
        self.result = None;
        self.stop.clear();
        self.state = EngineState::Uninitialized;
    }

    /// Replay every event and produce a result
    ///
    /// Fails without changing state if the engine is not initialized or a
    /// collaborator is missing. Any fault during the replay leaves the engine
    /// `Failed` with the source disconnected.
    pub async fn run(&mut self) -> Result<BacktestResult, BacktestError> {
        if self.state != EngineState::Initialized {
            let err = BacktestError::InvalidState {
                expected: EngineState::Initialized,
                actual: self.state,
            };
            tracing::error!(error = %err, "Cannot start backtest");
            return Err(err);
        }
        let Some(source) = self.data_source.clone() else {
            tracing::error!("Cannot start backtest without a data source");
            return Err(BacktestError::MissingDataSource);
        };
        let Some(mut strategy) = self.strategy.take() else {
            tracing::error!("Cannot start backtest without a strategy");
            return Err(BacktestError::MissingStrategy);
        };

        self.state = EngineState::Running;
        let started = Instant::now();
        tracing::info!(
            strategy = %strategy.name(),
            symbol = %self.config.symbol,
            "Backtest started"
        );

        let outcome = self.execute(source.as_ref(), strategy.as_mut()).await;

        if let Err(e) = source.disconnect().await {
            tracing::warn!(error = %format!("{e:#}"), "Data source disconnect failed");
        }
        let strategy_name = strategy.name().to_string();
        self.strategy = Some(strategy);
        telemetry::record_run_duration(started.elapsed());

        let stopped = match outcome {
            Ok(stopped) => stopped,
            Err(err) => {
                self.state = EngineState::Failed;
                telemetry::increment(CounterMetric::Runs, "state", self.state.to_string());
                tracing::error!(error = %err, "Backtest failed");
                return Err(err);
            }
        };

        self.state = if stopped {
            EngineState::Stopped
        } else {
            EngineState::Completed
        };
        let result = self.build_result(strategy_name);
        telemetry::increment(CounterMetric::Runs, "state", self.state.to_string());
        telemetry::set_gauge(
            GaugeMetric::FinalBalance,
            result.final_balance.to_f64().unwrap_or_default(),
        );

        self.log_positions();
        tracing::info!(
            state = %self.state,
            trades = result.trade_count,
            open_positions = self.positions.open_count(),
            final_balance = %result.final_balance,
            total_return = result.total_return,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Backtest finished"
        );

        self.result = Some(result.clone());
        Ok(result)
    }

    /// Connect, fetch and replay; returns whether a stop was requested
    async fn execute(
        &mut self,
        source: &dyn DataSource,
        strategy: &mut dyn Strategy,
    ) -> Result<bool, BacktestError> {
        source
            .connect()
            .await
            .map_err(|e| BacktestError::DataSource(format!("{e:#}")))?;

        let request = DataRequest {
            symbol: self.config.symbol.clone(),
            start_ns: self.config.start_time.saturating_mul(1_000_000),
            end_ns: self.config.end_time.saturating_mul(1_000_000),
            data_type: self.config.data_type.clone(),
            time_frame: self.config.time_frame.clone(),
        };
        let events = source
            .get_data(&request)
            .await
            .map_err(|e| BacktestError::DataSource(format!("{e:#}")))?;

        strategy
            .initialize(&self.config.strategy_config())
            .map_err(|e| BacktestError::StrategyInit(format!("{e:#}")))?;

        let stopped = self.replay(events, strategy)?;
        strategy.on_stop();
        Ok(stopped)
    }

    fn replay(
        &mut self,
        events: Vec<MarketEvent>,
        strategy: &mut dyn Strategy,
    ) -> Result<bool, BacktestError> {
        let fills = FillSimulator::new(&self.config.fill, self.config.max_position_size);
        let stream = EventStream::new(events);
        let total = stream.total();
        tracing::debug!(
            events = total,
            reordered = stream.was_reordered(),
            "Replaying events"
        );

        for (index, event) in stream.enumerate() {
            if self.stop.is_stopped() {
                tracing::info!(processed = index, total, "Backtest stop requested");
                return Ok(true);
            }

            let price = event.price();
            if price > Decimal::ZERO {
                self.last_prices.insert(event.symbol.clone(), price);
            }

            strategy
                .on_event(&event)
                .map_err(|e| {
                    BacktestError::Strategy(format!(
                        "{} event at {}: {e:#}",
                        event.kind(),
                        event.exchange_ts
                    ))
                })?;

            for signal in strategy.get_signals() {
                self.process_signal(&signal, &event, strategy, &fills);
            }

            if let Some(progress) = self.progress.as_mut() {
                progress((index + 1) as f64 / total as f64);
            }
        }
        Ok(false)
    }

    fn process_signal(
        &mut self,
        signal: &OrderSignal,
        event: &MarketEvent,
        strategy: &mut dyn Strategy,
        fills: &FillSimulator,
    ) {
        let market_price = self.last_prices.get(&signal.symbol).copied();
        let current_size = self.positions.size(&signal.symbol);

        let fill = match fills.simulate(signal, market_price, current_size, event.exchange_ts) {
            Ok(fill) => fill,
            Err(rejection) => {
                tracing::warn!(
                    symbol = %signal.symbol,
                    side = %signal.side,
                    quantity = %signal.quantity,
                    reason = %rejection,
                    "Signal rejected"
                );
                telemetry::increment(CounterMetric::Rejections, "reason", rejection.reason().to_string());
                return;
            }
        };

        let (pnl, position) = self.positions.apply_fill(&fill);
        tracing::debug!(
            symbol = %fill.symbol,
            side = %fill.side,
            price = %fill.price,
            quantity = %fill.quantity,
            notional = %fill.notional(),
            pnl = %pnl,
            "Fill"
        );
        telemetry::increment(CounterMetric::Fills, "side", fill.side.to_string());

        self.trades.push(TradeRecord {
            order_id: fill.order_id,
            timestamp: fill.timestamp,
            symbol: fill.symbol,
            side: fill.side,
            price: fill.price,
            quantity: fill.quantity,
            fee: fill.fee,
            pnl,
            strategy_id: strategy.name().to_string(),
        });
        strategy.on_position_update(&position);
    }

    fn log_positions(&self) {
        for position in self.positions.positions() {
            let Some(mark) = self.last_prices.get(&position.symbol) else {
                continue;
            };
            tracing::debug!(
                symbol = %position.symbol,
                size = %position.size,
                long = position.is_long(),
                entry_price = ?position.entry_price(),
                total_pnl = %position.total_pnl(*mark),
                "Final position"
            );
        }
    }

    fn build_result(&self, strategy_name: String) -> BacktestResult {
        let realized = self.positions.total_realized_pnl();
        let unrealized = self.positions.total_unrealized_pnl(&self.last_prices);
        let fees: Decimal = self.trades.iter().map(|t| t.fee).sum();

        let mut result = BacktestResult {
            strategy_name: if self.config.strategy_name.is_empty() {
                strategy_name
            } else {
                self.config.strategy_name.clone()
            },
            symbol: self.config.symbol.clone(),
            start_time: self.config.start_time,
            end_time: self.config.end_time,
            initial_balance: self.config.initial_balance,
            final_balance: self.config.initial_balance + realized - fees + unrealized,
            parameters: self.config.strategy_parameters.clone(),
            final_state: self.state,
            trades: self.trades.clone(),
            ..Default::default()
        };
        PerformanceAnalyzer::populate(&mut result);
        result
    }
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self::new()
    }
}
