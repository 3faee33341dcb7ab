//! Parameter optimization module
//!
//! Grid, genetic, random and Bayesian search over strategy parameters, each
//! using repeated backtests as the fitness oracle

mod bayesian;
mod gaussian_process;
mod genetic;
mod grid;
mod random;
mod types;

pub use bayesian::{AcquisitionFunction, BayesianConfig, BayesianOptimizer};
pub use gaussian_process::{normal_cdf, normal_pdf, GaussianProcess};
pub use genetic::{apply_drawdown_penalty, GeneticAlgorithmOptimizer, GeneticConfig};
pub use grid::{grid_values, GridSearchConfig, GridSearchOptimizer};
pub use random::{RandomSearchConfig, RandomSearchOptimizer};
pub use types::{
    sample_parameters, sanitize_fitness, OptimizationProgress, OptimizationProgressCallback,
    OptimizationTarget, OptimizeError, ParameterRange, ParameterRanges, Trial,
};

use crate::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::data::DataSource;
use crate::strategy::{ParameterSet, StrategyFactory};
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// State shared by every optimizer
///
/// Owns one engine that is reset and re-initialized for each candidate.
pub struct OptimizerCore {
    base_config: Option<BacktestConfig>,
    ranges: ParameterRanges,
    target: OptimizationTarget,
    data_source: Option<Arc<dyn DataSource>>,
    engine: BacktestEngine,
    trials: Vec<Trial>,
    best_parameters: ParameterSet,
    best_fitness: f64,
    progress: Option<OptimizationProgressCallback>,
}

impl OptimizerCore {
    /// Create an empty core
    pub fn new() -> Self {
        Self {
            base_config: None,
            ranges: ParameterRanges::new(),
            target: OptimizationTarget::default(),
            data_source: None,
            engine: BacktestEngine::new(),
            trials: vec![],
            best_parameters: ParameterSet::new(),
            best_fitness: f64::NEG_INFINITY,
            progress: None,
        }
    }

    /// Parameter bounds
    pub fn ranges(&self) -> &ParameterRanges {
        &self.ranges
    }

    /// Fitness metric
    pub fn target(&self) -> OptimizationTarget {
        self.target
    }

    /// Best fitness so far (negative infinity before any success)
    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    /// Best assignment so far
    pub fn best_parameters(&self) -> &ParameterSet {
        &self.best_parameters
    }

    /// Every evaluated candidate, in evaluation order
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Check preconditions and clear results from a previous search
    pub fn begin(&mut self) -> Result<(), OptimizeError> {
        if self.ranges.is_empty() {
            tracing::error!("Cannot optimize without parameter ranges");
            return Err(OptimizeError::NoParameterRanges);
        }
        if let Some((name, range)) = self.ranges.iter().find(|(_, r)| !r.is_valid()) {
            let err = OptimizeError::InvalidRange {
                name: name.clone(),
                min: range.min,
                max: range.max,
            };
            tracing::error!(error = %err, "Cannot optimize");
            return Err(err);
        }
        if self.base_config.is_none() {
            tracing::error!("Cannot optimize before initialize");
            return Err(OptimizeError::NotInitialized);
        }
        if self.data_source.is_none() {
            tracing::error!("Cannot optimize without a data source");
            return Err(OptimizeError::MissingDataSource);
        }

        self.trials.clear();
        self.best_parameters.clear();
        self.best_fitness = f64::NEG_INFINITY;
        Ok(())
    }

    /// Run one backtest for a candidate
    ///
    /// Returns the raw target fitness and the result. A failed backtest
    /// yields negative infinity and no result.
    pub async fn evaluate(
        &mut self,
        factory: &dyn StrategyFactory,
        parameters: &ParameterSet,
    ) -> (f64, Option<BacktestResult>) {
        let (Some(base), Some(source)) = (self.base_config.as_ref(), self.data_source.clone())
        else {
            return (f64::NEG_INFINITY, None);
        };

        self.engine.reset();
        self.engine.initialize(base.with_parameters(parameters));
        self.engine.set_data_source(source);
        self.engine.set_strategy(factory.create(parameters));

        match self.engine.run().await {
            Ok(result) => (self.target.fitness(&result), Some(result)),
            Err(e) => {
                tracing::warn!(error = %e, ?parameters, "Candidate backtest failed");
                (f64::NEG_INFINITY, None)
            }
        }
    }

    /// Store a trial and update the best; returns whether it improved
    ///
    /// Only a strictly greater fitness replaces the best, so ties keep the
    /// first-seen assignment.
    pub fn record(
        &mut self,
        method: &'static str,
        parameters: ParameterSet,
        fitness: f64,
        result: Option<BacktestResult>,
    ) -> bool {
        let fitness = sanitize_fitness(fitness);
        telemetry::increment(CounterMetric::Trials, "method", method.to_string());

        let improved = self.trials.is_empty() || fitness > self.best_fitness;
        if improved {
            self.best_fitness = fitness;
            self.best_parameters = parameters.clone();
            if fitness.is_finite() {
                telemetry::set_gauge(GaugeMetric::BestFitness, fitness);
            }
            tracing::debug!(method, fitness, ?parameters, "New best parameters");
        }

        self.trials.push(Trial {
            parameters,
            fitness,
            result,
        });
        improved
    }

    /// Notify the progress callback
    pub fn report(
        &mut self,
        current_iteration: usize,
        total_iterations: usize,
        current_fitness: f64,
        current_parameters: &ParameterSet,
        status: &str,
    ) {
        let Some(callback) = self.progress.as_mut() else {
            return;
        };
        let progress = if total_iterations == 0 {
            1.0
        } else {
            (current_iteration as f64 / total_iterations as f64).min(1.0)
        };
        callback(&OptimizationProgress {
            current_iteration,
            total_iterations,
            current_fitness,
            best_fitness: self.best_fitness,
            current_parameters: current_parameters.clone(),
            best_parameters: self.best_parameters.clone(),
            status: status.to_string(),
            progress,
        });
    }
}

impl Default for OptimizerCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Seeded or entropy-backed RNG
pub(crate) fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Common contract for parameter search strategies
#[async_trait]
pub trait ParameterOptimizer: Send {
    /// Short method name
    fn name(&self) -> &'static str;

    /// Shared state
    fn core(&self) -> &OptimizerCore;

    /// Shared state, mutably
    fn core_mut(&mut self) -> &mut OptimizerCore;

    /// Search for the best parameters
    ///
    /// Fails fast without evaluating anything if ranges, base config or data
    /// source are missing, or a range is invalid.
    async fn optimize(&mut self, factory: &dyn StrategyFactory) -> Result<(), OptimizeError>;

    /// Set the base backtest configuration
    fn initialize(&mut self, base_config: BacktestConfig) {
        self.core_mut().base_config = Some(base_config);
    }

    /// Results of every successful evaluation, in evaluation order
    fn results(&self) -> Vec<BacktestResult> {
        self.core()
            .trials
            .iter()
            .filter_map(|t| t.result.clone())
            .collect()
    }

    /// Best assignment found
    fn best_parameters(&self) -> ParameterSet {
        self.core().best_parameters.clone()
    }

    /// Fitness of the best assignment
    fn best_fitness(&self) -> f64 {
        self.core().best_fitness
    }

    /// Every evaluated candidate
    fn trials(&self) -> &[Trial] {
        self.core().trials()
    }

    /// Set search bounds
    fn set_parameter_ranges(&mut self, ranges: ParameterRanges) {
        self.core_mut().ranges = ranges;
    }

    /// Set the fitness metric
    fn set_optimization_target(&mut self, target: OptimizationTarget) {
        self.core_mut().target = target;
    }

    /// Set the event source shared by every candidate
    fn set_data_source(&mut self, source: Arc<dyn DataSource>) {
        self.core_mut().data_source = Some(source);
    }

    /// Receive progress after every evaluation
    fn set_progress_callback(&mut self, callback: OptimizationProgressCallback) {
        self.core_mut().progress = Some(callback);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::backtest::BacktestConfig;
    use crate::data::{InMemoryDataSource, MarketEvent};
    use crate::ledger::Position;
    use crate::signal::OrderSignal;
    use crate::strategy::{ParameterSet, Strategy, StrategyConfig};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    /// Buys `size` units on even-numbered events and sells them on odd ones
    ///
    /// Against a rising second price the total return grows with `size`. A
    /// negative `fail` parameter makes initialization fail.
    pub struct RoundTripStrategy {
        size: Decimal,
        fail: bool,
        seen: usize,
        pending: Vec<OrderSignal>,
    }

    impl RoundTripStrategy {
        pub fn boxed(parameters: &ParameterSet) -> Box<dyn Strategy> {
            let size = parameters.get("size").copied().unwrap_or(1.0);
            Box::new(Self {
                size: Decimal::from_f64(size).unwrap_or_default(),
                fail: parameters.get("fail").copied().unwrap_or(0.0) < 0.0,
                seen: 0,
                pending: vec![],
            })
        }
    }

    impl Strategy for RoundTripStrategy {
        fn name(&self) -> &str {
            "round_trip"
        }

        fn initialize(&mut self, _config: &StrategyConfig) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("rejected parameters");
            }
            Ok(())
        }

        fn on_event(&mut self, event: &MarketEvent) -> anyhow::Result<()> {
            let signal = if self.seen % 2 == 0 {
                OrderSignal::buy(event.symbol.clone(), self.size)
            } else {
                OrderSignal::sell(event.symbol.clone(), self.size)
            };
            self.pending.push(signal);
            self.seen += 1;
            Ok(())
        }

        fn get_signals(&mut self) -> Vec<OrderSignal> {
            std::mem::take(&mut self.pending)
        }

        fn on_position_update(&mut self, _position: &Position) {}
    }

    /// Two trades: 100 then 110
    pub fn create_test_source() -> Arc<InMemoryDataSource> {
        create_price_source(&[dec!(100), dec!(110)])
    }

    /// One trade per price, 1ms apart
    pub fn create_price_source(prices: &[Decimal]) -> Arc<InMemoryDataSource> {
        Arc::new(InMemoryDataSource::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, price)| {
                    MarketEvent::trade("BTCUSDT", (i as i64 + 1) * 1_000_000, *price, dec!(1))
                })
                .collect(),
        ))
    }

    pub fn create_test_config() -> BacktestConfig {
        BacktestConfig {
            strategy_name: "round_trip".to_string(),
            symbol: "BTCUSDT".to_string(),
            initial_balance: dec!(1000),
            ..Default::default()
        }
    }
}
