//! Prometheus metrics

use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Simulated fills
    Fills,
    /// Signals rejected by the fill simulator
    Rejections,
    /// Finished backtest runs
    Runs,
    /// Optimizer candidate evaluations
    Trials,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Final balance of the last run
    FinalBalance,
    /// Best fitness found by the running optimizer
    BestFitness,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            Self::Fills => "backtest_fills_total",
            Self::Rejections => "backtest_rejections_total",
            Self::Runs => "backtest_runs_total",
            Self::Trials => "optimizer_trials_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            Self::FinalBalance => "backtest_final_balance",
            Self::BestFitness => "optimizer_best_fitness",
        }
    }
}

/// Increment a counter with one label
pub fn increment(metric: CounterMetric, label: &'static str, value: String) {
    metrics::counter!(metric.name(), label => value).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Record the wall-clock duration of a backtest run
pub fn record_run_duration(duration: Duration) {
    metrics::histogram!("backtest_run_duration_seconds").record(duration.as_secs_f64());
}
