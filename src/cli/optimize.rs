//! Optimize command implementation

use super::backtest::parse_parameter;
use super::{crossover_factory, load_events, parse_time, OutputFormat};
use crate::config::{Config, OptimizerMethod};
use crate::optimize::{
    BayesianOptimizer, GeneticAlgorithmOptimizer, GridSearchOptimizer, OptimizationProgress,
    OptimizationTarget, ParameterOptimizer, ParameterRange, RandomSearchOptimizer, Trial,
};
use crate::strategy::ParameterSet;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// JSON file of market events (overrides data.events_path)
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Search method (overrides optimizer.method)
    #[arg(long, value_enum)]
    pub method: Option<OptimizerMethod>,

    /// Fitness metric: sharpe, return, win_rate or profit_factor
    #[arg(long)]
    pub target: Option<String>,

    /// Start time filter (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// End time filter, exclusive (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Fixed strategy parameter, repeatable (e.g. --param order_size=2)
    #[arg(long = "param", value_parser = parse_parameter)]
    pub params: Vec<(String, f64)>,

    /// Number of top candidates to show
    #[arg(long, default_value = "5")]
    pub top: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

/// Serializable search summary
#[derive(Debug, Serialize)]
struct OptimizationReport {
    method: &'static str,
    target: String,
    evaluations: usize,
    best_fitness: f64,
    best_parameters: ParameterSet,
    top: Vec<TrialSummary>,
}

#[derive(Debug, Serialize)]
struct TrialSummary {
    parameters: ParameterSet,
    fitness: f64,
    total_return: Option<f64>,
    sharpe_ratio: Option<f64>,
    max_drawdown: Option<f64>,
    trade_count: Option<usize>,
}

impl From<&Trial> for TrialSummary {
    fn from(trial: &Trial) -> Self {
        let result = trial.result.as_ref();
        Self {
            parameters: trial.parameters.clone(),
            fitness: trial.fitness,
            total_return: result.map(|r| r.total_return),
            sharpe_ratio: result.map(|r| r.sharpe_ratio),
            max_drawdown: result.map(|r| r.max_drawdown),
            trade_count: result.map(|r| r.trade_count),
        }
    }
}

/// Build the configured optimizer
pub fn build_optimizer(config: &Config, method: OptimizerMethod) -> Box<dyn ParameterOptimizer> {
    let settings = &config.optimizer;
    match method {
        OptimizerMethod::Grid => Box::new(GridSearchOptimizer::new(settings.grid.clone())),
        OptimizerMethod::Genetic => {
            Box::new(GeneticAlgorithmOptimizer::new(settings.genetic.clone()))
        }
        OptimizerMethod::Random => Box::new(RandomSearchOptimizer::new(settings.random.clone())),
        OptimizerMethod::Bayesian => Box::new(BayesianOptimizer::new(settings.bayesian.clone())),
    }
}

fn format_fitness(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        "failed".to_string()
    }
}

fn format_parameters(parameters: &ParameterSet) -> String {
    parameters
        .iter()
        .map(|(name, value)| format!("{name}={value:.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl OptimizeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let method = self.method.unwrap_or(config.optimizer.method);
        let target = match &self.target {
            Some(name) => OptimizationTarget::parse(name),
            None => config.optimizer.optimization_target(),
        };

        let mut base = config.backtest.clone();
        if let Some(start) = &self.start {
            base.start_time = parse_time(start)?;
        }
        if let Some(end) = &self.end {
            base.end_time = parse_time(end)?;
        }
        base.strategy_parameters.extend(self.params.iter().cloned());

        let ranges: crate::optimize::ParameterRanges = config.optimizer.parameter_ranges();
        if ranges.is_empty() {
            anyhow::bail!("No parameter ranges configured under [optimizer.ranges]");
        }
        let source = load_events(config, self.events.as_deref())?;

        let mut optimizer = build_optimizer(config, method);
        optimizer.initialize(base);
        optimizer.set_data_source(source);
        optimizer.set_parameter_ranges(ranges.clone());
        optimizer.set_optimization_target(target);
        optimizer.set_progress_callback(Box::new(|p: &OptimizationProgress| {
            tracing::info!(
                iteration = p.current_iteration,
                total = p.total_iterations,
                fitness = p.current_fitness,
                best = p.best_fitness,
                status = %p.status,
                "Optimization progress"
            );
        }));

        tracing::info!(
            method = optimizer.name(),
            objective = %target,
            parameters = ?ranges.keys().collect::<Vec<_>>(),
            "Starting optimization"
        );
        optimizer
            .optimize(&crossover_factory)
            .await
            .context("Optimization failed")?;

        let mut ranked: Vec<&Trial> = optimizer.trials().iter().collect();
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        let report = OptimizationReport {
            method: optimizer.name(),
            target: target.to_string(),
            evaluations: optimizer.trials().len(),
            best_fitness: optimizer.best_fitness(),
            best_parameters: optimizer.best_parameters(),
            top: ranked.iter().take(self.top).map(|t| TrialSummary::from(*t)).collect(),
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => print_report(&report, &ranges),
        }
        Ok(())
    }
}

fn print_report(report: &OptimizationReport, ranges: &crate::optimize::ParameterRanges) {
    println!("══════════════════════════════════════════════════════");
    println!("               OPTIMIZATION RESULTS");
    println!("══════════════════════════════════════════════════════");
    println!("Method:           {}", report.method);
    println!("Target:           {}", report.target);
    println!("Evaluations:      {}", report.evaluations);
    for (name, ParameterRange { min, max }) in ranges {
        println!("Range:            {name} in [{min}, {max}]");
    }
    println!();
    println!("Best Fitness:     {}", format_fitness(report.best_fitness));
    println!("Best Parameters:  {}", format_parameters(&report.best_parameters));
    println!("───────────────────────────────────────────────────────");
    for (rank, trial) in report.top.iter().enumerate() {
        println!(
            "#{:<3} {:>10}  trades={:<5} {}",
            rank + 1,
            format_fitness(trial.fitness),
            trial.trade_count.map_or("-".to_string(), |n| n.to_string()),
            format_parameters(&trial.parameters)
        );
    }
    println!("══════════════════════════════════════════════════════");
}
