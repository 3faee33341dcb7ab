//! Exhaustive grid search

use super::{OptimizeError, OptimizerCore, ParameterOptimizer, ParameterRange};
use crate::strategy::{ParameterSet, StrategyFactory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Grid search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    /// Maximum number of combinations evaluated
    pub max_iterations: usize,
    /// Equal steps per parameter range
    pub steps: usize,
    /// Lower bound on the step width
    pub min_step: f64,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            steps: 10,
            min_step: 0.001,
        }
    }
}

/// Candidate values for one range: `min + i * step`, clamped to `max`
pub fn grid_values(range: &ParameterRange, steps: usize, min_step: f64) -> Vec<f64> {
    let step = (range.width() / steps.max(1) as f64).max(min_step);
    // Tolerate float error so an exact multiple still reaches max
    let count = (range.width() / step + 1e-9).floor() as usize;
    (0..=count)
        .map(|i| (range.min + i as f64 * step).min(range.max))
        .collect()
}

/// Cartesian product in nested-loop order, first axis slowest, at most `limit`
fn combinations(axes: &[(String, Vec<f64>)], limit: usize) -> Vec<ParameterSet> {
    if axes.iter().any(|(_, values)| values.is_empty()) {
        return vec![];
    }

    let mut indices = vec![0usize; axes.len()];
    let mut combos = vec![];
    while combos.len() < limit {
        combos.push(
            axes.iter()
                .zip(&indices)
                .map(|((name, values), &i)| (name.clone(), values[i]))
                .collect(),
        );

        // Odometer increment from the last axis
        let mut axis = axes.len();
        loop {
            if axis == 0 {
                return combos;
            }
            axis -= 1;
            indices[axis] += 1;
            if indices[axis] < axes[axis].1.len() {
                break;
            }
            indices[axis] = 0;
        }
    }
    combos
}

/// Evaluates a discretized Cartesian grid of parameter values
pub struct GridSearchOptimizer {
    core: OptimizerCore,
    config: GridSearchConfig,
}

impl GridSearchOptimizer {
    /// Create a grid search optimizer
    pub fn new(config: GridSearchConfig) -> Self {
        Self {
            core: OptimizerCore::new(),
            config,
        }
    }

    /// Combinations that `optimize` will evaluate, in order
    pub fn candidates(&self) -> Vec<ParameterSet> {
        let axes: Vec<(String, Vec<f64>)> = self
            .core
            .ranges()
            .iter()
            .map(|(name, range)| {
                (
                    name.clone(),
                    grid_values(range, self.config.steps, self.config.min_step),
                )
            })
            .collect();
        combinations(&axes, self.config.max_iterations)
    }
}

impl Default for GridSearchOptimizer {
    fn default() -> Self {
        Self::new(GridSearchConfig::default())
    }
}

#[async_trait]
impl ParameterOptimizer for GridSearchOptimizer {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn core(&self) -> &OptimizerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OptimizerCore {
        &mut self.core
    }

    async fn optimize(&mut self, factory: &dyn StrategyFactory) -> Result<(), OptimizeError> {
        self.core.begin()?;
        let candidates = self.candidates();
        let total = candidates.len();
        let method = self.name();
        tracing::info!(
            combinations = total,
            max_iterations = self.config.max_iterations,
            objective = %self.core.target(),
            "Grid search started"
        );

        for (index, parameters) in candidates.into_iter().enumerate() {
            let (fitness, result) = self.core.evaluate(factory, &parameters).await;
            self.core.record(method, parameters.clone(), fitness, result);
            self.core.report(index + 1, total, fitness, &parameters, "grid search");
        }

        tracing::info!(
            best_fitness = self.core.best_fitness(),
            best_parameters = ?self.core.best_parameters(),
            "Grid search finished"
        );
        Ok(())
    }
}
