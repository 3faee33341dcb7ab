//! Uniform random search

use super::{
    create_rng, sample_parameters, OptimizeError, OptimizerCore, ParameterOptimizer, Trial,
};
use crate::strategy::StrategyFactory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Random search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSearchConfig {
    /// Number of samples
    pub max_iterations: usize,
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for RandomSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            seed: None,
        }
    }
}

/// Evaluates independent uniform samples from the parameter space
pub struct RandomSearchOptimizer {
    core: OptimizerCore,
    config: RandomSearchConfig,
}

impl RandomSearchOptimizer {
    /// Create a random search optimizer
    pub fn new(config: RandomSearchConfig) -> Self {
        Self {
            core: OptimizerCore::new(),
            config,
        }
    }

    /// Top `n` trials by fitness, best first
    pub fn ranked_results(&self, n: usize) -> Vec<Trial> {
        let mut ranked = self.core.trials().to_vec();
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        ranked.truncate(n);
        ranked
    }
}

impl Default for RandomSearchOptimizer {
    fn default() -> Self {
        Self::new(RandomSearchConfig::default())
    }
}

#[async_trait]
impl ParameterOptimizer for RandomSearchOptimizer {
    fn name(&self) -> &'static str {
        "random"
    }

    fn core(&self) -> &OptimizerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OptimizerCore {
        &mut self.core
    }

    async fn optimize(&mut self, factory: &dyn StrategyFactory) -> Result<(), OptimizeError> {
        self.core.begin()?;
        let ranges = self.core.ranges().clone();
        let total = self.config.max_iterations;
        let mut rng = create_rng(self.config.seed);
        tracing::info!(samples = total, objective = %self.core.target(), "Random search started");

        for iteration in 1..=total {
            let parameters = sample_parameters(&ranges, &mut rng);
            let (fitness, result) = self.core.evaluate(factory, &parameters).await;
            self.core.record("random", parameters.clone(), fitness, result);
            self.core
                .report(iteration, total, fitness, &parameters, "random search");
        }

        tracing::info!(
            best_fitness = self.core.best_fitness(),
            best_parameters = ?self.core.best_parameters(),
            "Random search finished"
        );
        Ok(())
    }
}
