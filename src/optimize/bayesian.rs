//! Bayesian search with a Gaussian-process surrogate

use super::gaussian_process::{normal_cdf, normal_pdf, GaussianProcess};
use super::{create_rng, OptimizeError, OptimizerCore, ParameterOptimizer, ParameterRanges};
use crate::strategy::{ParameterSet, StrategyFactory};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Rule for picking the next point from the surrogate posterior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionFunction {
    #[default]
    ExpectedImprovement,
    UpperConfidenceBound,
    ProbabilityOfImprovement,
}

impl AcquisitionFunction {
    /// Parse a name or abbreviation, falling back to expected improvement
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ei" | "expected_improvement" => Self::ExpectedImprovement,
            "ucb" | "upper_confidence_bound" => Self::UpperConfidenceBound,
            "pi" | "probability_of_improvement" => Self::ProbabilityOfImprovement,
            other => {
                tracing::warn!(acquisition = other, "Unknown acquisition function, using ei");
                Self::ExpectedImprovement
            }
        }
    }

    /// Score a posterior `(mean, variance)` against the best observed value
    pub fn score(self, mean: f64, variance: f64, best: f64, xi: f64, kappa: f64) -> f64 {
        let std_dev = variance.max(0.0).sqrt();
        match self {
            Self::UpperConfidenceBound => mean + kappa * std_dev,
            Self::ExpectedImprovement => {
                if std_dev <= 1e-12 {
                    return 0.0;
                }
                let improvement = mean - best - xi;
                let z = improvement / std_dev;
                improvement * normal_cdf(z) + std_dev * normal_pdf(z)
            }
            Self::ProbabilityOfImprovement => {
                if std_dev <= 1e-12 {
                    return 0.0;
                }
                normal_cdf((mean - best - xi) / std_dev)
            }
        }
    }
}

/// Bayesian search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Total evaluations
    pub max_iterations: usize,
    /// Uniform random evaluations before the surrogate is used
    pub initial_samples: usize,
    /// Random candidates scored per suggestion
    pub candidates: usize,
    pub acquisition: AcquisitionFunction,
    /// Exploration margin for EI and PI
    pub xi: f64,
    /// Exploration weight for UCB
    pub kappa: f64,
    /// RBF kernel length scale in normalized units
    pub length_scale: f64,
    /// Observation noise added to the kernel diagonal
    pub noise: f64,
    /// Gauss-Seidel sweeps per posterior solve
    pub solver_sweeps: usize,
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            initial_samples: 5,
            candidates: 1000,
            acquisition: AcquisitionFunction::ExpectedImprovement,
            xi: 0.01,
            kappa: 2.0,
            length_scale: 0.2,
            noise: 1e-4,
            solver_sweeps: 50,
            seed: None,
        }
    }
}

/// Guides sampling with a surrogate model of fitness
pub struct BayesianOptimizer {
    core: OptimizerCore,
    config: BayesianConfig,
    surrogate: GaussianProcess,
    observations: Vec<(Vec<f64>, f64)>,
}

impl BayesianOptimizer {
    /// Create a Bayesian optimizer
    pub fn new(config: BayesianConfig) -> Self {
        let surrogate = GaussianProcess::new(config.length_scale, config.noise, config.solver_sweeps);
        Self {
            core: OptimizerCore::new(),
            config,
            surrogate,
            observations: vec![],
        }
    }

    /// Number of observations in the surrogate
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    fn random_point(dimensions: usize, rng: &mut StdRng) -> Vec<f64> {
        (0..dimensions).map(|_| rng.gen_range(0.0..=1.0)).collect()
    }

    /// Best-scoring random candidate under the acquisition function
    fn suggest(&self, dimensions: usize, rng: &mut StdRng) -> Vec<f64> {
        let best = self
            .observations
            .iter()
            .map(|(_, y)| *y)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut chosen = Self::random_point(dimensions, rng);
        let mut chosen_score = f64::NEG_INFINITY;
        for _ in 0..self.config.candidates {
            let candidate = Self::random_point(dimensions, rng);
            let (mean, variance) = self.surrogate.predict(&candidate);
            let score = self.config.acquisition.score(
                mean,
                variance,
                best,
                self.config.xi,
                self.config.kappa,
            );
            if score > chosen_score {
                chosen_score = score;
                chosen = candidate;
            }
        }
        chosen
    }

    fn observe(&mut self, point: Vec<f64>, fitness: f64) {
        if !fitness.is_finite() {
            return;
        }
        self.observations.push((point, fitness));
        let (inputs, outputs): (Vec<Vec<f64>>, Vec<f64>) = self.observations.iter().cloned().unzip();
        self.surrogate.fit(inputs, outputs);
    }
}

impl Default for BayesianOptimizer {
    fn default() -> Self {
        Self::new(BayesianConfig::default())
    }
}

fn denormalize(ranges: &ParameterRanges, point: &[f64]) -> ParameterSet {
    ranges
        .iter()
        .zip(point)
        .map(|((name, range), unit)| (name.clone(), range.denormalize(*unit)))
        .collect()
}

#[async_trait]
impl ParameterOptimizer for BayesianOptimizer {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn core(&self) -> &OptimizerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OptimizerCore {
        &mut self.core
    }

    async fn optimize(&mut self, factory: &dyn StrategyFactory) -> Result<(), OptimizeError> {
        self.core.begin()?;
        self.observations.clear();
        self.surrogate = GaussianProcess::new(
            self.config.length_scale,
            self.config.noise,
            self.config.solver_sweeps,
        );

        let ranges = self.core.ranges().clone();
        let dimensions = ranges.len();
        let total = self.config.max_iterations;
        let mut rng = create_rng(self.config.seed);
        tracing::info!(
            iterations = total,
            initial_samples = self.config.initial_samples,
            acquisition = ?self.config.acquisition,
            objective = %self.core.target(),
            "Bayesian search started"
        );

        for iteration in 1..=total {
            let exploring = iteration <= self.config.initial_samples || self.observations.is_empty();
            let point = if exploring {
                Self::random_point(dimensions, &mut rng)
            } else {
                self.suggest(dimensions, &mut rng)
            };
            let parameters = denormalize(&ranges, &point);

            let (fitness, result) = self.core.evaluate(factory, &parameters).await;
            self.core.record("bayesian", parameters.clone(), fitness, result);
            self.observe(point, fitness);

            let status = if exploring {
                "initial sampling"
            } else {
                "acquisition"
            };
            self.core.report(iteration, total, fitness, &parameters, status);
        }

        tracing::info!(
            observations = self.observations.len(),
            best_fitness = self.core.best_fitness(),
            best_parameters = ?self.core.best_parameters(),
            "Bayesian search finished"
        );
        Ok(())
    }
}
