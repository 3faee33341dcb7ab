//! Genetic algorithm search

use super::{
    create_rng, sample_parameters, OptimizeError, OptimizerCore, ParameterOptimizer,
    ParameterRanges,
};
use crate::backtest::BacktestResult;
use crate::strategy::{ParameterSet, StrategyFactory};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Genetic algorithm settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    /// Individuals per generation
    pub population_size: usize,
    /// Top individuals copied unchanged into the next generation
    pub elite_count: usize,
    /// Candidates drawn per tournament
    pub tournament_size: usize,
    /// Probability of BLX crossover (otherwise one parent is copied)
    pub crossover_rate: f64,
    /// Per-gene mutation probability
    pub mutation_rate: f64,
    /// BLX-alpha expansion factor
    pub blx_alpha: f64,
    /// Mutation standard deviation as a fraction of the range width
    pub mutation_scale: f64,
    /// Maximum number of generations
    pub max_iterations: usize,
    /// Generations over which improvement is measured
    pub convergence_generations: usize,
    /// Improvement below this stops the search
    pub convergence_threshold: f64,
    /// Drawdown above this reduces fitness in proportion to the drawdown
    pub drawdown_penalty_threshold: f64,
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            elite_count: 2,
            tournament_size: 3,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            blx_alpha: 0.5,
            mutation_scale: 0.1,
            max_iterations: 50,
            convergence_generations: 5,
            convergence_threshold: 0.001,
            drawdown_penalty_threshold: 0.3,
            seed: None,
        }
    }
}

/// Reduce fitness by `|fitness| * max_drawdown` when drawdown exceeds the threshold
///
/// Positive fitness is scaled by `(1 - max_drawdown)`. Negative fitness moves
/// further below zero, so a deeper drawdown never scores better. Drawdown is
/// clamped to `[0, 1]`.
pub fn apply_drawdown_penalty(fitness: f64, max_drawdown: f64, threshold: f64) -> f64 {
    if max_drawdown > threshold {
        fitness - fitness.abs() * max_drawdown.clamp(0.0, 1.0)
    } else {
        fitness
    }
}

/// One member of the population
#[derive(Debug, Clone)]
struct Individual {
    parameters: ParameterSet,
    fitness: f64,
    result: Option<BacktestResult>,
}

/// Evolves a population of parameter assignments
pub struct GeneticAlgorithmOptimizer {
    core: OptimizerCore,
    config: GeneticConfig,
    generations_run: usize,
}

impl GeneticAlgorithmOptimizer {
    /// Create a genetic optimizer
    pub fn new(config: GeneticConfig) -> Self {
        Self {
            core: OptimizerCore::new(),
            config,
            generations_run: 0,
        }
    }

    /// Generations evaluated by the last search
    pub fn generations_run(&self) -> usize {
        self.generations_run
    }

    async fn evaluate(
        &mut self,
        factory: &dyn StrategyFactory,
        parameters: ParameterSet,
    ) -> Individual {
        let (raw, result) = self.core.evaluate(factory, &parameters).await;
        let threshold = self.config.drawdown_penalty_threshold;
        let fitness = match &result {
            Some(r) => apply_drawdown_penalty(raw, r.max_drawdown, threshold),
            None => raw,
        };
        self.core.record("genetic", parameters.clone(), fitness, result.clone());
        Individual {
            parameters,
            fitness,
            result,
        }
    }

    fn tournament<'a>(&self, population: &'a [Individual], rng: &mut StdRng) -> &'a Individual {
        let mut best = &population[rng.gen_range(0..population.len())];
        for _ in 1..self.config.tournament_size.max(1) {
            let challenger = &population[rng.gen_range(0..population.len())];
            if challenger.fitness > best.fitness {
                best = challenger;
            }
        }
        best
    }

    fn crossover(
        &self,
        ranges: &ParameterRanges,
        a: &ParameterSet,
        b: &ParameterSet,
        rng: &mut StdRng,
    ) -> ParameterSet {
        ranges
            .iter()
            .map(|(name, range)| {
                let x = a.get(name).copied().unwrap_or(range.min);
                let y = b.get(name).copied().unwrap_or(range.min);
                let spread = (x - y).abs() * self.config.blx_alpha;
                let low = x.min(y) - spread;
                let high = x.max(y) + spread;
                let gene = if high > low {
                    rng.gen_range(low..=high)
                } else {
                    low
                };
                (name.clone(), range.clamp(gene))
            })
            .collect()
    }

    fn mutate(&self, ranges: &ParameterRanges, child: &mut ParameterSet, rng: &mut StdRng) {
        for (name, range) in ranges {
            if !rng.gen_bool(self.config.mutation_rate.clamp(0.0, 1.0)) {
                continue;
            }
            let sigma = range.width() * self.config.mutation_scale;
            let Ok(noise) = Normal::new(0.0, sigma) else {
                continue;
            };
            if let Some(gene) = child.get_mut(name) {
                *gene = range.clamp(*gene + noise.sample(rng));
            }
        }
    }

    fn converged(&self, history: &[f64]) -> bool {
        let window = self.config.convergence_generations;
        if window == 0 || history.len() <= window {
            return false;
        }
        let latest = history[history.len() - 1];
        let earlier = history[history.len() - 1 - window];
        (latest - earlier).abs() < self.config.convergence_threshold
    }
}

impl Default for GeneticAlgorithmOptimizer {
    fn default() -> Self {
        Self::new(GeneticConfig::default())
    }
}

fn sort_descending(population: &mut [Individual]) {
    population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
}

#[async_trait]
impl ParameterOptimizer for GeneticAlgorithmOptimizer {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn core(&self) -> &OptimizerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OptimizerCore {
        &mut self.core
    }

    async fn optimize(&mut self, factory: &dyn StrategyFactory) -> Result<(), OptimizeError> {
        self.core.begin()?;
        self.generations_run = 0;

        let ranges = self.core.ranges().clone();
        let population_size = self.config.population_size.max(1);
        let elite_count = self.config.elite_count.min(population_size);
        let generations = self.config.max_iterations.max(1);
        let mut rng = create_rng(self.config.seed);

        tracing::info!(
            population = population_size,
            generations,
            objective = %self.core.target(),
            "Genetic search started"
        );

        let mut population = Vec::with_capacity(population_size);
        for _ in 0..population_size {
            let parameters = sample_parameters(&ranges, &mut rng);
            population.push(self.evaluate(factory, parameters).await);
        }

        let mut history = vec![];
        for generation in 1..=generations {
            sort_descending(&mut population);
            self.generations_run = generation;
            let leader = population[0].clone();
            history.push(leader.fitness);
            self.core.report(
                generation,
                generations,
                leader.fitness,
                &leader.parameters,
                &format!("generation {generation}"),
            );
            tracing::debug!(
                generation,
                best = leader.fitness,
                trades = leader.result.as_ref().map_or(0, |r| r.trade_count),
                "Generation evaluated"
            );

            if generation == generations {
                break;
            }
            if self.converged(&history) {
                tracing::info!(generation, "Genetic search converged");
                break;
            }

            let mut next: Vec<Individual> = population[..elite_count].to_vec();
            while next.len() < population_size {
                let first = self.tournament(&population, &mut rng).parameters.clone();
                let second = self.tournament(&population, &mut rng).parameters.clone();
                let mut child = if rng.gen_bool(self.config.crossover_rate.clamp(0.0, 1.0)) {
                    self.crossover(&ranges, &first, &second, &mut rng)
                } else {
                    first
                };
                self.mutate(&ranges, &mut child, &mut rng);
                next.push(self.evaluate(factory, child).await);
            }
            population = next;
        }

        tracing::info!(
            generations = self.generations_run,
            best_fitness = self.core.best_fitness(),
            best_parameters = ?self.core.best_parameters(),
            "Genetic search finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::BacktestConfig;
    use crate::optimize::test_support::{
        create_price_source, create_test_config, create_test_source, RoundTripStrategy,
    };
    use crate::optimize::{OptimizationTarget, ParameterRange};
    use rand::SeedableRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn create_test_optimizer(config: GeneticConfig) -> GeneticAlgorithmOptimizer {
        let mut optimizer = GeneticAlgorithmOptimizer::new(config);
        optimizer.initialize(create_test_config());
        optimizer.set_data_source(create_test_source());
        let mut ranges = ParameterRanges::new();
        ranges.insert("size".to_string(), ParameterRange::new(1.0, 5.0));
        optimizer.set_parameter_ranges(ranges);
        optimizer.set_optimization_target(OptimizationTarget::Return);
        optimizer
    }

    #[test]
    fn test_drawdown_penalty_halves_fitness() {
        let raw = 2.0;
        let clean = apply_drawdown_penalty(raw, 0.0, 0.3);
        let penalized = apply_drawdown_penalty(raw, 0.5, 0.3);
        assert_eq!(clean, 2.0);
        assert!((penalized - clean * 0.5).abs() < 1e-12);

        // At the threshold no penalty applies
        assert_eq!(apply_drawdown_penalty(raw, 0.3, 0.3), 2.0);
    }

    #[test]
    fn test_drawdown_penalty_never_rewards_losses() {
        // A losing run with a deep drawdown scores below the same loss without one
        let penalized = apply_drawdown_penalty(-1.0, 0.5, 0.3);
        assert!((penalized - -1.5).abs() < 1e-12);
        assert!(apply_drawdown_penalty(-1.0, 0.9, 0.3) < penalized);

        // Drawdown beyond 100% cannot flip the sign
        assert_eq!(apply_drawdown_penalty(2.0, 1.5, 0.3), 0.0);
        assert_eq!(apply_drawdown_penalty(-2.0, 1.5, 0.3), -4.0);
    }

    /// Optimizer over a dummy range whose backtests trade one unit per event
    async fn run_single_generation(prices: &[Decimal]) -> GeneticAlgorithmOptimizer {
        let mut optimizer = GeneticAlgorithmOptimizer::new(GeneticConfig {
            population_size: 3,
            max_iterations: 1,
            seed: Some(5),
            ..Default::default()
        });
        optimizer.initialize(BacktestConfig {
            initial_balance: dec!(100),
            ..create_test_config()
        });
        optimizer.set_data_source(create_price_source(prices));
        let mut ranges = ParameterRanges::new();
        ranges.insert("unused".to_string(), ParameterRange::new(0.0, 1.0));
        optimizer.set_parameter_ranges(ranges);
        optimizer.set_optimization_target(OptimizationTarget::Return);
        optimizer.optimize(&RoundTripStrategy::boxed).await.unwrap();
        optimizer
    }

    #[tokio::test]
    async fn test_evaluation_penalizes_deep_drawdown() {
        // Lose half the balance, then recover to a net gain
        let optimizer =
            run_single_generation(&[dec!(100), dec!(50), dec!(50), dec!(200)]).await;

        assert_eq!(optimizer.trials().len(), 3);
        for trial in optimizer.trials() {
            let result = trial.result.as_ref().unwrap();
            let raw = OptimizationTarget::Return.fitness(result);
            assert!(result.max_drawdown > 0.3);
            assert!(raw > 0.0);
            assert!((trial.fitness - raw * (1.0 - result.max_drawdown)).abs() < 1e-12);
        }
        assert!(optimizer.best_fitness() < OptimizationTarget::Return.fitness(
            optimizer.trials()[0].result.as_ref().unwrap()
        ));
    }

    #[tokio::test]
    async fn test_evaluation_penalizes_losing_drawdown() {
        let optimizer = run_single_generation(&[dec!(100), dec!(50)]).await;

        for trial in optimizer.trials() {
            let result = trial.result.as_ref().unwrap();
            let raw = OptimizationTarget::Return.fitness(result);
            assert!(result.max_drawdown > 0.3);
            assert!(raw < 0.0);
            assert!((trial.fitness - raw * (1.0 + result.max_drawdown)).abs() < 1e-12);
            assert!(trial.fitness < raw);
        }
    }

    #[tokio::test]
    async fn test_shallow_drawdown_not_penalized() {
        let optimizer = run_single_generation(&[dec!(100), dec!(110)]).await;

        for trial in optimizer.trials() {
            let result = trial.result.as_ref().unwrap();
            assert!(result.max_drawdown <= 0.3);
            assert_eq!(trial.fitness, OptimizationTarget::Return.fitness(result));
        }
    }

    #[test]
    fn test_crossover_stays_in_range() {
        let optimizer = GeneticAlgorithmOptimizer::default();
        let mut ranges = ParameterRanges::new();
        ranges.insert("x".to_string(), ParameterRange::new(0.0, 1.0));
        let a: ParameterSet = [("x".to_string(), 0.0)].into_iter().collect();
        let b: ParameterSet = [("x".to_string(), 1.0)].into_iter().collect();

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let child = optimizer.crossover(&ranges, &a, &b, &mut rng);
            assert!((0.0..=1.0).contains(&child["x"]));
        }
    }

    #[test]
    fn test_mutation_clamped() {
        let optimizer = GeneticAlgorithmOptimizer::new(GeneticConfig {
            mutation_rate: 1.0,
            mutation_scale: 10.0,
            ..Default::default()
        });
        let mut ranges = ParameterRanges::new();
        ranges.insert("x".to_string(), ParameterRange::new(-1.0, 1.0));

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let mut child: ParameterSet = [("x".to_string(), 0.0)].into_iter().collect();
            optimizer.mutate(&ranges, &mut child, &mut rng);
            assert!((-1.0..=1.0).contains(&child["x"]));
        }
    }

    #[test]
    fn test_tournament_prefers_fitter() {
        let optimizer = GeneticAlgorithmOptimizer::new(GeneticConfig {
            tournament_size: 50,
            ..Default::default()
        });
        let population: Vec<Individual> = (0..3)
            .map(|i| Individual {
                parameters: [("x".to_string(), i as f64)].into_iter().collect(),
                fitness: i as f64,
                result: None,
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(9);
        // 50 draws from 3 individuals all but guarantees the best is drawn
        assert_eq!(optimizer.tournament(&population, &mut rng).fitness, 2.0);
    }

    #[test]
    fn test_convergence_window() {
        let optimizer = GeneticAlgorithmOptimizer::default();
        assert!(!optimizer.converged(&[1.0, 1.0, 1.0]));
        assert!(optimizer.converged(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0]));
        assert!(!optimizer.converged(&[1.0, 1.0, 1.0, 1.0, 1.0, 2.0]));
    }

    #[tokio::test]
    async fn test_elites_not_reevaluated() {
        let mut optimizer = create_test_optimizer(GeneticConfig {
            population_size: 6,
            elite_count: 2,
            max_iterations: 3,
            convergence_generations: 0,
            seed: Some(42),
            ..Default::default()
        });
        optimizer.optimize(&RoundTripStrategy::boxed).await.unwrap();

        // 6 initial + 2 bred generations of 4 children each
        assert_eq!(optimizer.generations_run(), 3);
        assert_eq!(optimizer.trials().len(), 6 + 2 * 4);
        let best = optimizer.best_parameters()["size"];
        assert!((1.0..=5.0).contains(&best));
        assert!(optimizer.best_fitness() > 0.0);
    }

    #[tokio::test]
    async fn test_converges_on_flat_fitness() {
        let mut optimizer = create_test_optimizer(GeneticConfig {
            population_size: 4,
            max_iterations: 50,
            seed: Some(7),
            ..Default::default()
        });
        // A zero-width range makes every individual identical
        let mut ranges = ParameterRanges::new();
        ranges.insert("size".to_string(), ParameterRange::new(2.0, 2.0));
        optimizer.set_parameter_ranges(ranges);

        optimizer.optimize(&RoundTripStrategy::boxed).await.unwrap();
        assert_eq!(optimizer.generations_run(), 6);
    }

    #[tokio::test]
    async fn test_seeded_runs_repeat() {
        let config = GeneticConfig {
            population_size: 5,
            max_iterations: 2,
            seed: Some(11),
            ..Default::default()
        };
        let mut first = create_test_optimizer(config.clone());
        let mut second = create_test_optimizer(config);
        first.optimize(&RoundTripStrategy::boxed).await.unwrap();
        second.optimize(&RoundTripStrategy::boxed).await.unwrap();

        assert_eq!(first.best_parameters(), second.best_parameters());
        assert_eq!(first.trials().len(), second.trials().len());
    }
}
