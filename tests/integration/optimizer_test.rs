//! Optimizers driving the crossover strategy

use crate::common::{crossover, crossover_config, source, zigzag_prices};
use backtest_lab::optimize::{
    BayesianConfig, BayesianOptimizer, GeneticAlgorithmOptimizer, GeneticConfig,
    GridSearchConfig, GridSearchOptimizer, OptimizationTarget, ParameterOptimizer,
    ParameterRange, ParameterRanges, RandomSearchConfig, RandomSearchOptimizer,
};

fn period_ranges() -> ParameterRanges {
    [
        ("fast_period".to_string(), ParameterRange::new(2.0, 4.0)),
        ("slow_period".to_string(), ParameterRange::new(6.0, 10.0)),
    ]
    .into_iter()
    .collect()
}

fn prepare(optimizer: &mut dyn ParameterOptimizer) {
    optimizer.initialize(crossover_config(3.0, 8.0));
    optimizer.set_data_source(source(&zigzag_prices()));
    optimizer.set_parameter_ranges(period_ranges());
    optimizer.set_optimization_target(OptimizationTarget::Return);
}

fn assert_best_is_a_trial(optimizer: &dyn ParameterOptimizer) {
    let best = optimizer.best_parameters();
    let best_fitness = optimizer.best_fitness();
    assert!(optimizer
        .trials()
        .iter()
        .any(|t| t.parameters == best && t.fitness == best_fitness));
    assert!(optimizer.trials().iter().all(|t| t.fitness <= best_fitness));
}

#[tokio::test]
async fn test_grid_search_full_grid() {
    let mut optimizer = GridSearchOptimizer::new(GridSearchConfig {
        max_iterations: 100,
        steps: 2,
        min_step: 0.001,
    });
    prepare(&mut optimizer);
    optimizer.optimize(&crossover).await.unwrap();

    // 3 fast values x 3 slow values
    assert_eq!(optimizer.trials().len(), 9);
    assert_eq!(optimizer.results().len(), 9);
    assert_best_is_a_trial(&optimizer);
}

#[tokio::test]
async fn test_genetic_search_respects_bounds() {
    let mut optimizer = GeneticAlgorithmOptimizer::new(GeneticConfig {
        population_size: 6,
        max_iterations: 3,
        seed: Some(11),
        ..Default::default()
    });
    prepare(&mut optimizer);
    optimizer.optimize(&crossover).await.unwrap();

    assert!(!optimizer.trials().is_empty());
    assert!(optimizer.trials().iter().all(|t| {
        (2.0..=4.0).contains(&t.parameters["fast_period"])
            && (6.0..=10.0).contains(&t.parameters["slow_period"])
    }));
    assert_best_is_a_trial(&optimizer);
}

#[tokio::test]
async fn test_random_and_bayesian_evaluate_budget() {
    let mut random = RandomSearchOptimizer::new(RandomSearchConfig {
        max_iterations: 6,
        seed: Some(3),
    });
    prepare(&mut random);
    random.optimize(&crossover).await.unwrap();
    assert_eq!(random.trials().len(), 6);
    assert_best_is_a_trial(&random);

    let mut bayesian = BayesianOptimizer::new(BayesianConfig {
        max_iterations: 7,
        initial_samples: 3,
        candidates: 100,
        seed: Some(3),
        ..Default::default()
    });
    prepare(&mut bayesian);
    bayesian.optimize(&crossover).await.unwrap();
    assert_eq!(bayesian.trials().len(), 7);
    assert_best_is_a_trial(&bayesian);
}

#[tokio::test]
async fn test_optimizer_can_run_twice() {
    let mut optimizer = RandomSearchOptimizer::new(RandomSearchConfig {
        max_iterations: 3,
        seed: Some(9),
    });
    prepare(&mut optimizer);
    optimizer.optimize(&crossover).await.unwrap();
    optimizer.optimize(&crossover).await.unwrap();

    // Results from the first search are cleared
    assert_eq!(optimizer.trials().len(), 3);
}
