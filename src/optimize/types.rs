//! Optimizer types

use crate::backtest::BacktestResult;
use crate::strategy::ParameterSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Search bounds per parameter name
pub type ParameterRanges = BTreeMap<String, ParameterRange>;

/// Inclusive `[min, max]` bounds for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    /// Create a range
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Finite bounds with `min <= max`
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    /// max - min
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Clamp a value into the range
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Uniform sample from the range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.width() <= 0.0 {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    /// Map a value to `[0, 1]`
    pub fn normalize(&self, value: f64) -> f64 {
        if self.width() <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / self.width()).clamp(0.0, 1.0)
    }

    /// Map a `[0, 1]` value back into the range
    pub fn denormalize(&self, unit: f64) -> f64 {
        self.clamp(self.min + unit * self.width())
    }
}

impl From<(f64, f64)> for ParameterRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self::new(min, max)
    }
}

/// Draw one uniform assignment from every range
pub fn sample_parameters<R: Rng + ?Sized>(ranges: &ParameterRanges, rng: &mut R) -> ParameterSet {
    ranges
        .iter()
        .map(|(name, range)| (name.clone(), range.sample(rng)))
        .collect()
}

/// Metric extracted from a backtest result as fitness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationTarget {
    #[default]
    Sharpe,
    Return,
    WinRate,
    ProfitFactor,
}

impl OptimizationTarget {
    /// Parse a target name, falling back to Sharpe for unknown names
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sharpe" | "sharpe_ratio" => Self::Sharpe,
            "return" | "total_return" => Self::Return,
            "win_rate" => Self::WinRate,
            "profit_factor" => Self::ProfitFactor,
            other => {
                tracing::warn!(name = other, "Unknown optimization target, using sharpe");
                Self::Sharpe
            }
        }
    }

    /// Extract the fitness from a result
    pub fn fitness(&self, result: &BacktestResult) -> f64 {
        let value = match self {
            Self::Sharpe => result.sharpe_ratio,
            Self::Return => result.total_return,
            Self::WinRate => result.win_rate,
            Self::ProfitFactor => result.profit_factor,
        };
        sanitize_fitness(value)
    }
}

impl fmt::Display for OptimizationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sharpe => "sharpe",
            Self::Return => "return",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
        };
        f.write_str(name)
    }
}

/// NaN becomes negative infinity so it never wins a comparison
pub fn sanitize_fitness(value: f64) -> f64 {
    if value.is_nan() {
        f64::NEG_INFINITY
    } else {
        value
    }
}

/// One evaluated candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Parameter assignment
    pub parameters: ParameterSet,
    /// Fitness (negative infinity if the backtest failed)
    pub fitness: f64,
    /// Backtest result, absent if the backtest failed
    pub result: Option<BacktestResult>,
}

/// Snapshot reported after every evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationProgress {
    pub current_iteration: usize,
    pub total_iterations: usize,
    pub current_fitness: f64,
    pub best_fitness: f64,
    pub current_parameters: ParameterSet,
    pub best_parameters: ParameterSet,
    /// Human-readable phase
    pub status: String,
    /// current / total in `[0, 1]`
    pub progress: f64,
}

/// Callback receiving optimizer progress
pub type OptimizationProgressCallback = Box<dyn FnMut(&OptimizationProgress) + Send>;

/// Optimizer errors
#[derive(Debug, Error, PartialEq)]
pub enum OptimizeError {
    #[error("no parameter ranges set")]
    NoParameterRanges,

    #[error("optimizer not initialized with a base config")]
    NotInitialized,

    #[error("no data source set")]
    MissingDataSource,

    #[error("invalid range for {name}: [{min}, {max}]")]
    InvalidRange { name: String, min: f64, max: f64 },
}
