//! Gaussian-process surrogate for Bayesian search
//!
//! Inputs are expected in the unit hypercube. Linear systems are solved with
//! a fixed number of Gauss-Seidel sweeps, which is approximate but stable for
//! the small, diagonally dominated kernel matrices seen here.

use std::f64::consts::{PI, SQRT_2};

/// Gaussian-process regression with an RBF kernel
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    length_scale: f64,
    noise: f64,
    sweeps: usize,
    inputs: Vec<Vec<f64>>,
    outputs: Vec<f64>,
    prior_mean: f64,
    kernel_matrix: Vec<Vec<f64>>,
    alpha: Vec<f64>,
}

impl GaussianProcess {
    /// Create an unfitted process
    pub fn new(length_scale: f64, noise: f64, sweeps: usize) -> Self {
        Self {
            length_scale,
            noise,
            sweeps,
            inputs: vec![],
            outputs: vec![],
            prior_mean: 0.0,
            kernel_matrix: vec![],
            alpha: vec![],
        }
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether no observations have been fitted
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Squared-exponential kernel
    pub fn kernel(&self, a: &[f64], b: &[f64]) -> f64 {
        let squared: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
        (-squared / (2.0 * self.length_scale * self.length_scale)).exp()
    }

    /// Fit to observations, replacing any previous fit
    pub fn fit(&mut self, inputs: Vec<Vec<f64>>, outputs: Vec<f64>) {
        let n = inputs.len().min(outputs.len());
        self.inputs = inputs;
        self.outputs = outputs;
        self.inputs.truncate(n);
        self.outputs.truncate(n);

        self.prior_mean = if n == 0 {
            0.0
        } else {
            self.outputs.iter().sum::<f64>() / n as f64
        };

        self.kernel_matrix = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let k = self.kernel(&self.inputs[i], &self.inputs[j]);
                        if i == j {
                            k + self.noise
                        } else {
                            k
                        }
                    })
                    .collect()
            })
            .collect();

        let centered: Vec<f64> = self.outputs.iter().map(|y| y - self.prior_mean).collect();
        self.alpha = gauss_seidel(&self.kernel_matrix, &centered, self.sweeps);
    }

    /// Posterior mean and variance at a point
    ///
    /// Without observations this is the prior: mean 0, variance 1.
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        if self.inputs.is_empty() {
            return (0.0, 1.0);
        }

        let k_star: Vec<f64> = self.inputs.iter().map(|xi| self.kernel(xi, x)).collect();
        let mean = self.prior_mean + dot(&k_star, &self.alpha);

        let v = gauss_seidel(&self.kernel_matrix, &k_star, self.sweeps);
        let variance = (self.kernel(x, x) - dot(&k_star, &v)).max(1e-12);
        (mean, variance)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Fixed-sweep Gauss-Seidel solve of `a * x = b`, starting from zero
fn gauss_seidel(a: &[Vec<f64>], b: &[f64], sweeps: usize) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    for _ in 0..sweeps {
        for i in 0..n {
            let diagonal = a[i][i];
            if diagonal == 0.0 {
                continue;
            }
            let off_diagonal: f64 = (0..n).filter(|&j| j != i).map(|j| a[i][j] * x[j]).sum();
            x[i] = (b[i] - off_diagonal) / diagonal;
        }
    }
    x
}

/// Standard normal CDF approximation (Abramowitz and Stegun)
pub fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / SQRT_2;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Standard normal density
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}
