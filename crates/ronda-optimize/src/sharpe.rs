//! Bounded maximum-Sharpe allocation.

use ndarray::{Array1, Array2};
use ronda_traits::{Result, RondaError};
use serde::{Deserialize, Serialize};

use crate::equal_weight::EqualWeight;
use crate::optimizer::{PortfolioOptimizer, is_positive_definite, sample_moments};

/// Configuration for the max-Sharpe solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxSharpeConfig {
    /// Each weight lies in `[-bound_scale / p, bound_scale / p]`.
    pub bound_scale: f64,

    /// Maximum number of gradient steps before giving up.
    pub max_iter: usize,

    /// Convergence threshold on the norm of the projected step.
    pub tolerance: f64,
}

impl Default for MaxSharpeConfig {
    fn default() -> Self {
        Self {
            bound_scale: 1.5,
            max_iter: 2_000,
            tolerance: 1e-10,
        }
    }
}

/// Maximizes `w·mu / sqrt(w·cov·w)` inside a symmetric box.
///
/// The solver is projected gradient ascent started from equal weights with
/// Armijo backtracking. A covariance that is not positive definite, a
/// non-finite input or running out of iterations is reported as an error.
///
/// # Examples
///
/// ```rust,no_run
/// use ndarray::array;
/// use ronda_optimize::{MaxSharpe, PortfolioOptimizer};
///
/// let returns = array![[0.01, 0.002], [0.015, -0.001], [-0.004, 0.003], [0.02, 0.0]];
/// let w = MaxSharpe::default().optimize(&returns).unwrap();
/// assert!(w.iter().all(|x| x.abs() <= 0.75 + 1e-12));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MaxSharpe {
    config: MaxSharpeConfig,
}

impl MaxSharpe {
    /// Create a new solver with the given configuration.
    #[must_use]
    pub const fn new(config: MaxSharpeConfig) -> Self {
        Self { config }
    }

    /// Upper bound on the absolute weight of each of `p` candidates.
    pub fn bound(&self, p: usize) -> f64 {
        self.config.bound_scale / p.max(1) as f64
    }

    /// Solves for the given moments.
    pub fn solve(&self, mu: &Array1<f64>, cov: &Array2<f64>) -> Result<Array1<f64>> {
        let p = mu.len();
        if !is_positive_definite(cov) {
            return Err(RondaError::Optimization(
                "covariance is not positive definite".into(),
            ));
        }
        let bound = self.bound(p);
        let project = |w: Array1<f64>| w.mapv(|x| x.clamp(-bound, bound));

        let mut w = EqualWeight::weights(p);
        let (mut value, mut grad) = sharpe_and_gradient(&w, mu, cov);
        let mut step = 1.0;

        for _ in 0..self.config.max_iter {
            let mut accepted = None;
            let mut trial_step = step;
            for _ in 0..60 {
                let candidate = project(&w + &(&grad * trial_step));
                let delta = &candidate - &w;
                let (trial_value, _) = sharpe_and_gradient(&candidate, mu, cov);
                // Armijo sufficient increase along the projected arc
                if trial_value.is_finite() && trial_value >= value + 1e-4 * grad.dot(&delta) {
                    accepted = Some((candidate, delta, trial_step));
                    break;
                }
                trial_step *= 0.5;
            }

            let Some((next, delta, used)) = accepted else {
                return Ok(w);
            };
            let moved = delta.dot(&delta).sqrt();
            let (next_value, next_grad) = sharpe_and_gradient(&next, mu, cov);
            let gained = next_value - value;
            w = next;
            value = next_value;
            grad = next_grad;
            step = (used * 2.0).min(1e6);

            if moved < self.config.tolerance || gained.abs() < self.config.tolerance * value.abs().max(1.0) {
                return Ok(w);
            }
        }

        Err(RondaError::Optimization(format!(
            "no convergence after {} iterations",
            self.config.max_iter
        )))
    }
}

impl PortfolioOptimizer for MaxSharpe {
    fn optimize(&self, returns: &Array2<f64>) -> Result<Array1<f64>> {
        let (mu, cov) = sample_moments(returns)?;
        self.solve(&mu, &cov)
    }

    fn name(&self) -> &str {
        "max_sharpe"
    }
}

/// Sharpe ratio of `w` and its gradient. A zero-variance portfolio yields
/// `NaN` and a zero gradient.
fn sharpe_and_gradient(w: &Array1<f64>, mu: &Array1<f64>, cov: &Array2<f64>) -> (f64, Array1<f64>) {
    let cw = cov.dot(w);
    let var = w.dot(&cw);
    if var.is_nan() || var <= 0.0 {
        return (f64::NAN, Array1::zeros(w.len()));
    }
    let sigma = var.sqrt();
    let ret = w.dot(mu);
    let grad = mu / sigma - &cw * (ret / (var * sigma));
    (ret / sigma, grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;

    fn sharpe(w: &Array1<f64>, mu: &Array1<f64>, cov: &Array2<f64>) -> f64 {
        sharpe_and_gradient(w, mu, cov).0
    }

    #[test]
    fn test_uncorrelated_long_short() {
        let mu = array![0.01, -0.01];
        let cov = array![[1e-4, 0.0], [0.0, 1e-4]];
        let w = MaxSharpe::default().solve(&mu, &cov).unwrap();
        assert!(w[0] > 0.0);
        assert!(w[1] < 0.0);
        // unconstrained optimum is w ∝ cov⁻¹·mu, Sharpe sqrt(mu·cov⁻¹·mu)
        assert_abs_diff_eq!(sharpe(&w, &mu, &cov), 2.0_f64.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_improves_on_equal_weight() {
        let mu = array![0.02, 0.005, 0.01];
        let cov = array![[4e-4, 1e-4, 0.0], [1e-4, 1e-4, 0.0], [0.0, 0.0, 2e-4]];
        let w = MaxSharpe::default().solve(&mu, &cov).unwrap();
        let eq = EqualWeight::weights(3);
        assert!(sharpe(&w, &mu, &cov) >= sharpe(&eq, &mu, &cov) - 1e-12);
        assert!(w.iter().all(|x| x.abs() <= 0.5 + 1e-12));
    }

    #[test]
    fn test_singular_covariance_fails() {
        let returns = array![[0.01, 0.01], [0.02, 0.02], [-0.01, -0.01]];
        let err = MaxSharpe::default().optimize(&returns).unwrap_err();
        assert!(matches!(err, RondaError::Optimization(_)));
    }

    #[test]
    fn test_too_few_rows_fails() {
        let returns = array![[0.01, 0.02]];
        assert!(MaxSharpe::default().optimize(&returns).is_err());
    }

    proptest! {
        #[test]
        fn test_weights_within_bounds(
            rows in prop::collection::vec(prop::collection::vec(-0.05f64..0.05, 3), 5..30)
        ) {
            let n = rows.len();
            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            let returns = Array2::from_shape_vec((n, 3), flat).unwrap();
            let solver = MaxSharpe::default();
            let w = solver.optimize(&returns).unwrap_or_else(|_| EqualWeight::weights(3));
            for x in &w {
                prop_assert!(x.abs() <= solver.bound(3) + 1e-12);
            }
        }
    }
}
