//! Core trait definition for portfolio optimizers.

use ndarray::{Array1, Array2, Axis};
use ronda_traits::{Result, RondaError};

/// Turns a window of candidate returns into allocation weights.
///
/// Rows of the input are dates, columns are candidates. Implementations
/// must be thread-safe (Send + Sync) so groups can be optimized in parallel.
///
/// # Examples
///
/// ```rust,no_run
/// use ndarray::{Array1, Array2};
/// use ronda_optimize::PortfolioOptimizer;
///
/// struct LongFirst;
///
/// impl PortfolioOptimizer for LongFirst {
///     fn optimize(&self, returns: &Array2<f64>) -> ronda_traits::Result<Array1<f64>> {
///         let mut w = Array1::zeros(returns.ncols());
///         w[0] = 1.0;
///         Ok(w)
///     }
///
///     fn name(&self) -> &str {
///         "long_first"
///     }
/// }
/// ```
pub trait PortfolioOptimizer: Send + Sync {
    /// Computes one weight per column of `returns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is degenerate or the solver does not
    /// converge. Callers fall back to equal weights.
    fn optimize(&self, returns: &Array2<f64>) -> Result<Array1<f64>>;

    /// Name of this optimizer, used in logs.
    fn name(&self) -> &str;
}

/// Sample mean vector and covariance matrix (ddof = 1) of the columns.
///
/// # Errors
///
/// Returns [`RondaError::InsufficientData`] with fewer than two rows or no
/// columns and [`RondaError::InvalidData`] if any value is non-finite.
pub fn sample_moments(returns: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let (n, p) = returns.dim();
    if n < 2 || p == 0 {
        return Err(RondaError::InsufficientData(format!(
            "need at least 2 rows and 1 candidate, got {n}x{p}"
        )));
    }
    if returns.iter().any(|v| !v.is_finite()) {
        return Err(RondaError::InvalidData("non-finite candidate return".into()));
    }

    let mu = returns
        .mean_axis(Axis(0))
        .ok_or_else(|| RondaError::InsufficientData("empty return window".into()))?;
    let centered = returns - &mu;
    let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
    Ok((mu, cov))
}

/// Checks that `cov` is positive definite with a Cholesky factorization.
///
/// Pivots below a tolerance relative to the largest diagonal entry count as
/// singular.
pub fn is_positive_definite(cov: &Array2<f64>) -> bool {
    let p = cov.nrows();
    if p == 0 || cov.ncols() != p {
        return false;
    }
    let scale = cov.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale.is_nan() || scale <= 0.0 {
        return false;
    }
    let tol = scale * 1e-12;

    let mut l = Array2::<f64>::zeros((p, p));
    for j in 0..p {
        let mut pivot = cov[[j, j]];
        for k in 0..j {
            pivot -= l[[j, k]] * l[[j, k]];
        }
        if pivot.is_nan() || pivot <= tol {
            return false;
        }
        let root = pivot.sqrt();
        l[[j, j]] = root;
        for i in (j + 1)..p {
            let mut v = cov[[i, j]];
            for k in 0..j {
                v -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = v / root;
        }
    }
    true
}
