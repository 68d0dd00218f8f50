//! Equal-weight allocation, also the fallback of every other optimizer.

use ndarray::{Array1, Array2};
use ronda_traits::{Result, RondaError};

use crate::optimizer::PortfolioOptimizer;

/// Allocates `1 / p` to each of `p` candidates regardless of their returns.
///
/// # Examples
///
/// ```rust,no_run
/// use ndarray::Array2;
/// use ronda_optimize::{EqualWeight, PortfolioOptimizer};
///
/// let returns = Array2::<f64>::zeros((10, 4));
/// let w = EqualWeight.optimize(&returns).unwrap();
/// assert_eq!(w[0], 0.25);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWeight;

impl EqualWeight {
    /// Equal weights for `p` candidates.
    pub fn weights(p: usize) -> Array1<f64> {
        Array1::from_elem(p, 1.0 / p.max(1) as f64)
    }
}

impl PortfolioOptimizer for EqualWeight {
    fn optimize(&self, returns: &Array2<f64>) -> Result<Array1<f64>> {
        if returns.ncols() == 0 {
            return Err(RondaError::InsufficientData("no candidates".into()));
        }
        Ok(Self::weights(returns.ncols()))
    }

    fn name(&self) -> &str {
        "equal_weight"
    }
}
