//! Performance indicators of a net return series.
//!
//! Every indicator is NaN-safe: degenerate inputs (empty series, a single
//! observation, zero volatility, no drawdown) produce `NaN` instead of an
//! error or a panic.

use ronda_traits::stats::MIN_STD_THRESHOLD;
use serde::{Deserialize, Serialize};

/// Configuration for indicator calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Number of trading days per year for annualization
    pub annual_days: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { annual_days: 250 }
    }
}

/// Indicator names in report order.
pub const INDICATORS: [&str; 8] = [
    "sharpe",
    "calmar",
    "hpr",
    "retMean",
    "retStd",
    "retAnnual",
    "volAnnual",
    "mdd",
];

/// Indicators of one net return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    /// Holding period return, `Π(1 + r) - 1`
    pub hpr: f64,
    /// Mean per-period return
    pub ret_mean: f64,
    /// Sample standard deviation of per-period returns
    pub ret_std: f64,
    /// Annualized mean return
    pub ret_annual: f64,
    /// Annualized volatility
    pub vol_annual: f64,
    /// Annualized return over annualized volatility, `NaN` when the
    /// per-period deviation is below [`MIN_STD_THRESHOLD`]
    pub sharpe: f64,
    /// Annualized return over maximum drawdown
    pub calmar: f64,
    /// Maximum peak-to-trough decline of the NAV
    pub mdd: f64,
}

impl Indicators {
    /// Calculates all indicators from per-period net returns.
    ///
    /// Non-finite returns are skipped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ronda_eval::{Indicators, MetricsConfig};
    ///
    /// let ind = Indicators::calculate(&[0.01, -0.02, 0.015], &MetricsConfig::default());
    /// assert!(ind.sharpe.is_finite());
    /// ```
    pub fn calculate(returns: &[f64], config: &MetricsConfig) -> Self {
        let valid: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
        let n = valid.len();
        let annual = config.annual_days as f64;

        let hpr = if n == 0 {
            f64::NAN
        } else {
            valid.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
        };
        let ret_mean = if n == 0 {
            f64::NAN
        } else {
            valid.iter().sum::<f64>() / n as f64
        };
        let ret_std = if n < 2 {
            f64::NAN
        } else {
            let var = valid.iter().map(|r| (r - ret_mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        };

        let ret_annual = ret_mean * annual;
        let vol_annual = ret_std * annual.sqrt();
        let sharpe = if ret_std < MIN_STD_THRESHOLD {
            f64::NAN
        } else {
            ratio(ret_annual, vol_annual)
        };
        let mdd = if n == 0 { f64::NAN } else { max_drawdown(&nav_curve(&valid)) };

        Self {
            hpr,
            ret_mean,
            ret_std,
            ret_annual,
            vol_annual,
            sharpe,
            calmar: ratio(ret_annual, mdd),
            mdd,
        }
    }

    /// Indicator values in [`INDICATORS`] order.
    pub const fn values(&self) -> [f64; INDICATORS.len()] {
        [
            self.sharpe,
            self.calmar,
            self.hpr,
            self.ret_mean,
            self.ret_std,
            self.ret_annual,
            self.vol_annual,
            self.mdd,
        ]
    }
}

/// `num / den`, `NaN` when the denominator is zero or not finite.
fn ratio(num: f64, den: f64) -> f64 {
    if den.is_finite() && den.abs() > 0.0 {
        num / den
    } else {
        f64::NAN
    }
}

/// Cumulative NAV `Π(1 + r)` starting from 1.0 before the first return.
pub fn nav_curve(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |nav, r| {
            *nav *= 1.0 + r;
            Some(*nav)
        })
        .collect()
}

/// Maximum relative decline from a running peak of `nav`.
///
/// The base value 1.0 counts as the first peak, so a series that only loses
/// from the start still reports its drawdown.
pub fn max_drawdown(nav: &[f64]) -> f64 {
    let mut peak = 1.0_f64;
    let mut mdd = 0.0_f64;
    for &v in nav {
        if !v.is_finite() {
            continue;
        }
        peak = peak.max(v);
        if peak > 0.0 {
            mdd = mdd.max((peak - v) / peak);
        }
    }
    mdd
}
