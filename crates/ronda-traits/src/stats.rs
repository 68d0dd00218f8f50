//! Statistical utility functions for cross-sectional processing.
//!
//! Non-finite inputs never panic: they are excluded from statistics and map
//! to `NaN` in element-wise outputs.

use statrs::distribution::{ContinuousCDF, Normal};

/// Standard deviations below this are zero variance; ratios that divide by
/// them are `NaN`.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Fractional rank of each value among the finite values of the slice.
///
/// Ties receive the average of the ranks they span (1-based), and the rank is
/// divided by `count + 1` so results lie strictly inside `(0, 1)`.
/// Non-finite inputs produce `NaN` and do not count.
///
/// # Examples
///
/// ```
/// use ronda_traits::stats::fractional_rank;
///
/// let ranks = fractional_rank(&[10.0, 20.0, 5.0, 15.0]);
/// assert_eq!(ranks, vec![0.4, 0.8, 0.2, 0.6]);
/// ```
pub fn fractional_rank(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| values[i].is_finite())
        .collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let count = order.len();
    let denominator = (count + 1) as f64;
    let mut ranks = vec![f64::NAN; values.len()];

    let mut start = 0;
    while start < count {
        let mut end = start + 1;
        while end < count && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = average / denominator;
        }
        start = end;
    }
    ranks
}

/// Inverse of the standard normal CDF. Returns `NaN` outside `(0, 1)`.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    Normal::new(0.0, 1.0)
        .map(|normal| normal.inverse_cdf(p))
        .unwrap_or(f64::NAN)
}

/// Mean of the finite values, `NaN` when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Sample standard deviation (N-1 denominator) of the finite values,
/// `NaN` with fewer than two observations.
pub fn nan_std(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().filter(|v| v.is_finite()).copied().collect();
    let n = finite.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = finite.iter().sum::<f64>() / n as f64;
    let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Sum of absolute values of the finite entries.
pub fn abs_sum(values: &[f64]) -> f64 {
    values.iter().filter(|v| v.is_finite()).map(|v| v.abs()).sum()
}
