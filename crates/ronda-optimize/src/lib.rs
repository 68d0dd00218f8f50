//! Portfolio optimization for Ronda signal groups.
//!
//! This crate turns the simulated return streams of a group of signals into
//! allocation weights. Weights are refreshed on month-end triggers from a
//! trailing window and held until the next refresh.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ndarray::array;
//! use ronda_optimize::{MaxSharpe, PortfolioOptimizer};
//!
//! let returns = array![
//!     [0.010, 0.002, -0.003],
//!     [0.004, -0.001, 0.006],
//!     [-0.002, 0.003, 0.001],
//!     [0.007, 0.000, -0.002],
//! ];
//!
//! let weights = MaxSharpe::default().optimize(&returns).unwrap();
//! ```

mod equal_weight;
mod optimizer;
mod sharpe;
mod walk_forward;

// Re-export main types
pub use equal_weight::EqualWeight;
pub use optimizer::{PortfolioOptimizer, is_positive_definite, sample_moments};
pub use sharpe::{MaxSharpe, MaxSharpeConfig};
pub use walk_forward::{
    CandidateReturns, OptimizeJob, WalkForward, WalkForwardConfig, forward_fill,
};
