//! Simulation and evaluation for Ronda.
//!
//! This crate provides the second half of the pipeline:
//! - NAV accounting of a signal against a forward return, net of turnover cost
//! - NaN-safe performance indicators (Sharpe, Calmar, max drawdown, ...)
//! - Ranked evaluation reports persisted as parquet
//! - SVG charts of cumulative NAV per group
//!
//! # Example
//!
//! ```rust,ignore
//! use ronda_eval::{EvaluationTable, Evaluator, MetricsConfig, Simulation, SortKey};
//!
//! Simulation::new(args.clone(), &sim_dir).run(bgn, stp, &calendar)?;
//!
//! let evaluator = Evaluator::new(&sim_dir, MetricsConfig::default());
//! let table = EvaluationTable::new(vec![evaluator.evaluate(&args, bgn, stp)?], SortKey::Sharpe);
//! table.save(&report_path)?;
//! ```

pub mod evaluator;
pub mod metrics;
pub mod plot;
pub mod simulate;

// Re-export main types
pub use evaluator::{EvalRecord, EvaluationTable, Evaluator, SHARPE_CALMAR, SortKey, report_path};
pub use metrics::{INDICATORS, Indicators, MetricsConfig, max_drawdown, nav_curve};
pub use plot::{NavLine, save_nav_svg, write_nav_svg};
pub use simulate::{NavRecord, Simulation, nav_panel, portfolio_return, simulate, turnover};
