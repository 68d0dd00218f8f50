#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # ronda
//!
//! Cross-sectional factor research pipeline for futures universes.
//!
//! ronda is an umbrella crate that re-exports all ronda sub-crates for
//! convenience. Every stage reads panels from the store over a half-open
//! date range `[bgn, stp)` and appends its output, so batch runs can be
//! resumed window by window.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ronda::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let calendar = Calendar::from_csv("data/calendar.csv")?;
//!
//! // Neutral factor -> signal -> NAV
//! let generator = SignalGenerator::new(SignalGeneratorConfig { maw: 5 });
//! SignalJob::new(input, &signal_dir, "MTM010-NEU.MA05", generator).run(bgn, stp, &calendar)?;
//! Simulation::new(sim_args, &sim_dir).run(bgn, stp, &calendar)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Panels, calendar, identifiers and the error type
//! - [`store`] - Append-only, continuity-checked parquet tables
//! - [`signals`] - Neutralization, test returns, signal generation and blending
//! - [`optimize`] - Walk-forward bounded max-Sharpe allocation
//! - [`eval`] - NAV accounting, indicators, reports and plots
//!
//! ## Architecture
//!
//! 1. **Neutralizer** strips sector and date effects from raw factors and returns
//! 2. **Signal generator** maps neutral factors to dollar-neutral weights
//! 3. **Simulator** rolls weights against forward returns into NAV records
//! 4. **Optimizer** blends groups of simulations into higher-level signals
//! 5. **Evaluator** ranks every simulation by its indicators

/// Version information for the ronda crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Core Types
// ============================================================================

/// Core types shared by every stage.
///
/// # Example
///
/// ```ignore
/// use ronda::traits::{Calendar, TradingCalendar};
/// ```
pub mod traits {
    pub use ronda_traits::*;
}

// Re-export error types
pub use ronda_traits::{Result, RondaError};

// Re-export common types
pub use ronda_traits::{Calendar, CrossSection, Date, Panel, SimArgs, TradingCalendar};

/// Parquet panel store.
pub mod store {
    pub use ronda_store::*;
}

// ============================================================================
// Signals
// ============================================================================

/// Cross-sectional transforms and signal construction.
///
/// ## Neutralization
///
/// ```text
/// z = Φ⁻¹(rank / (count + 1)) - mean(z | date, sector)
/// ```
///
/// ## Long-short weights
///
/// Top half long, bottom half short, scaled to `Σ|w| = 1` before and after
/// the optional moving average.
pub mod signals {
    pub use ronda_signals::*;
}

// ============================================================================
// Optimization
// ============================================================================

/// Walk-forward portfolio optimization.
///
/// Each month-end `T` the trailing window of candidate net returns is solved
/// for
///
/// ```text
/// max (w·mu) / sqrt(w·cov·w)   s.t.   |w_k| <= 1.5 / p
/// ```
///
/// and the weights take effect on the trading day after `T`.
pub mod optimize {
    pub use ronda_optimize::*;
}

// ============================================================================
// Evaluation
// ============================================================================

/// NAV simulation and evaluation.
///
/// ```text
/// net_ret = Σ w·r - cost × Σ|Δw|
/// sharpe  = retAnnual / volAnnual
/// calmar  = retAnnual / mdd
/// ```
pub mod eval {
    pub use ronda_eval::*;
}

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ronda::prelude::*;
/// ```
pub mod prelude {
    pub use crate::eval::{EvaluationTable, Evaluator, MetricsConfig, Simulation, SortKey};
    pub use crate::optimize::{OptimizeJob, WalkForward, WalkForwardConfig};
    pub use crate::signals::{
        BlendJob, NeutralizeJob, Neutralizer, NeutralizerConfig, SignalGenerator,
        SignalGeneratorConfig, SignalJob, TestReturnJob,
    };
    pub use crate::store::{PanelTable, TableSchema, schemas};
    pub use crate::traits::*;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
    }

    type Cell<'a> = &'a dyn Fn(usize, &str) -> f64;

    /// Instrument keyed panel with `f(date index, instrument)` in each column.
    fn panel(dates: &[Date], instruments: &[&str], columns: &[(&str, Cell<'_>)]) -> Panel {
        let mut keys = Vec::new();
        let mut names = Vec::new();
        let mut cols: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
        for (k, date) in dates.iter().enumerate() {
            for &instrument in instruments {
                keys.push(*date);
                names.push(instrument.to_string());
                for (c, (_, f)) in columns.iter().enumerate() {
                    cols[c].push(f(k, instrument));
                }
            }
        }
        let values = columns.iter().map(|(n, _)| n.to_string()).zip(cols).collect();
        Panel::from_columns(&keys, Some(&names), values).unwrap()
    }

    fn read_weights(dir: &Path, id: &str) -> BTreeMap<Date, CrossSection> {
        PanelTable::new(dir, id, schemas::signal())
            .read(&[])
            .unwrap()
            .cross_sections(schemas::WEIGHT)
            .unwrap()
    }

    #[test]
    fn test_four_instrument_pipeline() {
        let root = tempfile::tempdir().unwrap();
        let root = root.path();
        let calendar = Calendar::new(vec![d(2), d(3), d(4), d(5), d(8), d(9), d(10)]);
        let universe = ["A", "B", "C", "D"];
        let sectors: BTreeMap<String, String> = [("A", "X"), ("B", "X"), ("C", "Y"), ("D", "Y")]
            .into_iter()
            .map(|(i, s)| (i.to_string(), s.to_string()))
            .collect();
        let (bgn, stp) = (d(2), d(5));

        // B gains 1% a day at the open, everything else is flat
        let open: Cell<'_> = &|k, i| if i == "B" { 10.0 * 1.01_f64.powi(k as i32) } else { 10.0 };
        let prices = PanelTable::new(root.join("prices"), "prices", schemas::prices());
        prices
            .update(&panel(calendar.dates(), &universe, &[("open", open), ("close", open)]), &calendar)
            .unwrap();

        let ret = ReturnDef::new(PriceAnchor::Opn, 1, 1, ReturnKind::RAW);
        let tst_dir = root.join("test_return");
        TestReturnJob::new(prices, &tst_dir, ret).run(bgn, stp, &calendar).unwrap();

        let level: Cell<'_> = &|_, i| match i {
            "A" => 10.0,
            "B" => 20.0,
            "C" => 5.0,
            _ => 15.0,
        };
        let header = calendar.dates_header(bgn, stp);
        let raw = PanelTable::new(root.join("factors"), "MTM", schemas::factor(&strings(&["MTM010"])));
        raw.update(&panel(&header, &universe, &[("MTM010", level)]), &calendar).unwrap();

        let neu_dir = root.join("neutral");
        let neutral = PanelTable::new(&neu_dir, "MTM", schemas::neutral_factor(&strings(&["MTM010-NEU"])));
        let neutralizer = Neutralizer::new(NeutralizerConfig::default(), sectors);
        NeutralizeJob::new(raw, neutral, vec![("MTM010".into(), "MTM010-NEU".into())], neutralizer)
            .run(bgn, stp, &calendar)
            .unwrap();

        let sig_dir = root.join("signals");
        let generator = SignalGenerator::new(SignalGeneratorConfig::default());
        SignalJob::new(TableRef::new(&neu_dir, "MTM", "MTM010-NEU"), &sig_dir, "MTM010-NEU.MA01", generator)
            .run(bgn, stp, &calendar)
            .unwrap();
        let weights = read_weights(&sig_dir, "MTM010-NEU.MA01");
        for section in weights.values() {
            let w: BTreeMap<&str, f64> = section.iter().map(|(i, w)| (i.as_str(), *w)).collect();
            assert_abs_diff_eq!(w["A"], -0.25, epsilon = 1e-12);
            assert_abs_diff_eq!(w["B"], 0.25, epsilon = 1e-12);
            assert_abs_diff_eq!(w["C"], -0.25, epsilon = 1e-12);
            assert_abs_diff_eq!(w["D"], 0.25, epsilon = 1e-12);
        }

        let cost = 0.0003;
        let args = SimArgs::new(
            "MTM010-NEU.MA01.Opn001L1RAW".to_string(),
            "MTM010-NEU.MA01".to_string(),
            vec![(sim::TAG_FACTOR_NAME.to_string(), "MTM010-NEU".to_string())],
            ret,
            TableRef::new(&sig_dir, "MTM010-NEU.MA01", schemas::WEIGHT),
            TableRef::new(&tst_dir, ret.save_id(), ret.ret_name()),
            cost,
        );
        let sim_dir = root.join("simulations");
        assert_eq!(Simulation::new(args.clone(), &sim_dir).run(bgn, stp, &calendar).unwrap(), 3);

        let evaluator = Evaluator::new(&sim_dir, MetricsConfig::default());
        let record = evaluator.evaluate(&args, bgn, stp).unwrap();
        let day = 0.25 * 0.01;
        let expected = (1.0 + day - cost) * (1.0 + day) * (1.0 + day) - 1.0;
        assert_abs_diff_eq!(record.indicators.hpr, expected, epsilon = 1e-10);

        // the next window appends without a gap; no signal yet means the book is closed
        let appended = Simulation::new(args, &sim_dir).run(stp, d(8), &calendar).unwrap();
        assert_eq!(appended, 1);
    }
}
