//! Evaluation of simulated NAV series and the ranked report.

use polars::prelude::*;
use ronda_store::{PanelTable, schemas, write_atomic};
use ronda_traits::{Date, Result, SimArgs};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::metrics::{INDICATORS, Indicators, MetricsConfig, nav_curve};

/// Name of the composite ranking column.
pub const SHARPE_CALMAR: &str = "sharpe+calmar";

/// Indicator a report is ranked by, always descending with `NaN` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    /// Holding period return
    Hpr,
    /// Annualized return
    RetAnnual,
    /// Sharpe ratio
    #[default]
    Sharpe,
    /// Calmar ratio
    Calmar,
    /// Sum of Sharpe and Calmar
    SharpeCalmar,
}

impl SortKey {
    /// Value of this key for one set of indicators.
    pub fn value(self, ind: &Indicators) -> f64 {
        match self {
            Self::Hpr => ind.hpr,
            Self::RetAnnual => ind.ret_annual,
            Self::Sharpe => ind.sharpe,
            Self::Calmar => ind.calmar,
            Self::SharpeCalmar => ind.sharpe + ind.calmar,
        }
    }
}

/// Indicators of one simulation plus its identifying tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    /// Simulation id
    pub sim_id: String,
    /// Identifying fields in report order
    pub tags: Vec<(String, String)>,
    /// Calculated indicators
    pub indicators: Indicators,
}

/// Reads NAV tables of one simulation kind and evaluates them.
#[derive(Debug, Clone)]
pub struct Evaluator {
    sim_dir: PathBuf,
    config: MetricsConfig,
}

impl Evaluator {
    /// Creates an evaluator over the NAV tables under `sim_dir`.
    pub fn new(sim_dir: impl Into<PathBuf>, config: MetricsConfig) -> Self {
        Self {
            sim_dir: sim_dir.into(),
            config,
        }
    }

    /// Net returns of one simulation over `[bgn, stp)`.
    pub fn net_returns(&self, args: &SimArgs, bgn: Date, stp: Date) -> Result<Vec<(Date, f64)>> {
        PanelTable::new(&self.sim_dir, args.sim_id(), schemas::nav())
            .read_by_range(bgn, stp, &[schemas::NET_RET])?
            .series(schemas::NET_RET)
    }

    /// Evaluates one simulation over `[bgn, stp)`.
    pub fn evaluate(&self, args: &SimArgs, bgn: Date, stp: Date) -> Result<EvalRecord> {
        let returns: Vec<f64> = self.net_returns(args, bgn, stp)?.into_iter().map(|(_, r)| r).collect();
        Ok(EvalRecord {
            sim_id: args.sim_id().to_string(),
            tags: args.tags().to_vec(),
            indicators: Indicators::calculate(&returns, &self.config),
        })
    }

    /// NAV curve `Π(1 + net_ret)` of one simulation over `[bgn, stp)`.
    pub fn nav(&self, args: &SimArgs, bgn: Date, stp: Date) -> Result<Vec<(Date, f64)>> {
        let series = self.net_returns(args, bgn, stp)?;
        let returns: Vec<f64> = series.iter().map(|(_, r)| *r).collect();
        Ok(series
            .iter()
            .map(|(d, _)| *d)
            .zip(nav_curve(&returns))
            .collect())
    }
}

/// Ranked table of evaluation records.
#[derive(Debug, Clone, Default)]
pub struct EvaluationTable {
    records: Vec<EvalRecord>,
}

impl EvaluationTable {
    /// Creates a table ranked by `key`.
    pub fn new(records: Vec<EvalRecord>, key: SortKey) -> Self {
        let mut table = Self { records };
        table.sort_by(key);
        table
    }

    /// Records in rank order.
    pub fn records(&self) -> &[EvalRecord] {
        &self.records
    }

    /// Re-ranks descending by `key`, `NaN` last. Ties keep their order.
    pub fn sort_by(&mut self, key: SortKey) {
        self.records.sort_by(|a, b| {
            let (x, y) = (key.value(&a.indicators), key.value(&b.indicators));
            match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            }
        });
    }

    /// Builds the report frame: indicator columns in [`INDICATORS`] order
    /// with [`SHARPE_CALMAR`] after calmar, tag columns, `sim_id`.
    ///
    /// Tag columns follow the first record; records lacking a tag get an
    /// empty string.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let values: Vec<[f64; INDICATORS.len()]> =
            self.records.iter().map(|r| r.indicators.values()).collect();
        let mut columns: Vec<Column> = INDICATORS
            .iter()
            .enumerate()
            .map(|(k, name)| {
                let column: Vec<f64> = values.iter().map(|v| v[k]).collect();
                Column::new((*name).into(), column)
            })
            .collect();
        let composite: Vec<f64> = self
            .records
            .iter()
            .map(|r| r.indicators.sharpe + r.indicators.calmar)
            .collect();
        // sharpe and calmar lead
        columns.insert(2, Column::new(SHARPE_CALMAR.into(), composite));

        let tag_names: Vec<&str> = self
            .records
            .first()
            .map(|r| r.tags.iter().map(|(k, _)| k.as_str()).collect())
            .unwrap_or_default();
        for name in tag_names {
            let values: Vec<String> = self
                .records
                .iter()
                .map(|r| {
                    r.tags
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                })
                .collect();
            columns.push(Column::new(name.into(), values));
        }
        let ids: Vec<String> = self.records.iter().map(|r| r.sim_id.clone()).collect();
        columns.push(Column::new("sim_id".into(), ids));

        Ok(DataFrame::new(columns)?)
    }

    /// Writes the report as zstd-compressed parquet.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(&self.to_frame()?, path)?;
        info!(path = %path.display(), rows = self.records.len(), "saved evaluations");
        Ok(())
    }

    /// Logs the best `n` rows.
    pub fn log_top(&self, n: usize) {
        for (rank, r) in self.records.iter().take(n).enumerate() {
            info!(
                rank = rank + 1,
                sim = %r.sim_id,
                sharpe = format_args!("{:.3}", r.indicators.sharpe),
                calmar = format_args!("{:.3}", r.indicators.calmar),
                hpr = format_args!("{:.3}", r.indicators.hpr),
                mdd = format_args!("{:.3}", r.indicators.mdd),
                "evaluation"
            );
        }
    }
}

/// Report path of one simulation kind.
pub fn report_path(eval_dir: &Path, kind: &str) -> PathBuf {
    eval_dir.join(format!("evaluations_for_{kind}.parquet"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ronda_traits::{Calendar, Panel, PriceAnchor, ReturnDef, ReturnKind, TableRef};

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn record(id: &str, sharpe: f64, calmar: f64) -> EvalRecord {
        let mut indicators = Indicators::calculate(&[], &MetricsConfig::default());
        indicators.sharpe = sharpe;
        indicators.calmar = calmar;
        EvalRecord {
            sim_id: id.to_string(),
            tags: vec![("factor_name".to_string(), id.to_string())],
            indicators,
        }
    }

    fn ids(table: &EvaluationTable) -> Vec<&str> {
        table.records().iter().map(|r| r.sim_id.as_str()).collect()
    }

    #[test]
    fn test_rank_nan_last() {
        let table = EvaluationTable::new(
            vec![record("a", 0.5, 1.0), record("b", f64::NAN, 3.0), record("c", 1.5, 0.1)],
            SortKey::Sharpe,
        );
        assert_eq!(ids(&table), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_rank_by_composite() {
        let mut table = EvaluationTable::new(
            vec![record("a", 0.5, 1.0), record("c", 1.5, 0.1)],
            SortKey::Sharpe,
        );
        table.sort_by(SortKey::SharpeCalmar);
        assert_eq!(ids(&table), vec!["c", "a"]);
        table.sort_by(SortKey::Calmar);
        assert_eq!(ids(&table), vec!["a", "c"]);
    }

    #[test]
    fn test_frame_layout_and_save() {
        let table = EvaluationTable::new(vec![record("a", 0.5, 1.0)], SortKey::Sharpe);
        let frame = table.to_frame().unwrap();
        let names: Vec<String> = frame.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(&names[..3], &["sharpe", "calmar", SHARPE_CALMAR]);
        assert_eq!(&names[3..INDICATORS.len() + 1], &INDICATORS[2..]);
        let hpr = frame.column("hpr").unwrap().f64().unwrap().get(0).unwrap();
        assert!(hpr.is_nan());
        let sharpe = frame.column("sharpe").unwrap().f64().unwrap().get(0).unwrap();
        assert_abs_diff_eq!(sharpe, 0.5);
        assert_eq!(names[names.len() - 2], "factor_name");
        assert_eq!(names[names.len() - 1], "sim_id");

        let dir = tempfile::tempdir().unwrap();
        let path = report_path(&dir.path().join("facNeu"), "facNeu");
        table.save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_evaluate_reads_range() {
        let dir = tempfile::tempdir().unwrap();
        let cal = Calendar::new(vec![d(2), d(3), d(4), d(5)]);
        let net = vec![0.01, -0.02, 0.03, 0.5];
        let zero = vec![0.0; 4];
        let panel = Panel::from_columns(
            &[d(2), d(3), d(4), d(5)],
            None,
            vec![
                (schemas::RAW_RET.to_string(), net.clone()),
                (schemas::DLT_WGT.to_string(), zero.clone()),
                (schemas::COST.to_string(), zero.clone()),
                (schemas::NET_RET.to_string(), net),
                (schemas::NAV.to_string(), zero),
            ],
        )
        .unwrap();
        PanelTable::new(dir.path(), "S1", schemas::nav()).update(&panel, &cal).unwrap();

        let ret = ReturnDef::new(PriceAnchor::Opn, 1, 1, ReturnKind::RAW);
        let args = SimArgs::new(
            "S1".to_string(),
            "S1".to_string(),
            vec![("maw".to_string(), "01".to_string())],
            ret,
            TableRef::new(dir.path(), "sig", "weight"),
            TableRef::new(dir.path(), ret.save_id(), ret.ret_name()),
            0.0,
        );
        let evaluator = Evaluator::new(dir.path(), MetricsConfig::default());
        let rec = evaluator.evaluate(&args, d(2), d(5)).unwrap();
        assert_abs_diff_eq!(rec.indicators.hpr, 1.01 * 0.98 * 1.03 - 1.0, epsilon = 1e-12);
        assert_eq!(rec.tags[0].1, "01");

        let nav = evaluator.nav(&args, d(2), d(5)).unwrap();
        assert_eq!(nav.len(), 3);
        assert_abs_diff_eq!(nav[2].1, 1.01 * 0.98 * 1.03, epsilon = 1e-12);
    }
}
