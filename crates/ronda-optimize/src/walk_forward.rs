//! Walk-forward rebalancing of candidate return streams.
//!
//! On every month-end trigger `T` the optimizer sees the trailing `win`
//! trading days ending at `T`. The resulting weights take effect on the
//! trading day after `T` and are held until the next rebalance.

use ndarray::{Array1, Array2};
use ronda_store::{PanelTable, schemas};
use ronda_traits::{Date, Panel, Result, RondaError, SimArgs, TableRef, TradingCalendar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::equal_weight::EqualWeight;
use crate::optimizer::PortfolioOptimizer;
use crate::sharpe::MaxSharpe;

/// Date-aligned return streams of a set of candidates.
#[derive(Debug, Clone)]
pub struct CandidateReturns {
    dates: Vec<Date>,
    names: Vec<String>,
    values: Array2<f64>,
}

impl CandidateReturns {
    /// Aligns per-candidate series on the union of their dates. Cells a
    /// candidate has no value for are `NaN`.
    pub fn from_series(columns: Vec<(String, Vec<(Date, f64)>)>) -> Result<Self> {
        let dates: Vec<Date> = columns
            .iter()
            .flat_map(|(_, series)| series.iter().map(|(d, _)| *d))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<Date, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut values = Array2::from_elem((dates.len(), columns.len()), f64::NAN);
        let mut names = Vec::with_capacity(columns.len());
        for (j, (name, series)) in columns.into_iter().enumerate() {
            for (date, v) in series {
                values[[index[&date], j]] = v;
            }
            names.push(name);
        }
        Ok(Self { dates, names, values })
    }

    /// Loads `net_ret`-style columns of every member over `[bgn, stp)`.
    pub fn load(members: &[(String, TableRef)], bgn: Date, stp: Date) -> Result<Self> {
        let columns = members
            .iter()
            .map(|(name, table)| {
                let series = PanelTable::new(table.dir(), table.save_id(), schemas::nav())
                    .read_by_range(bgn, stp, &[table.column()])?
                    .series(table.column())?;
                Ok((name.clone(), series))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_series(columns)
    }

    /// Candidate names in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Dates in row order.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Rows dated within `[start, end]` that have a finite value for every
    /// candidate.
    pub fn window(&self, start: Date, end: Date) -> Array2<f64> {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end).max(lo);
        let rows: Vec<usize> = (lo..hi)
            .filter(|&i| self.values.row(i).iter().all(|v| v.is_finite()))
            .collect();
        self.values.select(ndarray::Axis(0), &rows)
    }
}

/// Configuration for walk-forward rebalancing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Trailing window in trading days, the trigger date included.
    pub win: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self { win: 60 }
    }
}

/// Rebalances a set of candidates on month-end triggers.
#[derive(Debug, Clone)]
pub struct WalkForward<O = MaxSharpe> {
    config: WalkForwardConfig,
    optimizer: O,
}

impl WalkForward<MaxSharpe> {
    /// Create a walk-forward driver around the default max-Sharpe solver.
    #[must_use]
    pub fn new(config: WalkForwardConfig) -> Self {
        Self::with_optimizer(config, MaxSharpe::default())
    }
}

impl<O: PortfolioOptimizer> WalkForward<O> {
    /// Create a walk-forward driver around any optimizer.
    pub const fn with_optimizer(config: WalkForwardConfig, optimizer: O) -> Self {
        Self { config, optimizer }
    }

    /// Window length in trading days.
    pub const fn win(&self) -> usize {
        self.config.win
    }

    /// First date of the window ending at `trigger`.
    pub fn window_start(&self, trigger: Date, calendar: &dyn TradingCalendar) -> Result<Date> {
        let back = self.config.win.max(1) as i64 - 1;
        calendar.shift_clamped(trigger, -back)
    }

    /// Weights computed at `trigger`. Solver failures fall back to equal
    /// weights and are logged.
    pub fn weights_at(
        &self,
        returns: &CandidateReturns,
        trigger: Date,
        calendar: &dyn TradingCalendar,
    ) -> Result<Array1<f64>> {
        let start = self.window_start(trigger, calendar)?;
        let window = returns.window(start, trigger);
        match self.optimizer.optimize(&window) {
            Ok(w) => Ok(w),
            Err(e) => {
                warn!(
                    optimizer = self.optimizer.name(),
                    %trigger,
                    rows = window.nrows(),
                    error = %e,
                    "falling back to equal weights"
                );
                Ok(EqualWeight::weights(returns.names().len()))
            }
        }
    }

    /// Month-end triggers whose weights can take effect in `[bgn, stp)`.
    ///
    /// The range starts one trading day before `bgn` so the month-end right
    /// before `bgn` is included.
    pub fn triggers(&self, bgn: Date, stp: Date, calendar: &dyn TradingCalendar) -> Result<Vec<Date>> {
        let header = calendar.dates_header(bgn, stp);
        let Some(first) = header.first() else {
            return Ok(Vec::new());
        };
        let lo = calendar.shift_clamped(*first, -1)?;
        Ok(calendar.last_trading_day_in_range(lo, stp))
    }

    /// Rebalanced weights keyed by the date they take effect.
    pub fn rebalance(
        &self,
        returns: &CandidateReturns,
        triggers: &[Date],
        calendar: &dyn TradingCalendar,
    ) -> Result<BTreeMap<Date, Array1<f64>>> {
        let mut out = BTreeMap::new();
        for &trigger in triggers {
            // a trigger on the last calendar day has no effective date yet
            let Ok(effective) = calendar.next_date(trigger, 1) else {
                continue;
            };
            let weights = self.weights_at(returns, trigger, calendar)?;
            debug!(%trigger, %effective, ?weights, "rebalanced");
            out.insert(effective, weights);
        }
        Ok(out)
    }
}

/// Expands rebalance points onto every date of `header`.
///
/// Dates before the first available weights are dropped unless `seed`
/// provides the weights in force at the start of the header.
pub fn forward_fill(
    header: &[Date],
    rebalances: &BTreeMap<Date, Array1<f64>>,
    seed: Option<Array1<f64>>,
) -> Vec<(Date, Array1<f64>)> {
    let mut current = seed;
    let mut out = Vec::with_capacity(header.len());
    for date in header {
        if let Some(w) = rebalances.get(date) {
            current = Some(w.clone());
        }
        if let Some(w) = &current {
            out.push((*date, w.clone()));
        }
    }
    out
}

/// Optimizes one group of simulations over a date range and appends the
/// forward-filled weights to the group's weight table.
#[derive(Debug, Clone)]
pub struct OptimizeJob<O = MaxSharpe> {
    members: Vec<(String, TableRef)>,
    output: PanelTable,
    walk_forward: WalkForward<O>,
}

impl OptimizeJob<MaxSharpe> {
    /// Builds the job for a group of simulations whose NAV tables live in
    /// `sim_dir`. Candidates are named by [`SimArgs::candidate`].
    pub fn from_sim_args(
        group_id: &str,
        members: &[SimArgs],
        sim_dir: &Path,
        opt_dir: &Path,
        walk_forward: WalkForward,
    ) -> Self {
        let members = members
            .iter()
            .map(|args| {
                (
                    args.candidate().to_string(),
                    TableRef::new(sim_dir, args.sim_id(), schemas::NET_RET),
                )
            })
            .collect();
        Self::new(group_id, members, opt_dir, walk_forward)
    }
}

impl<O: PortfolioOptimizer> OptimizeJob<O> {
    /// Creates a job from explicit (candidate, return table) pairs.
    pub fn new(
        group_id: &str,
        members: Vec<(String, TableRef)>,
        opt_dir: &Path,
        walk_forward: WalkForward<O>,
    ) -> Self {
        let candidates: Vec<String> = members.iter().map(|(c, _)| c.clone()).collect();
        Self {
            members,
            output: PanelTable::new(opt_dir, group_id, schemas::opt_weight(&candidates)),
            walk_forward,
        }
    }

    /// Group id and storage key of the weight table.
    pub fn save_id(&self) -> &str {
        self.output.save_id()
    }

    /// Candidate names in column order.
    pub fn candidates(&self) -> Vec<&str> {
        self.members.iter().map(|(c, _)| c.as_str()).collect()
    }

    /// Weights in force before `bgn`, read from the last persisted row.
    fn seed(&self) -> Result<Option<Array1<f64>>> {
        let persisted = self.output.read(&[])?;
        if persisted.is_empty() {
            return Ok(None);
        }
        let last = persisted.len() - 1;
        let row = self
            .candidates()
            .iter()
            .map(|c| {
                persisted.values(c)?.get(last).copied().ok_or_else(|| {
                    RondaError::InvalidData(format!("weight table {} is ragged", self.save_id()))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Some(Array1::from_vec(row)))
    }

    /// Runs the job over `[bgn, stp)`, returning the number of rows written.
    pub fn run(&self, bgn: Date, stp: Date, calendar: &dyn TradingCalendar) -> Result<usize> {
        let header = calendar.dates_header(bgn, stp);
        let triggers = self.walk_forward.triggers(bgn, stp, calendar)?;

        let rebalances = match triggers.first() {
            Some(first) => {
                let lo = self.walk_forward.window_start(*first, calendar)?;
                let returns = CandidateReturns::load(&self.members, lo, stp)?;
                self.walk_forward.rebalance(&returns, &triggers, calendar)?
            }
            None => BTreeMap::new(),
        };

        let filled = forward_fill(&header, &rebalances, self.seed()?);
        debug!(
            group = %self.save_id(),
            triggers = triggers.len(),
            rows = filled.len(),
            "walk-forward weights"
        );

        let dates: Vec<Date> = filled.iter().map(|(d, _)| *d).collect();
        let columns = self
            .members
            .iter()
            .enumerate()
            .map(|(j, (name, _))| (name.clone(), filled.iter().map(|(_, w)| w[j]).collect()))
            .collect();
        let panel = Panel::from_columns(&dates, None, columns)?;
        self.output.update(&panel, calendar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ronda_traits::Calendar;

    fn date(m: u32, d: u32) -> Date {
        Date::from_ymd_opt(2024, m, d).unwrap()
    }

    fn weekday_calendar(from: Date, to: Date) -> Calendar {
        use chrono::Datelike;
        let dates = from
            .iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| d.weekday().number_from_monday() <= 5)
            .collect();
        Calendar::new(dates)
    }

    /// Fails every solve, so each trigger falls back to equal weights.
    struct Failing;

    impl PortfolioOptimizer for Failing {
        fn optimize(&self, _returns: &Array2<f64>) -> Result<Array1<f64>> {
            Err(RondaError::Optimization("never converges".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_window_drops_nan_rows() {
        let returns = CandidateReturns::from_series(vec![
            ("a".into(), vec![(date(1, 2), 0.1), (date(1, 3), 0.2), (date(1, 4), 0.3)]),
            ("b".into(), vec![(date(1, 2), 0.0), (date(1, 4), 0.1)]),
        ])
        .unwrap();
        assert_eq!(returns.dates().len(), 3);
        let w = returns.window(date(1, 2), date(1, 4));
        assert_eq!(w.nrows(), 2);
        assert_abs_diff_eq!(w[[1, 0]], 0.3);
        assert_eq!(returns.window(date(1, 3), date(1, 3)).nrows(), 0);
    }

    #[test]
    fn test_forward_fill() {
        let header = [date(1, 2), date(1, 3), date(1, 4), date(1, 5)];
        let mut rebalances = BTreeMap::new();
        rebalances.insert(date(1, 3), Array1::from_vec(vec![0.2, 0.8]));
        let out = forward_fill(&header, &rebalances, None);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].0, date(1, 3));
        assert_eq!(out[2].1.to_vec(), vec![0.2, 0.8]);

        let seeded = forward_fill(&header, &rebalances, Some(Array1::from_vec(vec![0.5, 0.5])));
        assert_eq!(seeded.len(), 4);
        assert_eq!(seeded[0].1.to_vec(), vec![0.5, 0.5]);
        assert_eq!(seeded[1].1.to_vec(), vec![0.2, 0.8]);
    }

    #[test]
    fn test_triggers_include_month_end_before_bgn() {
        let cal = weekday_calendar(date(1, 1), date(3, 29));
        let wf = WalkForward::new(WalkForwardConfig::default());
        let triggers = wf.triggers(date(2, 1), date(3, 1), &cal).unwrap();
        assert_eq!(triggers, vec![date(1, 31), date(2, 29)]);
    }

    #[test]
    fn test_weights_effective_next_day_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let cal = weekday_calendar(date(1, 1), date(3, 29));
        let sim_dir = dir.path().join("sims");
        let opt_dir = dir.path().join("opt");

        let members: Vec<(String, TableRef)> = ["c0", "c1", "c2"]
            .iter()
            .enumerate()
            .map(|(k, id)| {
                let dates = cal.dates_header(date(1, 1), date(3, 1));
                let net: Vec<f64> = (0..dates.len()).map(|i| 0.001 * ((i + k) % 5) as f64).collect();
                let nav = vec![1.0; dates.len()];
                let zero = vec![0.0; dates.len()];
                let panel = Panel::from_columns(
                    &dates,
                    None,
                    vec![
                        (schemas::RAW_RET.to_string(), net.clone()),
                        (schemas::DLT_WGT.to_string(), zero.clone()),
                        (schemas::COST.to_string(), zero),
                        (schemas::NET_RET.to_string(), net),
                        (schemas::NAV.to_string(), nav),
                    ],
                )
                .unwrap();
                PanelTable::new(&sim_dir, *id, schemas::nav()).update(&panel, &cal).unwrap();
                (id.to_string(), TableRef::new(&sim_dir, *id, schemas::NET_RET))
            })
            .collect();

        let wf = WalkForward::with_optimizer(WalkForwardConfig { win: 10 }, Failing);
        let job = OptimizeJob::new("G1.Opn001L1RAW", members, &opt_dir, wf);
        // triggers 01-31 and 02-29, first effective date 02-01
        let written = job.run(date(1, 29), date(3, 5), &cal).unwrap();
        assert_eq!(written, cal.dates_header(date(2, 1), date(3, 5)).len());

        let table = PanelTable::new(&opt_dir, "G1.Opn001L1RAW", schemas::opt_weight(&[
            "c0".to_string(),
            "c1".to_string(),
            "c2".to_string(),
        ]));
        let stored = table.read(&[]).unwrap();
        assert_eq!(stored.dates().unwrap()[0], date(2, 1));
        assert!(stored.values("c1").unwrap().iter().all(|w| (w - 1.0 / 3.0).abs() < 1e-15));

        // a follow-up run is seeded from the last persisted row
        let more = job.run(date(3, 5), date(3, 8), &cal).unwrap();
        assert_eq!(more, 3);
    }

    #[test]
    fn test_max_sharpe_weights_within_bounds() {
        let cal = weekday_calendar(date(1, 1), date(2, 29));
        let dates = cal.dates_header(date(1, 1), date(2, 1));
        let series = |k: usize| -> Vec<(Date, f64)> {
            dates
                .iter()
                .enumerate()
                .map(|(i, d)| (*d, 0.002 * (((i * (k + 2)) % 7) as f64 - 3.0) + 0.0005 * k as f64))
                .collect()
        };
        let returns = CandidateReturns::from_series(vec![
            ("a".into(), series(0)),
            ("b".into(), series(1)),
            ("c".into(), series(2)),
        ])
        .unwrap();
        let wf = WalkForward::new(WalkForwardConfig { win: 20 });
        let w = wf.weights_at(&returns, date(1, 31), &cal).unwrap();
        assert_eq!(w.len(), 3);
        assert!(w.iter().all(|x| x.abs() <= 0.5 + 1e-12));
    }

    #[test]
    fn test_singular_window_falls_back() {
        let cal = weekday_calendar(date(1, 1), date(2, 29));
        let dates = cal.dates_header(date(1, 1), date(2, 1));
        let same: Vec<(Date, f64)> =
            dates.iter().enumerate().map(|(i, d)| (*d, 0.001 * (i % 3) as f64)).collect();
        let returns =
            CandidateReturns::from_series(vec![("a".into(), same.clone()), ("b".into(), same)]).unwrap();
        let wf = WalkForward::new(WalkForwardConfig { win: 20 });
        let w = wf.weights_at(&returns, date(1, 31), &cal).unwrap();
        assert_eq!(w.to_vec(), vec![0.5, 0.5]);
    }
}
