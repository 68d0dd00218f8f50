//! Return and cost accounting of a signal against a test return.
//!
//! Per date `T`: `raw_ret = Σ w[i] r[i]` over instruments present in both
//! panels, `dlt_wgt = Σ |w[i, T] - w[i, T-1]|` over the union of holdings,
//! `cost = dlt_wgt × rate`, `net_ret = raw_ret - cost` and
//! `nav = nav[T-1] × (1 + net_ret)`.

use ronda_store::{PanelTable, schemas};
use ronda_traits::{CrossSection, Date, Panel, Result, SimArgs, TradingCalendar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// One simulated trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavRecord {
    /// Trading date
    pub date: Date,
    /// Signal dot forward return
    pub raw_ret: f64,
    /// Turnover since the prior date
    pub dlt_wgt: f64,
    /// Turnover times the cost rate
    pub cost: f64,
    /// Return net of cost
    pub net_ret: f64,
    /// Cumulative net asset value
    pub nav: f64,
}

/// Sum of absolute weight changes over the union of both holdings.
pub fn turnover(prev: &CrossSection, cur: &CrossSection) -> f64 {
    let mut delta: HashMap<&str, f64> = HashMap::with_capacity(prev.len() + cur.len());
    for (instrument, w) in cur {
        *delta.entry(instrument.as_str()).or_insert(0.0) += w;
    }
    for (instrument, w) in prev {
        *delta.entry(instrument.as_str()).or_insert(0.0) -= w;
    }
    delta.values().map(|d| d.abs()).sum()
}

/// Weighted return over instruments with a finite return.
pub fn portfolio_return(weights: &CrossSection, returns: &CrossSection) -> f64 {
    let lookup: HashMap<&str, f64> = returns.iter().map(|(i, r)| (i.as_str(), *r)).collect();
    weights
        .iter()
        .filter_map(|(i, w)| lookup.get(i.as_str()).filter(|r| r.is_finite()).map(|r| w * r))
        .sum()
}

/// Rolls the NAV forward over `dates`.
///
/// # Arguments
///
/// * `dates` - Trading dates to simulate, in order
/// * `weights` - Signal cross-sections; a missing date holds no position
/// * `returns` - Forward return cross-sections
/// * `prior` - Holdings on the trading day before `dates[0]`
/// * `cost_rate` - Cost per unit of turnover
/// * `nav0` - NAV before `dates[0]`
pub fn simulate(
    dates: &[Date],
    weights: &BTreeMap<Date, CrossSection>,
    returns: &BTreeMap<Date, CrossSection>,
    prior: &CrossSection,
    cost_rate: f64,
    nav0: f64,
) -> Vec<NavRecord> {
    let empty = CrossSection::new();
    let mut prev = prior;
    let mut nav = nav0;
    let mut out = Vec::with_capacity(dates.len());
    for date in dates {
        let cur = weights.get(date).unwrap_or(&empty);
        let raw_ret = portfolio_return(cur, returns.get(date).unwrap_or(&empty));
        let dlt_wgt = turnover(prev, cur);
        let cost = dlt_wgt * cost_rate;
        let net_ret = raw_ret - cost;
        nav *= 1.0 + net_ret;
        out.push(NavRecord {
            date: *date,
            raw_ret,
            dlt_wgt,
            cost,
            net_ret,
            nav,
        });
        prev = cur;
    }
    out
}

/// Converts NAV records into a date keyed panel in storage column order.
pub fn nav_panel(records: &[NavRecord]) -> Result<Panel> {
    let dates: Vec<Date> = records.iter().map(|r| r.date).collect();
    let column = |f: fn(&NavRecord) -> f64| records.iter().map(f).collect::<Vec<f64>>();
    Panel::from_columns(
        &dates,
        None,
        vec![
            (schemas::RAW_RET.to_string(), column(|r| r.raw_ret)),
            (schemas::DLT_WGT.to_string(), column(|r| r.dlt_wgt)),
            (schemas::COST.to_string(), column(|r| r.cost)),
            (schemas::NET_RET.to_string(), column(|r| r.net_ret)),
            (schemas::NAV.to_string(), column(|r| r.nav)),
        ],
    )
}

/// Simulates one [`SimArgs`] over a date range and appends NAV records.
#[derive(Debug, Clone)]
pub struct Simulation {
    args: SimArgs,
    output: PanelTable,
}

impl Simulation {
    /// Creates a simulation writing `<sim_id>` under `sim_dir`.
    pub fn new(args: SimArgs, sim_dir: &Path) -> Self {
        let output = PanelTable::new(sim_dir, args.sim_id(), schemas::nav());
        Self { args, output }
    }

    /// Simulation id.
    pub fn save_id(&self) -> &str {
        self.output.save_id()
    }

    /// Runs over `[bgn, stp)`, returning the number of records written.
    ///
    /// Holdings of the trading day before the range seed the first
    /// turnover, and the NAV continues from the last persisted record.
    pub fn run(&self, bgn: Date, stp: Date, calendar: &dyn TradingCalendar) -> Result<usize> {
        let dates = calendar.dates_header(bgn, stp);
        let Some(first) = dates.first().copied() else {
            return Ok(0);
        };
        self.output.check_continuity(first, calendar)?;
        let before = calendar.shift_clamped(first, -1)?;

        let sig = self.args.sig();
        let signal = PanelTable::new(sig.dir(), sig.save_id(), schemas::signal())
            .read_by_range(before, stp, &[sig.column()])?
            .cross_sections(sig.column())?;
        let ret = self.args.ret();
        let ret_schema = schemas::test_return(self.args.tgt_ret());
        let returns = PanelTable::new(ret.dir(), ret.save_id(), ret_schema)
            .read_by_range(first, stp, &[ret.column()])?
            .cross_sections(ret.column())?;

        let prior = if before < first {
            signal.get(&before).cloned().unwrap_or_default()
        } else {
            CrossSection::new()
        };
        let nav0 = self.last_nav()?.unwrap_or(1.0);

        let records = simulate(&dates, &signal, &returns, &prior, self.args.cost(), nav0);
        debug!(sim = %self.save_id(), days = records.len(), nav0, "simulated");
        self.output.update(&nav_panel(&records)?, calendar)
    }

    fn last_nav(&self) -> Result<Option<f64>> {
        Ok(self.output.read(&[schemas::NAV])?.values(schemas::NAV)?.last().copied())
    }
}
