//! Forward test returns computed from daily prices.
//!
//! The return at trade date `T` for a window `win` and lag `lag` is
//! `P(T + win + lag) / P(T + lag) - 1`, read at the open or the close. The
//! entry price is observed strictly after `T`.

use crate::neutralize::{NeutralizeJob, Neutralizer};
use ronda_store::{PanelTable, schemas};
use ronda_traits::{
    Date, Instrument, Panel, PriceAnchor, Result, ReturnDef, ReturnKind, TradingCalendar,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Computes raw test returns for both price anchors.
///
/// # Arguments
///
/// * `prices` - Panel with `open` and `close` columns, covering `T + lag`
///   through `T + shift` for every requested date
/// * `dates` - Trade dates to compute
/// * `ret` - Window and lag; the kind is ignored and output is `RAW`
/// * `calendar` - Trading calendar used for the forward shifts
///
/// Instruments are those priced on the entry day; a missing exit price gives
/// `NaN`. Rows are ordered by date then instrument.
pub fn raw_test_returns(
    prices: &Panel,
    dates: &[Date],
    ret: &ReturnDef,
    calendar: &dyn TradingCalendar,
) -> Result<Panel> {
    let raw = ret.with_kind(ReturnKind::RAW);
    let price_dates = prices.dates()?;
    let price_instruments = prices.instruments()?;
    let columns: Vec<Vec<f64>> = PriceAnchor::ALL
        .iter()
        .map(|a| prices.values(a.price_column()))
        .collect::<Result<_>>()?;

    let mut by_date: BTreeMap<Date, HashMap<&str, usize>> = BTreeMap::new();
    for (row, (date, instrument)) in price_dates.iter().zip(&price_instruments).enumerate() {
        by_date.entry(*date).or_default().insert(instrument.as_str(), row);
    }

    let mut out_dates = Vec::new();
    let mut out_instruments: Vec<Instrument> = Vec::new();
    let mut out_values: Vec<Vec<f64>> = vec![Vec::new(); PriceAnchor::ALL.len()];
    let empty = HashMap::new();
    for &date in dates {
        let entry = calendar.next_date(date, i64::from(ret.lag))?;
        let exit = calendar.next_date(date, i64::from(ret.shift()))?;
        let entry_rows = by_date.get(&entry).unwrap_or(&empty);
        let exit_rows = by_date.get(&exit).unwrap_or(&empty);

        let mut instruments: Vec<&str> = entry_rows.keys().copied().collect();
        instruments.sort_unstable();
        for instrument in instruments {
            let entry_row = entry_rows[instrument];
            out_dates.push(date);
            out_instruments.push(instrument.to_string());
            for (k, column) in columns.iter().enumerate() {
                let exit_price = exit_rows
                    .get(instrument)
                    .map_or(f64::NAN, |&row| column[row]);
                out_values[k].push(exit_price / column[entry_row] - 1.0);
            }
        }
    }

    let values = PriceAnchor::ALL
        .iter()
        .map(|a| ReturnDef { anchor: *a, ..raw }.ret_name())
        .zip(out_values)
        .collect();
    Panel::from_columns(&out_dates, Some(&out_instruments), values)
}

/// Computes raw test returns for one window over a date range and appends
/// them to the test return table.
#[derive(Debug, Clone)]
pub struct TestReturnJob {
    prices: PanelTable,
    target: PanelTable,
    ret: ReturnDef,
}

impl TestReturnJob {
    /// Creates a job writing `<ret.save_id()>` under `test_return_dir`.
    pub fn new(prices: PanelTable, test_return_dir: &Path, ret: ReturnDef) -> Self {
        let raw = ret.with_kind(ReturnKind::RAW);
        Self {
            prices,
            target: PanelTable::new(test_return_dir, raw.save_id(), schemas::test_return(&raw)),
            ret: raw,
        }
    }

    /// Storage key of the output table.
    pub fn save_id(&self) -> &str {
        self.target.save_id()
    }

    /// Runs the job over `[bgn, stp)`, returning the number of rows written.
    ///
    /// Trade dates whose exit day `T + shift` lies past the end of the
    /// calendar are left out; a later run over an extended calendar appends
    /// them.
    pub fn run(&self, bgn: Date, stp: Date, calendar: &dyn TradingCalendar) -> Result<usize> {
        let shift = i64::from(self.ret.shift());
        let mut dates = calendar.dates_header(bgn, stp);
        dates.retain(|date| calendar.next_date(*date, shift).is_ok());
        let Some(first) = dates.first() else {
            return Ok(0);
        };
        let lo = calendar.next_date(*first, i64::from(self.ret.lag))?;
        // exit prices are looked up by date, rows past the last exit are unused
        let prices = self.prices.read(&[])?.filter_range(lo, Date::MAX)?;
        let returns = raw_test_returns(&prices, &dates, &self.ret, calendar)?;
        self.target.update(&returns, calendar)
    }
}

/// Builds the job neutralizing the raw test returns of one window.
pub fn neutral_test_return_job(
    test_return_dir: &Path,
    ret: &ReturnDef,
    neutralizer: Neutralizer,
) -> NeutralizeJob {
    let raw = ret.with_kind(ReturnKind::RAW);
    let neu = ret.with_kind(ReturnKind::NEU);
    let renames = PriceAnchor::ALL
        .iter()
        .map(|a| {
            (
                ReturnDef { anchor: *a, ..raw }.ret_name(),
                ReturnDef { anchor: *a, ..neu }.ret_name(),
            )
        })
        .collect();
    NeutralizeJob::new(
        PanelTable::new(test_return_dir, raw.save_id(), schemas::test_return(&raw)),
        PanelTable::new(test_return_dir, neu.save_id(), schemas::test_return(&neu)),
        renames,
        neutralizer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neutralize::NeutralizerConfig;
    use approx::assert_abs_diff_eq;
    use ronda_traits::Calendar;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn calendar() -> Calendar {
        Calendar::new(vec![d(2), d(3), d(4), d(5), d(8), d(9)])
    }

    fn prices() -> Panel {
        let dates = [d(2), d(2), d(3), d(3), d(4), d(4), d(5), d(5), d(8)];
        let instruments: Vec<String> = ["al", "cu", "al", "cu", "al", "cu", "al", "cu", "cu"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Panel::from_columns(
            &dates,
            Some(&instruments),
            vec![
                ("open".to_string(), vec![20.0, 10.0, 20.0, 11.0, 22.0, 12.0, 24.0, 13.0, 14.0]),
                ("close".to_string(), vec![21.0, 10.5, 21.0, 11.5, 23.0, 12.5, 25.0, 13.5, 14.5]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_raw_returns_use_lagged_entry() {
        let ret = ReturnDef::new(PriceAnchor::Opn, 1, 1, ReturnKind::RAW);
        let out = raw_test_returns(&prices(), &[d(2), d(4)], &ret, &calendar()).unwrap();

        assert_eq!(out.instruments().unwrap(), vec!["al", "cu", "al", "cu"]);
        let opn = out.values("Opn001L1RAW").unwrap();
        // 2024-01-02: entry 01-03, exit 01-04
        assert_abs_diff_eq!(opn[0], 22.0 / 20.0 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(opn[1], 12.0 / 11.0 - 1.0, epsilon = 1e-12);
        // 2024-01-04: entry 01-05, exit 01-08 where al has no price
        assert!(opn[2].is_nan());
        assert_abs_diff_eq!(opn[3], 14.0 / 13.0 - 1.0, epsilon = 1e-12);
        let cls = out.values("Cls001L1RAW").unwrap();
        assert_abs_diff_eq!(cls[1], 12.5 / 11.5 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shift_past_calendar_fails() {
        let ret = ReturnDef::new(PriceAnchor::Cls, 5, 1, ReturnKind::RAW);
        assert!(raw_test_returns(&prices(), &[d(4)], &ret, &calendar()).is_err());
    }

    #[test]
    fn test_job_stops_at_calendar_tail() {
        let dir = tempfile::tempdir().unwrap();
        let cal = calendar();
        let price_table = PanelTable::new(dir.path(), "prices", schemas::prices());
        price_table.update(&prices(), &cal).unwrap();

        let ret = ReturnDef::new(PriceAnchor::Opn, 1, 1, ReturnKind::RAW);
        let job = TestReturnJob::new(price_table, dir.path(), ret);
        // 01-08 and 01-09 have no exit day inside the calendar
        assert_eq!(job.run(d(2), d(10), &cal).unwrap(), 7);
        let table = PanelTable::new(dir.path(), "001L1RAW", schemas::test_return(&ret));
        let dates = table.read(&[]).unwrap().dates().unwrap();
        assert_eq!(dates.last(), Some(&d(5)));
        assert_eq!(job.run(d(8), d(10), &cal).unwrap(), 0);
    }

    #[test]
    fn test_jobs_write_raw_and_neutral_tables() {
        let dir = tempfile::tempdir().unwrap();
        let cal = calendar();
        let price_table = PanelTable::new(dir.path(), "prices", schemas::prices());
        price_table.update(&prices(), &cal).unwrap();

        let ret = ReturnDef::new(PriceAnchor::Opn, 1, 1, ReturnKind::NEU);
        let job = TestReturnJob::new(price_table, dir.path(), ret);
        assert_eq!(job.save_id(), "001L1RAW");
        assert_eq!(job.run(d(2), d(4), &cal).unwrap(), 4);

        let sectors = [("cu", "metal"), ("al", "metal")]
            .into_iter()
            .map(|(i, s)| (i.to_string(), s.to_string()))
            .collect();
        let neu = neutral_test_return_job(
            dir.path(),
            &ret,
            Neutralizer::new(NeutralizerConfig::default(), sectors),
        );
        assert_eq!(neu.save_id(), "001L1NEU");
        assert_eq!(neu.run(d(2), d(4), &cal).unwrap(), 4);

        let table = PanelTable::new(dir.path(), "001L1NEU", schemas::test_return(&ret));
        let neutral = table.read(&["Opn001L1NEU"]).unwrap();
        assert_eq!(neutral.sectors().unwrap(), vec!["metal"; 4]);
        let values = neutral.values("Opn001L1NEU").unwrap();
        assert_abs_diff_eq!(values[0] + values[1], 0.0, epsilon = 1e-12);
    }
}
