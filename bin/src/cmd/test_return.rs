//! Raw and neutralized test returns.

use super::Session;
use crate::pool::run_units;
use anyhow::Result;
use ronda_signals::{TestReturnJob, neutral_test_return_job};
use ronda_store::{PanelTable, schemas};
use tracing::debug;

/// Storage key of the daily price table.
pub(crate) const PRICES: &str = "prices";

/// One unit per return window; the neutral table follows its raw table.
pub(crate) fn run(session: &Session) -> Result<usize> {
    let (bgn, stp, calendar) = (session.bgn, session.stp, &session.calendar);
    let prices = PanelTable::new(session.layout.market(), PRICES, schemas::prices());
    let dir = session.layout.test_return();
    let rets = session.config.test_returns();

    let report = run_units("test-return", &rets, session.mode, |r| r.ret_class(), |ret| {
        let raw = TestReturnJob::new(prices.clone(), &dir, *ret).run(bgn, stp, calendar)?;
        let neu = neutral_test_return_job(&dir, ret, session.config.neutralizer()).run(bgn, stp, calendar)?;
        debug!(ret = %ret.ret_class(), raw, neu, "test returns written");
        Ok(raw + neu)
    })?;
    Ok(report.finish())
}
