//! Walk-forward optimization of blend weights.

use super::Session;
use crate::plan::OptimizeKind;
use crate::pool::run_units;
use anyhow::Result;

pub(crate) fn run(session: &Session, kind: OptimizeKind) -> Result<usize> {
    let jobs = session.planner().optimize_jobs(kind)?;
    let (source, _) = kind.source();
    let report = run_units(
        &format!("optimize {source}"),
        &jobs,
        session.mode,
        |j| j.save_id().to_string(),
        |j| j.run(session.bgn, session.stp, &session.calendar),
    )?;
    Ok(report.finish())
}
