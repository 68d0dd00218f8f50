//! Signal generation and blending.

use super::Session;
use crate::plan::SignalKind;
use crate::pool::run_units;
use anyhow::Result;

pub(crate) fn run(session: &Session, kind: SignalKind) -> Result<usize> {
    let (bgn, stp, calendar) = (session.bgn, session.stp, &session.calendar);
    let stage = format!("signals {kind}");
    let report = match kind {
        SignalKind::FacNeu | SignalKind::MdlPrd => {
            let jobs = session.planner().signal_jobs(kind)?;
            run_units(&stage, &jobs, session.mode, |j| j.save_id().to_string(), |j| {
                j.run(bgn, stp, calendar)
            })?
        }
        SignalKind::MdlOpt | SignalKind::GrpOpt => {
            let jobs = session.planner().blend_jobs(kind)?;
            run_units(&stage, &jobs, session.mode, |j| j.save_id().to_string(), |j| {
                j.run(bgn, stp, calendar)
            })?
        }
    };
    Ok(report.finish())
}
