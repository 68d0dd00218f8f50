//! NAV simulation.

use super::Session;
use crate::plan::SignalKind;
use crate::pool::run_units;
use anyhow::Result;
use ronda_eval::Simulation;

pub(crate) fn run(session: &Session, kind: SignalKind) -> Result<usize> {
    let sims = session.planner().sims(kind)?;
    let sim_dir = session.layout.simulations(kind);
    let report = run_units(
        &format!("simulations {kind}"),
        &sims,
        session.mode,
        |a| a.sim_id().to_string(),
        |a| Simulation::new(a.clone(), &sim_dir).run(session.bgn, session.stp, &session.calendar),
    )?;
    Ok(report.finish())
}
