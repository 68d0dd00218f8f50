//! Neutralization of one factor class.

use super::Session;
use crate::pool::run_units;
use anyhow::Result;
use ronda_signals::NeutralizeJob;
use ronda_store::{PanelTable, schemas};
use ronda_traits::FactorClass;
use std::slice;

pub(crate) fn run(session: &Session, class: FactorClass) -> Result<usize> {
    let factors = session.config.factors_of(class)?;
    let raw: Vec<String> = factors.iter().map(|f| f.name.clone()).collect();
    let neutral: Vec<String> = factors.iter().map(|f| f.neutral_name()).collect();
    let job = NeutralizeJob::new(
        PanelTable::new(session.layout.factors_by_instru(), class.to_string(), schemas::factor(&raw)),
        PanelTable::new(session.layout.neutral_by_instru(), class.to_string(), schemas::neutral_factor(&neutral)),
        raw.into_iter().zip(neutral).collect(),
        session.config.neutralizer(),
    );

    let report = run_units(
        "factor-neu",
        slice::from_ref(&job),
        session.mode,
        |j| j.save_id().to_string(),
        |j| j.run(session.bgn, session.stp, &session.calendar),
    )?;
    Ok(report.finish())
}
