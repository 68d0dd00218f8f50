//! Ranked evaluation report and NAV plots.

use super::Session;
use crate::plan::SignalKind;
use crate::pool::run_units;
use anyhow::{Context, Result};
use ronda_eval::{EvaluationTable, Evaluator, NavLine, report_path, save_nav_svg};
use ronda_traits::{SimArgs, group_sim_args};

/// Directory of the NAV plots below a kind's evaluation directory.
pub(crate) const PLOT_DIR: &str = "plot-nav";

/// Rows printed after the report is saved.
const TOP_ROWS: usize = 10;

pub(crate) fn run(session: &Session, kind: SignalKind) -> Result<usize> {
    let (bgn, stp) = (session.bgn, session.stp);
    let sims = session.planner().sims(kind)?;
    let evaluator = Evaluator::new(session.layout.simulations(kind), session.config.evaluation.clone());
    let eval_dir = session.layout.evaluations(kind);

    let report = run_units(
        &format!("evaluations {kind}"),
        &sims,
        session.mode,
        |a| a.sim_id().to_string(),
        |a| evaluator.evaluate(a, bgn, stp),
    )?;
    let mut failed = report.finish();

    let table = EvaluationTable::new(report.outputs, kind.sort_key());
    let path = report_path(&eval_dir, kind.as_str());
    table
        .save(&path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    table.log_top(TOP_ROWS);
    print_top(&table);

    let groups: Vec<(String, Vec<SimArgs>)> = group_sim_args(&sims, kind.plot_grouping())?.into_iter().collect();
    let plot_dir = eval_dir.join(PLOT_DIR);
    let plots = run_units(
        &format!("plot-nav {kind}"),
        &groups,
        session.mode,
        |(key, _)| key.clone(),
        |(key, members)| {
            let lines = members
                .iter()
                .map(|a| Ok((a.sim_id().to_string(), evaluator.nav(a, bgn, stp)?)))
                .collect::<ronda_traits::Result<Vec<NavLine>>>()?;
            save_nav_svg(&plot_dir.join(format!("{key}.svg")), key, &lines)
        },
    )?;
    failed += plots.finish();
    Ok(failed)
}

fn print_top(table: &EvaluationTable) {
    println!(
        "{:>4}  {:>8}  {:>8}  {:>8}  {:>8}  sim_id",
        "rank", "sharpe", "calmar", "hpr", "mdd"
    );
    for (rank, record) in table.records().iter().take(TOP_ROWS).enumerate() {
        let ind = &record.indicators;
        println!(
            "{:>4}  {:>8.3}  {:>8.3}  {:>8.3}  {:>8.3}  {}",
            rank + 1,
            ind.sharpe,
            ind.calmar,
            ind.hpr,
            ind.mdd,
            record.sim_id
        );
    }
}
