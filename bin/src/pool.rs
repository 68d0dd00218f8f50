//! Batch execution of independent units of work.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use ronda_traits::RondaError;
use std::io::IsTerminal;
use tracing::{error, info, warn};

/// How a batch is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Parallelism {
    /// One unit at a time on the calling thread.
    Sequential,
    /// A rayon pool of this many threads; 0 uses one per CPU.
    Threads(usize),
}

/// Outcome of one batch.
#[derive(Debug)]
pub(crate) struct BatchReport<R> {
    stage: String,
    /// Results of the units that succeeded, in unit order.
    pub(crate) outputs: Vec<R>,
    /// Units whose append was rejected by the continuity check.
    pub(crate) skipped: usize,
    pub(crate) failed: usize,
}

impl<R> BatchReport<R> {
    /// Prints the summary line and returns the number of failed units.
    pub(crate) fn finish(&self) -> usize {
        println!(
            "{}: {} succeeded, {} skipped, {} failed",
            self.stage,
            self.outputs.len(),
            self.skipped,
            self.failed
        );
        self.failed
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Runs `job` on every unit and collects the outcomes.
///
/// A failing unit never stops its siblings. Continuity rejections are
/// logged as skipped, every other error as failed.
///
/// # Errors
///
/// Returns an error only if the thread pool cannot be built.
pub(crate) fn run_units<T, R, N, F>(
    stage: &str,
    units: &[T],
    mode: Parallelism,
    name: N,
    job: F,
) -> Result<BatchReport<R>>
where
    T: Sync,
    R: Send,
    N: Fn(&T) -> String + Sync,
    F: Fn(&T) -> Result<R, RondaError> + Sync,
{
    info!(stage, units = units.len(), ?mode, "starting batch");
    let progress = progress_bar(units.len());
    let attempt = |unit: &T| {
        let outcome = job(unit);
        progress.inc(1);
        (name(unit), outcome)
    };
    let outcomes: Vec<(String, Result<R, RondaError>)> = match mode {
        Parallelism::Sequential => units.iter().map(attempt).collect(),
        Parallelism::Threads(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .context("failed to build thread pool")?;
            pool.install(|| units.par_iter().map(attempt).collect())
        }
    };
    progress.finish_and_clear();

    let mut report = BatchReport {
        stage: stage.to_string(),
        outputs: Vec::with_capacity(outcomes.len()),
        skipped: 0,
        failed: 0,
    };
    for (unit, outcome) in outcomes {
        match outcome {
            Ok(output) => report.outputs.push(output),
            Err(e) if e.is_continuity() => {
                warn!(stage, unit = %unit, error = %e, "skipped");
                report.skipped += 1;
            }
            Err(e) => {
                error!(stage, unit = %unit, error = %e, "failed");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
