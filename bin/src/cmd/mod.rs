//! CLI subcommand modules.
//!
//! Each stage enumerates its units from the project configuration and runs
//! them through [`crate::pool::run_units`] over the session's date range.

pub(crate) mod available;
pub(crate) mod evaluations;
pub(crate) mod factor_neu;
pub(crate) mod optimize;
pub(crate) mod signals;
pub(crate) mod simulations;
pub(crate) mod test_return;

use crate::config::{Layout, ProjectConfig};
use crate::plan::Planner;
use crate::pool::Parallelism;
use anyhow::{Context, Result, bail};
use ronda_traits::{Calendar, Date, TradingCalendar};

/// Everything a stage needs: configuration, calendar and `[bgn, stp)`.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) config: ProjectConfig,
    pub(crate) layout: Layout,
    pub(crate) calendar: Calendar,
    pub(crate) bgn: Date,
    pub(crate) stp: Date,
    pub(crate) mode: Parallelism,
}

impl Session {
    /// Loads the calendar and resolves the date range. `stp` defaults to
    /// the trading day after `bgn`.
    pub(crate) fn open(config: ProjectConfig, bgn: Date, stp: Option<Date>, mode: Parallelism) -> Result<Self> {
        let calendar = Calendar::from_csv(&config.calendar_path)
            .with_context(|| format!("failed to load calendar {}", config.calendar_path.display()))?;
        Self::with_calendar(config, calendar, bgn, stp, mode)
    }

    pub(crate) fn with_calendar(
        config: ProjectConfig,
        calendar: Calendar,
        bgn: Date,
        stp: Option<Date>,
        mode: Parallelism,
    ) -> Result<Self> {
        if !calendar.contains(bgn) {
            bail!("bgn {bgn} is not a trading day");
        }
        let stp = match stp {
            Some(stp) => stp,
            None => calendar.next_date(bgn, 1).context("no trading day after bgn")?,
        };
        if stp <= bgn {
            bail!("stp {stp} must be after bgn {bgn}");
        }
        Ok(Self {
            layout: config.layout(),
            config,
            calendar,
            bgn,
            stp,
            mode,
        })
    }

    pub(crate) fn planner(&self) -> Planner<'_> {
        Planner::new(&self.config)
    }
}
