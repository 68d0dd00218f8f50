//! Cross-sectional rank-normal neutralization.
//!
//! Per date and column: fractional rank `rank / (count + 1)`, inverse normal
//! CDF, then subtract the mean of the instrument's `(date, sector)` group.
//! The output keeps the input's rows in the input order; the value columns
//! are transformed and renamed and each row gains its sector label.

use ronda_store::PanelTable;
use ronda_traits::stats::{fractional_rank, inverse_normal_cdf, nan_mean};
use ronda_traits::{Date, Instrument, Panel, Result, RondaError, TradingCalendar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Instrument to sector mapping.
pub type Sectors = BTreeMap<Instrument, String>;

/// Configuration for the neutralizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeutralizerConfig {
    /// Minimum finite observations a date needs in a column; dates below it
    /// produce `NaN` for that column. The default of 1 applies no floor.
    pub min_obs: usize,
}

impl Default for NeutralizerConfig {
    fn default() -> Self {
        Self { min_obs: 1 }
    }
}

/// Neutralizes one cross-section given each row's sector.
///
/// Non-finite inputs stay `NaN` and are ignored by the rank and the group
/// mean.
///
/// # Example
///
/// ```
/// use ronda_signals::neutralize::neutralize_cross_section;
///
/// let out = neutralize_cross_section(&[10.0, 20.0, 5.0, 15.0], &["X", "X", "Y", "Y"], 1);
/// assert!((out[0] + out[1]).abs() < 1e-12);
/// assert!((out[2] + out[3]).abs() < 1e-12);
/// ```
pub fn neutralize_cross_section(values: &[f64], sectors: &[&str], min_obs: usize) -> Vec<f64> {
    let finite = values.iter().filter(|v| v.is_finite()).count();
    if finite == 0 || finite < min_obs {
        return vec![f64::NAN; values.len()];
    }

    let scores: Vec<f64> = fractional_rank(values)
        .into_iter()
        .map(inverse_normal_cdf)
        .collect();

    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for (score, sector) in scores.iter().zip(sectors) {
        groups.entry(*sector).or_default().push(*score);
    }
    let means: HashMap<&str, f64> = groups
        .into_iter()
        .map(|(sector, members)| (sector, nan_mean(&members)))
        .collect();

    scores
        .iter()
        .zip(sectors)
        .map(|(score, sector)| score - means[sector])
        .collect()
}

/// Applies [`neutralize_cross_section`] to every date and column of a panel.
#[derive(Debug, Clone)]
pub struct Neutralizer {
    config: NeutralizerConfig,
    sectors: Sectors,
}

impl Neutralizer {
    /// Creates a neutralizer for a universe.
    #[must_use]
    pub const fn new(config: NeutralizerConfig, sectors: Sectors) -> Self {
        Self { config, sectors }
    }

    /// Neutralizes the listed columns of an instrument keyed panel. The
    /// output carries the [`SECTOR`](ronda_traits::SECTOR) label used for
    /// each row.
    ///
    /// # Arguments
    ///
    /// * `panel` - Rows keyed by `(trade_date, instrument)`
    /// * `renames` - Pairs of (input column, output column)
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InvalidData`] if an instrument has no sector and
    /// [`RondaError::MissingColumn`] if an input column is absent.
    pub fn neutralize(&self, panel: &Panel, renames: &[(String, String)]) -> Result<Panel> {
        let dates = panel.dates()?;
        let instruments = panel.instruments()?;
        let sectors: Vec<&str> = instruments
            .iter()
            .map(|i| {
                self.sectors.get(i).map(String::as_str).ok_or_else(|| {
                    RondaError::InvalidData(format!("instrument {i} has no sector"))
                })
            })
            .collect::<Result<_>>()?;

        let mut rows_by_date: BTreeMap<Date, Vec<usize>> = BTreeMap::new();
        for (row, date) in dates.iter().enumerate() {
            rows_by_date.entry(*date).or_default().push(row);
        }

        let mut columns = Vec::with_capacity(renames.len());
        for (input, output) in renames {
            let values = panel.values(input)?;
            let mut neutral = vec![f64::NAN; values.len()];
            for rows in rows_by_date.values() {
                let section: Vec<f64> = rows.iter().map(|&r| values[r]).collect();
                let section_sectors: Vec<&str> = rows.iter().map(|&r| sectors[r]).collect();
                let out = neutralize_cross_section(&section, &section_sectors, self.config.min_obs);
                for (&r, v) in rows.iter().zip(out) {
                    neutral[r] = v;
                }
            }
            columns.push((output.clone(), neutral));
        }

        let labels = sectors.into_iter().map(str::to_string).collect();
        Panel::from_columns(&dates, Some(&instruments), columns)?.with_sectors(labels)
    }
}

/// Reads a raw table over a date range, neutralizes it and appends the
/// result to the neutral table.
#[derive(Debug, Clone)]
pub struct NeutralizeJob {
    source: PanelTable,
    target: PanelTable,
    renames: Vec<(String, String)>,
    neutralizer: Neutralizer,
}

impl NeutralizeJob {
    /// Creates a job. `renames` pairs source columns with target columns.
    pub const fn new(
        source: PanelTable,
        target: PanelTable,
        renames: Vec<(String, String)>,
        neutralizer: Neutralizer,
    ) -> Self {
        Self {
            source,
            target,
            renames,
            neutralizer,
        }
    }

    /// Storage key of the output table.
    pub fn save_id(&self) -> &str {
        self.target.save_id()
    }

    /// Runs the job over `[bgn, stp)`, returning the number of rows written.
    pub fn run(&self, bgn: Date, stp: Date, calendar: &dyn TradingCalendar) -> Result<usize> {
        let columns: Vec<&str> = self.renames.iter().map(|(c, _)| c.as_str()).collect();
        let raw = self.source.read_by_range(bgn, stp, &columns)?;
        debug!(source = %self.source.save_id(), rows = raw.len(), "neutralizing");
        let neutral = self.neutralizer.neutralize(&raw, &self.renames)?;
        self.target.update(&neutral, calendar)
    }
}
