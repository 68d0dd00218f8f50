//! Rank long-short signal generation with trailing moving-average smoothing.
//!
//! Each date's eligible instruments are sorted by value descending (ties by
//! instrument ascending); the top half goes long, the bottom half short and
//! the median of an odd count flat. Weights are scaled to unit gross exposure,
//! averaged over the trailing `maw` trading days with absent cells counted as
//! zero, and scaled to unit gross exposure again.

use ronda_store::{PanelTable, schemas};
use ronda_traits::stats::abs_sum;
use ronda_traits::{CrossSection, Date, Panel, Result, TableRef, TradingCalendar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Raw positions for `n` instruments sorted best first:
/// `n / 2` longs, one flat position if `n` is odd, `n / 2` shorts.
pub fn raw_positions(n: usize) -> Vec<f64> {
    let half = n / 2;
    let mut positions = vec![1.0; half];
    positions.extend(std::iter::repeat_n(0.0, n % 2));
    positions.extend(std::iter::repeat_n(-1.0, half));
    positions
}

/// Scales a cross-section to unit gross exposure; all zeros if there is
/// nothing to scale.
pub fn normalize_gross(section: &mut CrossSection) {
    let total = abs_sum(&section.iter().map(|(_, w)| *w).collect::<Vec<_>>());
    for (_, weight) in section.iter_mut() {
        *weight = if total > 0.0 && weight.is_finite() {
            *weight / total
        } else {
            0.0
        };
    }
}

/// Maps one cross-section of factor values to normalized long-short weights.
///
/// Instruments with a non-finite value are not eligible and are left out.
///
/// # Example
///
/// ```
/// use ronda_signals::generator::rank_long_short;
///
/// let section = vec![
///     ("A".to_string(), 10.0),
///     ("B".to_string(), 20.0),
///     ("C".to_string(), 5.0),
///     ("D".to_string(), 15.0),
/// ];
/// let weights = rank_long_short(&section);
/// assert_eq!(weights[0], ("B".to_string(), 0.25));
/// assert_eq!(weights[3], ("C".to_string(), -0.25));
/// ```
pub fn rank_long_short(section: &[(String, f64)]) -> CrossSection {
    let mut eligible: Vec<&(String, f64)> = section.iter().filter(|(_, v)| v.is_finite()).collect();
    eligible.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut weights: CrossSection = eligible
        .iter()
        .zip(raw_positions(eligible.len()))
        .map(|((instrument, _), position)| (instrument.clone(), position))
        .collect();
    normalize_gross(&mut weights);
    weights
}

/// Trailing moving average over a date × instrument weight matrix.
///
/// Every output date carries the union of instruments seen in any input
/// date, sorted by instrument. Missing cells count as zero. Early dates with
/// fewer than `maw` predecessors average over the rows available.
pub fn moving_average(
    dates: &[Date],
    sections: &BTreeMap<Date, CrossSection>,
    maw: usize,
) -> BTreeMap<Date, CrossSection> {
    let instruments: Vec<&String> = sections
        .values()
        .flat_map(|s| s.iter().map(|(i, _)| i))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let column: BTreeMap<&String, usize> = instruments.iter().enumerate().map(|(k, i)| (*i, k)).collect();

    let matrix: Vec<Vec<f64>> = dates
        .iter()
        .map(|date| {
            let mut row = vec![0.0; instruments.len()];
            for (instrument, weight) in sections.get(date).into_iter().flatten() {
                if weight.is_finite() {
                    row[column[instrument]] = *weight;
                }
            }
            row
        })
        .collect();

    let maw = maw.max(1);
    dates
        .iter()
        .enumerate()
        .map(|(t, date)| {
            let window = &matrix[t.saturating_sub(maw - 1)..=t];
            let count = window.len() as f64;
            let averaged = instruments
                .iter()
                .enumerate()
                .map(|(k, instrument)| {
                    let sum: f64 = window.iter().map(|row| row[k]).sum();
                    ((*instrument).clone(), sum / count)
                })
                .collect();
            (*date, averaged)
        })
        .collect()
}

/// Configuration for the signal generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalGeneratorConfig {
    /// Moving average window in trading days; 1 disables smoothing.
    pub maw: usize,
}

impl Default for SignalGeneratorConfig {
    fn default() -> Self {
        Self { maw: 1 }
    }
}

/// Converts a single-column factor panel into weight cross-sections.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: SignalGeneratorConfig,
}

impl SignalGenerator {
    /// Create a new generator with the given configuration.
    #[must_use]
    pub const fn new(config: SignalGeneratorConfig) -> Self {
        Self { config }
    }

    /// Moving average window.
    #[must_use]
    pub const fn maw(&self) -> usize {
        self.config.maw
    }

    /// First date to load so the average at `first_output` sees `maw` rows,
    /// clamped to the start of the calendar.
    pub fn lookback_start(&self, first_output: Date, calendar: &dyn TradingCalendar) -> Result<Date> {
        let back = self.config.maw.max(1) as i64 - 1;
        calendar.shift_clamped(first_output, -back)
    }

    /// Generates weights for the output dates.
    ///
    /// # Arguments
    ///
    /// * `values` - Factor cross-sections covering the lookback window
    /// * `window` - Every trading date from the lookback start through the
    ///   last output date
    /// * `first_output` - First date kept in the output
    pub fn generate(
        &self,
        values: &BTreeMap<Date, CrossSection>,
        window: &[Date],
        first_output: Date,
    ) -> BTreeMap<Date, CrossSection> {
        let raw: BTreeMap<Date, CrossSection> = window
            .iter()
            .map(|date| {
                let section = values.get(date).map_or_else(Vec::new, |s| rank_long_short(s));
                (*date, section)
            })
            .collect();

        moving_average(window, &raw, self.config.maw)
            .into_iter()
            .filter(|(date, _)| *date >= first_output)
            .map(|(date, mut section)| {
                normalize_gross(&mut section);
                (date, section)
            })
            .collect()
    }
}

/// Generates one signal over a date range from a single input column and
/// appends it to the signal table.
#[derive(Debug, Clone)]
pub struct SignalJob {
    input: TableRef,
    output: PanelTable,
    generator: SignalGenerator,
}

impl SignalJob {
    /// Creates a job writing signal `signal_id` under `signal_dir`.
    pub fn new(input: TableRef, signal_dir: &Path, signal_id: &str, generator: SignalGenerator) -> Self {
        Self {
            input,
            output: PanelTable::new(signal_dir, signal_id, schemas::signal()),
            generator,
        }
    }

    /// Signal id.
    pub fn save_id(&self) -> &str {
        self.output.save_id()
    }

    /// Runs the job over `[bgn, stp)`.
    pub fn run(&self, bgn: Date, stp: Date, calendar: &dyn TradingCalendar) -> Result<usize> {
        let header = calendar.dates_header(bgn, stp);
        let Some(first) = header.first().copied() else {
            return Ok(0);
        };
        let load_bgn = self.generator.lookback_start(first, calendar)?;
        let window = calendar.dates_header(load_bgn, stp);

        let column = self.input.column();
        let source = PanelTable::new(
            self.input.dir(),
            self.input.save_id(),
            schemas::factor(&[column.to_string()]),
        );
        let values = source.read_by_range(load_bgn, stp, &[column])?.cross_sections(column)?;
        debug!(
            signal = %self.save_id(),
            load_bgn = %load_bgn,
            history = window.len() - header.len(),
            "generating"
        );

        let weights = self.generator.generate(&values, &window, first);
        let panel = Panel::from_cross_sections(&weights, schemas::WEIGHT)?;
        self.output.update(&panel, calendar)
    }
}
