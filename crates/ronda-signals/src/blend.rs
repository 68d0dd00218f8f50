//! Signals blended from member signals with optimizer weights.

use crate::generator::normalize_gross;
use ronda_store::{PanelTable, schemas};
use ronda_traits::{CrossSection, Date, Panel, Result, TableRef, TradingCalendar};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Weighted sum of member cross-sections, scaled to unit gross exposure.
///
/// Members with a non-finite weight are skipped. Output instruments are
/// sorted.
pub fn blend_sections(members: &[(f64, &CrossSection)]) -> CrossSection {
    let mut blended: BTreeMap<&str, f64> = BTreeMap::new();
    for (weight, section) in members {
        if !weight.is_finite() {
            continue;
        }
        for (instrument, w) in section.iter() {
            if w.is_finite() {
                *blended.entry(instrument.as_str()).or_insert(0.0) += weight * w;
            }
        }
    }
    let mut section: CrossSection = blended
        .into_iter()
        .map(|(instrument, w)| (instrument.to_string(), w))
        .collect();
    normalize_gross(&mut section);
    section
}

/// Blends member signals with the optimizer weights of their group.
#[derive(Debug, Clone)]
pub struct BlendJob {
    weights: PanelTable,
    members: Vec<(String, TableRef)>,
    output: PanelTable,
}

impl BlendJob {
    /// Creates a job.
    ///
    /// # Arguments
    ///
    /// * `weights_dir` - Directory of optimizer weight tables
    /// * `group_id` - Storage key of the group's weights, also the signal id
    /// * `members` - Candidate name and signal handle of every member
    /// * `signal_dir` - Directory the blended signal is written to
    pub fn new(weights_dir: &Path, group_id: &str, members: Vec<(String, TableRef)>, signal_dir: &Path) -> Self {
        let candidates: Vec<String> = members.iter().map(|(c, _)| c.clone()).collect();
        Self {
            weights: PanelTable::new(weights_dir, group_id, schemas::opt_weight(&candidates)),
            members,
            output: PanelTable::new(signal_dir, group_id, schemas::signal()),
        }
    }

    /// Signal id.
    pub fn save_id(&self) -> &str {
        self.output.save_id()
    }

    /// Runs the job over `[bgn, stp)`.
    ///
    /// Dates without optimizer weights yet are not written.
    pub fn run(&self, bgn: Date, stp: Date, calendar: &dyn TradingCalendar) -> Result<usize> {
        let weights = self.weights.read_by_range(bgn, stp, &[])?;
        let weight_dates = weights.dates()?;
        let columns: Vec<Vec<f64>> = self
            .members
            .iter()
            .map(|(candidate, _)| weights.values(candidate))
            .collect::<Result<_>>()?;

        let signals: Vec<BTreeMap<Date, CrossSection>> = self
            .members
            .iter()
            .map(|(_, sig)| {
                PanelTable::new(sig.dir(), sig.save_id(), schemas::signal())
                    .read_by_range(bgn, stp, &[schemas::WEIGHT])?
                    .cross_sections(schemas::WEIGHT)
            })
            .collect::<Result<_>>()?;

        let empty = CrossSection::new();
        let mut out: BTreeMap<Date, CrossSection> = BTreeMap::new();
        for (row, date) in weight_dates.iter().enumerate() {
            if columns.iter().all(|c| !c[row].is_finite()) {
                continue;
            }
            let members: Vec<(f64, &CrossSection)> = columns
                .iter()
                .zip(&signals)
                .map(|(c, s)| (c[row], s.get(date).unwrap_or(&empty)))
                .collect();
            out.insert(*date, blend_sections(&members));
        }
        debug!(signal = %self.save_id(), dates = out.len(), "blended");

        let panel = Panel::from_cross_sections(&out, schemas::WEIGHT)?;
        self.output.update(&panel, calendar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ronda_traits::Calendar;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn section(pairs: &[(&str, f64)]) -> CrossSection {
        pairs.iter().map(|(i, v)| (i.to_string(), *v)).collect()
    }

    #[test]
    fn test_blend_sections() {
        let s1 = section(&[("a", 0.5), ("b", -0.5)]);
        let s2 = section(&[("b", 0.5), ("c", -0.5)]);
        let out = blend_sections(&[(0.75, &s1), (0.25, &s2)]);
        // raw: a 0.375, b -0.25, c -0.125, gross 0.75
        assert_eq!(out.len(), 3);
        assert_abs_diff_eq!(out[0].1, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1].1, -1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[2].1, -1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_blend_skips_nan_weight() {
        let s1 = section(&[("a", 0.5), ("b", -0.5)]);
        let s2 = section(&[("a", -0.5), ("b", 0.5)]);
        let out = blend_sections(&[(1.0, &s1), (f64::NAN, &s2)]);
        assert_eq!(out, s1);
    }

    #[test]
    fn test_blend_job() {
        let dir = tempfile::tempdir().unwrap();
        let cal = Calendar::new(vec![d(2), d(3), d(4)]);
        let sig_dir = dir.path().join("signals");
        let opt_dir = dir.path().join("optimize");

        for (id, weights) in [("M0000", [0.5, -0.5]), ("M0001", [-0.5, 0.5])] {
            let table = PanelTable::new(&sig_dir, id, schemas::signal());
            let dates = [d(2), d(2), d(3), d(3)];
            let instruments: Vec<String> = ["a", "b", "a", "b"].iter().map(|s| s.to_string()).collect();
            let values = vec![weights[0], weights[1], weights[0], weights[1]];
            let panel = Panel::from_columns(&dates, Some(&instruments), vec![("weight".to_string(), values)]).unwrap();
            table.update(&panel, &cal).unwrap();
        }

        let candidates = vec!["M0000".to_string(), "M0001".to_string()];
        let weights = PanelTable::new(&opt_dir, "G1.Opn001L1RAW", schemas::opt_weight(&candidates));
        let panel = Panel::from_columns(
            &[d(3)],
            None,
            vec![("M0000".to_string(), vec![0.9]), ("M0001".to_string(), vec![0.1])],
        )
        .unwrap();
        weights.update(&panel, &cal).unwrap();

        let job = BlendJob::new(
            &opt_dir,
            "G1.Opn001L1RAW",
            candidates
                .iter()
                .map(|c| (c.clone(), TableRef::new(&sig_dir, c.as_str(), "weight")))
                .collect(),
            &sig_dir,
        );
        // 2024-01-02 has no optimizer weights and is not written
        assert_eq!(job.run(d(2), d(4), &cal).unwrap(), 2);

        let blended = PanelTable::new(&sig_dir, "G1.Opn001L1RAW", schemas::signal())
            .read(&[])
            .unwrap()
            .cross_sections("weight")
            .unwrap();
        assert_eq!(blended.keys().copied().collect::<Vec<_>>(), vec![d(3)]);
        assert_abs_diff_eq!(blended[&d(3)][0].1, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(blended[&d(3)][1].1, -0.5, epsilon = 1e-12);
    }
}
