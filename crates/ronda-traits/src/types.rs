//! Common types used throughout the Ronda pipeline.
//!
//! The universal currency between stages is the [`Panel`]: a table keyed by
//! `trade_date` (and usually `instrument`) with one or more named `f64`
//! value columns.

use crate::{Result, RondaError};
use polars::prelude::*;
use std::collections::BTreeMap;

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// An instrument identifier, e.g. a futures product code like "cu" or "IF".
pub type Instrument = String;

/// Name of the date key column.
pub const TRADE_DATE: &str = "trade_date";

/// Name of the instrument key column.
pub const INSTRUMENT: &str = "instrument";

/// Name of the sector label column carried by neutralized panels.
pub const SECTOR: &str = "sector";

/// One cross-section: instrument and value pairs observed on a single date.
pub type CrossSection = Vec<(Instrument, f64)>;

/// Primary key layout of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Keyed by `trade_date` alone (NAV records, optimizer weights).
    Date,
    /// Keyed by `(trade_date, instrument)` (factors, returns, signals).
    DateInstrument,
}

impl KeyKind {
    /// The key column names in storage order.
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Date => &[TRADE_DATE],
            Self::DateInstrument => &[TRADE_DATE, INSTRUMENT],
        }
    }
}

/// Converts a date to days since the Unix epoch, the physical layout of a
/// polars `Date` column.
pub fn date_to_days(date: Date) -> i32 {
    (date - Date::default()).num_days() as i32
}

/// Inverse of [`date_to_days`].
pub fn days_to_date(days: i32) -> Date {
    Date::default() + chrono::TimeDelta::days(i64::from(days))
}

/// A date and optionally instrument keyed table of numeric observations.
///
/// `Panel` wraps a Polars DataFrame. Key columns are always named
/// [`TRADE_DATE`] (polars `Date`) and [`INSTRUMENT`] (string). An optional
/// [`SECTOR`] string label follows the keys; every other column is a value
/// column stored as `Float64`. Missing values are read
/// back as `NaN`.
///
/// # Example
///
/// ```no_run
/// use ronda_traits::{Date, Panel};
///
/// let d = Date::from_ymd_opt(2024, 1, 2).unwrap();
/// let panel = Panel::from_columns(
///     &[d, d],
///     Some(&["cu".to_string(), "al".to_string()]),
///     vec![("weight".to_string(), vec![0.5, -0.5])],
/// ).unwrap();
/// assert_eq!(panel.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Panel {
    data: DataFrame,
}

impl Panel {
    /// Creates a panel from an existing DataFrame.
    ///
    /// The frame is expected to carry a `trade_date` column.
    pub const fn new(data: DataFrame) -> Self {
        Self { data }
    }

    /// Builds a panel from key vectors and named value columns.
    ///
    /// # Arguments
    ///
    /// * `dates` - One trade date per row
    /// * `instruments` - One instrument per row, or `None` for a date keyed panel
    /// * `values` - Value columns, each with one entry per row
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InvalidData`] if any column length differs from
    /// the number of dates.
    pub fn from_columns(
        dates: &[Date],
        instruments: Option<&[Instrument]>,
        values: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let n = dates.len();
        let mut columns = Vec::with_capacity(values.len() + 2);
        let days: Vec<i32> = dates.iter().map(|d| date_to_days(*d)).collect();
        columns.push(Column::new(TRADE_DATE.into(), days).cast(&DataType::Date)?);

        if let Some(instruments) = instruments {
            if instruments.len() != n {
                return Err(RondaError::InvalidData(format!(
                    "{} instruments for {} dates",
                    instruments.len(),
                    n
                )));
            }
            columns.push(Column::new(INSTRUMENT.into(), instruments.to_vec()));
        }

        for (name, column) in values {
            if column.len() != n {
                return Err(RondaError::InvalidData(format!(
                    "column {} has {} rows, expected {}",
                    name,
                    column.len(),
                    n
                )));
            }
            columns.push(Column::new(name.into(), column));
        }

        Ok(Self::new(DataFrame::new(columns)?))
    }

    /// Attaches a sector label to every row, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InvalidData`] if the label count differs from
    /// the number of rows.
    pub fn with_sectors(self, sectors: Vec<String>) -> Result<Self> {
        if sectors.len() != self.len() {
            return Err(RondaError::InvalidData(format!(
                "{} sectors for {} rows",
                sectors.len(),
                self.len()
            )));
        }
        let mut data = self.data;
        data.with_column(Column::new(SECTOR.into(), sectors))?;
        let panel = Self::new(data);
        let values = panel.value_columns();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        panel.select(&values)
    }

    /// Builds an instrument keyed panel from per-date cross-sections of a
    /// single value column. Rows come out ordered by date then by the order
    /// inside each cross-section.
    pub fn from_cross_sections(
        sections: &BTreeMap<Date, CrossSection>,
        column: &str,
    ) -> Result<Self> {
        let rows: usize = sections.values().map(Vec::len).sum();
        let mut dates = Vec::with_capacity(rows);
        let mut instruments = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for (date, section) in sections {
            for (instrument, value) in section {
                dates.push(*date);
                instruments.push(instrument.clone());
                values.push(*value);
            }
        }
        Self::from_columns(
            &dates,
            Some(&instruments),
            vec![(column.to_string(), values)],
        )
    }

    /// Builds a date keyed panel from a single series.
    pub fn from_series(series: &[(Date, f64)], column: &str) -> Result<Self> {
        let dates: Vec<Date> = series.iter().map(|(d, _)| *d).collect();
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        Self::from_columns(&dates, None, vec![(column.to_string(), values)])
    }

    /// Returns a reference to the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Consumes self and returns the underlying DataFrame.
    pub fn into_inner(self) -> DataFrame {
        self.data
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Returns whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Returns the key layout inferred from the columns present.
    pub fn key_kind(&self) -> KeyKind {
        if self.has_column(INSTRUMENT) {
            KeyKind::DateInstrument
        } else {
            KeyKind::Date
        }
    }

    /// Returns all column names.
    pub fn columns(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Returns the value column names, i.e. every non-key column.
    pub fn value_columns(&self) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|c| c != TRADE_DATE && c != INSTRUMENT && c != SECTOR)
            .collect()
    }

    /// Checks if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.data
            .get_column_names()
            .iter()
            .any(|s| s.as_str() == name)
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.data
            .column(name)
            .map_err(|_| RondaError::MissingColumn(name.to_string()))
    }

    /// Returns the trade date of every row.
    pub fn dates(&self) -> Result<Vec<Date>> {
        let column = self.column(TRADE_DATE)?.cast(&DataType::Int32)?;
        column
            .i32()?
            .into_iter()
            .map(|d| {
                d.map(days_to_date)
                    .ok_or_else(|| RondaError::InvalidData("null trade_date".to_string()))
            })
            .collect()
    }

    /// Returns the instrument of every row.
    pub fn instruments(&self) -> Result<Vec<Instrument>> {
        self.column(INSTRUMENT)?
            .str()?
            .into_iter()
            .map(|s| {
                s.map(str::to_string)
                    .ok_or_else(|| RondaError::InvalidData("null instrument".to_string()))
            })
            .collect()
    }

    /// Returns the sector label of every row.
    pub fn sectors(&self) -> Result<Vec<String>> {
        self.column(SECTOR)?
            .str()?
            .into_iter()
            .map(|s| {
                s.map(str::to_string)
                    .ok_or_else(|| RondaError::InvalidData("null sector".to_string()))
            })
            .collect()
    }

    /// Returns a value column as `f64`, nulls mapped to `NaN`.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?.cast(&DataType::Float64)?;
        Ok(column
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    /// Returns the last (largest) trade date, if any.
    pub fn last_date(&self) -> Result<Option<Date>> {
        Ok(self.dates()?.into_iter().max())
    }

    /// Returns the distinct trade dates in ascending order.
    pub fn unique_dates(&self) -> Result<Vec<Date>> {
        let mut dates = self.dates()?;
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    /// Keeps the rows whose trade date lies in `[bgn, stp)`.
    pub fn filter_range(&self, bgn: Date, stp: Date) -> Result<Self> {
        let mask: BooleanChunked = self
            .dates()?
            .iter()
            .map(|d| *d >= bgn && *d < stp)
            .collect();
        Ok(Self::new(self.data.filter(&mask)?))
    }

    /// Projects the panel onto its key columns, the sector label if present,
    /// and the given value columns.
    pub fn select(&self, columns: &[&str]) -> Result<Self> {
        let mut names: Vec<String> = self
            .key_kind()
            .columns()
            .iter()
            .map(|c| c.to_string())
            .collect();
        if self.has_column(SECTOR) {
            names.push(SECTOR.to_string());
        }
        for column in columns {
            if !self.has_column(column) {
                return Err(RondaError::MissingColumn(column.to_string()));
            }
            names.push(column.to_string());
        }
        Ok(Self::new(self.data.select(names)?))
    }

    /// Appends the rows of `other`, which must have identical columns.
    pub fn vstack(&self, other: &Self) -> Result<Self> {
        if self.columns() != other.columns() {
            return Err(RondaError::Schema(format!(
                "cannot stack {:?} onto {:?}",
                other.columns(),
                self.columns()
            )));
        }
        Ok(Self::new(self.data.vstack(&other.data)?))
    }

    /// Groups one value column of an instrument keyed panel into per-date
    /// cross-sections, preserving row order within each date.
    pub fn cross_sections(&self, column: &str) -> Result<BTreeMap<Date, CrossSection>> {
        let dates = self.dates()?;
        let instruments = self.instruments()?;
        let values = self.values(column)?;
        let mut sections: BTreeMap<Date, CrossSection> = BTreeMap::new();
        for ((date, instrument), value) in dates.into_iter().zip(instruments).zip(values) {
            sections.entry(date).or_default().push((instrument, value));
        }
        Ok(sections)
    }

    /// Returns one value column of a date keyed panel as `(date, value)` pairs.
    pub fn series(&self, column: &str) -> Result<Vec<(Date, f64)>> {
        Ok(self.dates()?.into_iter().zip(self.values(column)?).collect())
    }
}

impl From<DataFrame> for Panel {
    fn from(data: DataFrame) -> Self {
        Self::new(data)
    }
}

impl AsRef<DataFrame> for Panel {
    fn as_ref(&self) -> &DataFrame {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn sample() -> Panel {
        Panel::from_columns(
            &[d(1), d(1), d(4), d(4)],
            Some(&["a".to_string(), "b".to_string(), "a".to_string(), "b".to_string()]),
            vec![("weight".to_string(), vec![0.5, -0.5, f64::NAN, 1.0])],
        )
        .unwrap()
    }

    #[test]
    fn test_date_days_conversion() {
        assert_eq!(date_to_days(Date::default()), 0);
        assert_eq!(days_to_date(date_to_days(d(4))), d(4));
    }

    #[test]
    fn test_panel_accessors() {
        let panel = sample();
        assert_eq!(panel.len(), 4);
        assert_eq!(panel.key_kind(), KeyKind::DateInstrument);
        assert_eq!(panel.value_columns(), vec!["weight".to_string()]);
        assert_eq!(panel.dates().unwrap(), vec![d(1), d(1), d(4), d(4)]);
        assert_eq!(panel.instruments().unwrap()[1], "b");
        assert!(panel.values("weight").unwrap()[2].is_nan());
        assert_eq!(panel.last_date().unwrap(), Some(d(4)));
        assert_eq!(panel.unique_dates().unwrap(), vec![d(1), d(4)]);
    }

    #[test]
    fn test_missing_column() {
        let err = sample().values("nav").unwrap_err();
        assert!(matches!(err, RondaError::MissingColumn(_)));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = Panel::from_columns(&[d(1)], None, vec![("nav".to_string(), vec![])]);
        assert!(matches!(result, Err(RondaError::InvalidData(_))));
    }

    #[test]
    fn test_filter_range_half_open() {
        let filtered = sample().filter_range(d(1), d(4)).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.unique_dates().unwrap(), vec![d(1)]);
    }

    #[test]
    fn test_cross_sections() {
        let sections = sample().cross_sections("weight").unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[&d(1)], vec![("a".to_string(), 0.5), ("b".to_string(), -0.5)]);
        let rebuilt = Panel::from_cross_sections(&sections, "weight").unwrap();
        assert_eq!(rebuilt.len(), 4);
    }

    #[test]
    fn test_vstack_requires_same_columns() {
        let nav = Panel::from_series(&[(d(1), 1.0)], "nav").unwrap();
        let other = Panel::from_series(&[(d(4), 1.1)], "net_ret").unwrap();
        assert!(nav.vstack(&other).is_err());
        let more = Panel::from_series(&[(d(4), 1.1)], "nav").unwrap();
        assert_eq!(nav.vstack(&more).unwrap().len(), 2);
    }

    #[test]
    fn test_sector_label_follows_keys() {
        let labelled = sample().with_sectors(vec!["X".into(), "Y".into(), "X".into(), "Y".into()]).unwrap();
        assert_eq!(labelled.columns(), vec![TRADE_DATE, INSTRUMENT, SECTOR, "weight"]);
        assert_eq!(labelled.value_columns(), vec!["weight".to_string()]);
        assert_eq!(labelled.sectors().unwrap()[1], "Y");
        assert_eq!(labelled.key_kind(), KeyKind::DateInstrument);

        let projected = labelled.filter_range(d(4), d(5)).unwrap().select(&["weight"]).unwrap();
        assert_eq!(projected.sectors().unwrap(), vec!["X".to_string(), "Y".to_string()]);

        assert!(sample().with_sectors(vec!["X".into()]).is_err());
        assert!(matches!(sample().sectors(), Err(RondaError::MissingColumn(_))));
    }
}
