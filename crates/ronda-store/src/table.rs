//! Append-only panel tables stored as parquet files.
//!
//! A table lives at `<root_dir>/<save_id>.parquet`. Writes are atomic: the
//! full table is written to a `.tmp` sibling and renamed into place, so a
//! rejected or failed append leaves the previous file untouched.

use polars::prelude::*;
use ronda_traits::{Date, INSTRUMENT, KeyKind, Panel, Result, RondaError, SECTOR, TradingCalendar};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Declared layout of a table: key columns, an optional sector label and
/// ordered value columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    key: KeyKind,
    sector: bool,
    values: Vec<String>,
}

impl TableSchema {
    /// Creates a schema without a sector label.
    pub const fn new(key: KeyKind, values: Vec<String>) -> Self {
        Self {
            key,
            sector: false,
            values,
        }
    }

    /// Declares a [`SECTOR`] label column after the keys.
    #[must_use]
    pub fn with_sector(mut self) -> Self {
        self.sector = true;
        self
    }

    /// Key layout.
    pub const fn key(&self) -> KeyKind {
        self.key
    }

    /// Whether rows carry a sector label.
    pub const fn has_sector(&self) -> bool {
        self.sector
    }

    /// Value column names in storage order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn empty_panel(&self, columns: &[&str]) -> Result<Panel> {
        let instruments: Vec<String> = Vec::new();
        let instruments = (self.key == KeyKind::DateInstrument).then_some(instruments.as_slice());
        let values = columns
            .iter()
            .map(|c| (c.to_string(), Vec::new()))
            .collect();
        let panel = Panel::from_columns(&[], instruments, values)?;
        if self.sector {
            panel.with_sectors(Vec::new())
        } else {
            Ok(panel)
        }
    }
}

/// One persisted table keyed by `(root_dir, save_id)`.
#[derive(Debug, Clone)]
pub struct PanelTable {
    root_dir: PathBuf,
    save_id: String,
    schema: TableSchema,
}

impl PanelTable {
    /// Creates a handle; nothing is touched on disk until the first update.
    pub fn new(root_dir: impl Into<PathBuf>, save_id: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            root_dir: root_dir.into(),
            save_id: save_id.into(),
            schema,
        }
    }

    /// Storage key.
    pub fn save_id(&self) -> &str {
        &self.save_id
    }

    /// Declared schema.
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Path of the parquet file.
    pub fn path(&self) -> PathBuf {
        self.root_dir.join(format!("{}.parquet", self.save_id))
    }

    /// Whether the table has been written.
    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    fn resolve<'a>(&'a self, columns: &[&'a str]) -> Vec<&'a str> {
        if columns.is_empty() {
            self.schema.values.iter().map(String::as_str).collect()
        } else {
            columns.to_vec()
        }
    }

    /// Reads every row. An empty `columns` slice selects all value columns.
    ///
    /// A table that does not exist yet reads as an empty panel.
    pub fn read(&self, columns: &[&str]) -> Result<Panel> {
        let columns = self.resolve(columns);
        if !self.exists() {
            return self.schema.empty_panel(&columns);
        }
        let file = fs::File::open(self.path())?;
        let df = ParquetReader::new(file).finish()?;
        Panel::new(df).select(&columns)
    }

    /// Reads the rows whose date lies in `[bgn, stp)`.
    pub fn read_by_range(&self, bgn: Date, stp: Date, columns: &[&str]) -> Result<Panel> {
        self.read(columns)?.filter_range(bgn, stp)
    }

    /// Last persisted date, `None` for an empty or missing table.
    pub fn last_date(&self) -> Result<Option<Date>> {
        if !self.exists() {
            return Ok(None);
        }
        self.read(&[])?.last_date()
    }

    /// Verifies that `first_new` is exactly the trading day after the last
    /// persisted date. An empty table accepts any date.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::Continuity`] for a gap or an overlap.
    pub fn check_continuity(&self, first_new: Date, calendar: &dyn TradingCalendar) -> Result<()> {
        let Some(last) = self.last_date()? else {
            return Ok(());
        };
        let expected = calendar.next_date(last, 1)?;
        if first_new == expected {
            Ok(())
        } else {
            Err(RondaError::Continuity {
                table: self.path().display().to_string(),
                last,
                expected,
                found: first_new,
            })
        }
    }

    fn validate(&self, panel: &Panel, calendar: &dyn TradingCalendar) -> Result<Panel> {
        if panel.key_kind() != self.schema.key {
            return Err(RondaError::Schema(format!(
                "{}: expected {:?} keys, got {:?}",
                self.save_id,
                self.schema.key,
                panel.key_kind()
            )));
        }
        if panel.has_column(SECTOR) != self.schema.sector {
            return Err(RondaError::Schema(format!(
                "{}: sector label expected {}, found {}",
                self.save_id,
                self.schema.sector,
                panel.has_column(SECTOR)
            )));
        }
        let values: Vec<&str> = self.schema.values.iter().map(String::as_str).collect();
        let ordered = panel.select(&values).map_err(|e| match e {
            RondaError::MissingColumn(c) => {
                RondaError::Schema(format!("{}: value column '{c}' missing", self.save_id))
            }
            other => other,
        })?;
        if ordered.columns().len() != panel.columns().len() {
            return Err(RondaError::Schema(format!(
                "{}: unexpected columns in {:?}",
                self.save_id,
                panel.columns()
            )));
        }

        let dates = ordered.dates()?;
        if dates.windows(2).any(|w| w[1] < w[0]) {
            return Err(RondaError::InvalidData(format!(
                "{}: rows are not in date order",
                self.save_id
            )));
        }
        if let Some(bad) = dates.iter().find(|d| !calendar.contains(**d)) {
            return Err(RondaError::InvalidData(format!(
                "{}: {bad} is not a trading day",
                self.save_id
            )));
        }
        if ordered.has_column(INSTRUMENT) {
            let instruments = ordered.instruments()?;
            let mut seen = HashSet::with_capacity(dates.len());
            for key in dates.iter().zip(instruments.iter()) {
                if !seen.insert(key) {
                    return Err(RondaError::InvalidData(format!(
                        "{}: duplicate row {} {}",
                        self.save_id, key.0, key.1
                    )));
                }
            }
        } else if dates.windows(2).any(|w| w[0] == w[1]) {
            return Err(RondaError::InvalidData(format!(
                "{}: duplicate dates",
                self.save_id
            )));
        }
        Ok(ordered)
    }

    /// Appends rows after schema and continuity checks.
    ///
    /// Returns the number of rows written. An empty panel is a no-op.
    ///
    /// # Errors
    ///
    /// [`RondaError::Schema`] on a layout mismatch and
    /// [`RondaError::Continuity`] when the first new date does not follow the
    /// last persisted one; the file is unchanged in both cases.
    pub fn update(&self, panel: &Panel, calendar: &dyn TradingCalendar) -> Result<usize> {
        if panel.is_empty() {
            debug!(table = %self.save_id, "nothing to append");
            return Ok(0);
        }
        let ordered = self.validate(panel, calendar)?;
        let dates = ordered.dates()?;
        let first_new = dates[0];
        self.check_continuity(first_new, calendar)?;

        let combined = if self.exists() {
            self.read(&[])?.vstack(&ordered)?
        } else {
            ordered
        };

        write_atomic(combined.data(), &self.path())?;
        info!(
            table = %self.save_id,
            rows = panel.len(),
            from = %first_new,
            to = %dates[dates.len() - 1],
            "appended"
        );
        Ok(panel.len())
    }
}

/// Writes a frame as zstd-compressed parquet through a temporary file.
///
/// Also used for artefacts that are not date keyed, such as evaluation
/// reports.
pub fn write_atomic(frame: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)?;
    let mut df = frame.clone();
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(&mut df)?;
    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ronda_traits::Calendar;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn calendar() -> Calendar {
        // 2024-01-02 .. 2024-01-12 without the weekend
        Calendar::new(vec![d(2), d(3), d(4), d(5), d(8), d(9), d(10), d(11), d(12)])
    }

    fn nav_table(dir: &Path) -> PanelTable {
        PanelTable::new(
            dir,
            "nav",
            TableSchema::new(KeyKind::Date, vec!["net_ret".to_string(), "nav".to_string()]),
        )
    }

    fn nav_rows(dates: &[Date]) -> Panel {
        let n = dates.len();
        Panel::from_columns(
            dates,
            None,
            vec![
                ("net_ret".to_string(), vec![0.01; n]),
                ("nav".to_string(), (1..=n).map(|i| 1.01_f64.powi(i as i32)).collect()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_missing_table_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = nav_table(dir.path());
        assert!(!table.exists());
        let panel = table.read(&[]).unwrap();
        assert!(panel.is_empty());
        assert_eq!(panel.value_columns(), vec!["net_ret", "nav"]);
        assert_eq!(table.last_date().unwrap(), None);
    }

    #[test]
    fn test_update_and_read_by_range() {
        let dir = tempfile::tempdir().unwrap();
        let table = nav_table(dir.path());
        let cal = calendar();
        assert_eq!(table.update(&nav_rows(&[d(2), d(3), d(4)]), &cal).unwrap(), 3);
        assert_eq!(table.update(&nav_rows(&[d(5), d(8)]), &cal).unwrap(), 2);

        assert_eq!(table.last_date().unwrap(), Some(d(8)));
        let all = table.read(&["nav"]).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all.value_columns(), vec!["nav"]);

        let window = table.read_by_range(d(3), d(5), &[]).unwrap();
        assert_eq!(window.dates().unwrap(), vec![d(3), d(4)]);
    }

    #[test]
    fn test_gap_is_rejected_and_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let table = nav_table(dir.path());
        let cal = calendar();
        table.update(&nav_rows(&[d(2), d(3)]), &cal).unwrap();
        let before = fs::read(table.path()).unwrap();

        let err = table.update(&nav_rows(&[d(5)]), &cal).unwrap_err();
        assert!(err.is_continuity());
        let err = table.update(&nav_rows(&[d(3), d(4)]), &cal).unwrap_err();
        assert!(err.is_continuity());

        assert_eq!(fs::read(table.path()).unwrap(), before);
        assert_eq!(table.last_date().unwrap(), Some(d(3)));
    }

    #[test]
    fn test_continuity_across_weekend() {
        let dir = tempfile::tempdir().unwrap();
        let table = nav_table(dir.path());
        let cal = calendar();
        table.update(&nav_rows(&[d(4), d(5)]), &cal).unwrap();
        assert!(table.check_continuity(d(8), &cal).is_ok());
        assert!(table.check_continuity(d(9), &cal).is_err());
    }

    #[test]
    fn test_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let table = nav_table(dir.path());
        let wrong = Panel::from_series(&[(d(2), 1.0)], "weight").unwrap();
        assert!(matches!(
            table.update(&wrong, &calendar()),
            Err(RondaError::Schema(_))
        ));

        let keyed = Panel::from_columns(
            &[d(2)],
            Some(&["cu".to_string()]),
            vec![("net_ret".to_string(), vec![0.0]), ("nav".to_string(), vec![1.0])],
        )
        .unwrap();
        assert!(matches!(
            table.update(&keyed, &calendar()),
            Err(RondaError::Schema(_))
        ));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let table = PanelTable::new(
            dir.path(),
            "sig",
            TableSchema::new(KeyKind::DateInstrument, vec!["weight".to_string()]),
        );
        let dup = Panel::from_columns(
            &[d(2), d(2)],
            Some(&["cu".to_string(), "cu".to_string()]),
            vec![("weight".to_string(), vec![0.5, -0.5])],
        )
        .unwrap();
        assert!(matches!(
            table.update(&dup, &calendar()),
            Err(RondaError::InvalidData(_))
        ));
    }

    #[test]
    fn test_sector_label_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let schema = TableSchema::new(KeyKind::DateInstrument, vec!["MTM010-NEU".to_string()]).with_sector();
        let table = PanelTable::new(dir.path(), "MTM", schema);
        assert_eq!(table.read(&[]).unwrap().sectors().unwrap(), Vec::<String>::new());

        let instruments = vec!["al".to_string(), "cu".to_string()];
        let bare = Panel::from_columns(
            &[d(2), d(2)],
            Some(&instruments),
            vec![("MTM010-NEU".to_string(), vec![0.3, -0.3])],
        )
        .unwrap();
        assert!(matches!(table.update(&bare, &calendar()), Err(RondaError::Schema(_))));

        let labelled = bare.with_sectors(vec!["metal".to_string(), "metal".to_string()]).unwrap();
        assert_eq!(table.update(&labelled, &calendar()).unwrap(), 2);
        let stored = table.read(&["MTM010-NEU"]).unwrap();
        assert_eq!(stored.sectors().unwrap(), vec!["metal", "metal"]);
        assert_eq!(stored.value_columns(), vec!["MTM010-NEU"]);

        // a labelled panel is refused by a table that declares no label
        let plain = PanelTable::new(
            dir.path(),
            "sig",
            TableSchema::new(KeyKind::DateInstrument, vec!["MTM010-NEU".to_string()]),
        );
        assert!(matches!(plain.update(&labelled, &calendar()), Err(RondaError::Schema(_))));
    }

    #[test]
    fn test_non_trading_day_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let table = nav_table(dir.path());
        assert!(table.update(&nav_rows(&[d(6)]), &calendar()).is_err());
        assert!(!table.exists());
    }
}
