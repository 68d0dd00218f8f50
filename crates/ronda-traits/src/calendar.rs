//! Trading calendar oracle.
//!
//! No component does date arithmetic on its own: every shift, range and
//! month-end lookup goes through a [`TradingCalendar`]. Ranges are half open,
//! `[bgn, stp)`.

use crate::{Date, Result, RondaError};
use chrono::Datelike;
use std::path::Path;

/// Parses a date in `YYYYMMDD` or `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Result<Date> {
    let s = s.trim();
    Date::parse_from_str(s, "%Y%m%d")
        .or_else(|_| Date::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|e| {
            RondaError::InvalidDate(format!(
                "'{s}' ({e}), expected YYYYMMDD or YYYY-MM-DD"
            ))
        })
}

/// Ordered set of trading days.
pub trait TradingCalendar: Send + Sync {
    /// Shifts a trading day by `shift` trading days (negative goes back).
    ///
    /// # Errors
    ///
    /// Fails if `date` is not a trading day or the shift leaves the calendar.
    fn next_date(&self, date: Date, shift: i64) -> Result<Date>;

    /// Shifts like [`next_date`](Self::next_date) but saturates at the first
    /// trading day instead of failing on a backward shift.
    fn shift_clamped(&self, date: Date, shift: i64) -> Result<Date>;

    /// Trading days in `[bgn, stp)`.
    fn dates_header(&self, bgn: Date, stp: Date) -> Vec<Date>;

    /// The last trading day of each month, restricted to `[bgn, stp)`.
    fn last_trading_day_in_range(&self, bgn: Date, stp: Date) -> Vec<Date>;

    /// Whether `date` is a trading day.
    fn contains(&self, date: Date) -> bool;

    /// The first trading day, if any.
    fn first_date(&self) -> Option<Date>;
}

/// In-memory trading calendar backed by a sorted list of days.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    dates: Vec<Date>,
}

impl Calendar {
    /// Creates a calendar from any list of dates; sorts and deduplicates.
    pub fn new(mut dates: Vec<Date>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self { dates }
    }

    /// Loads a calendar from a CSV file with a `trade_date` column.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, lacks the column, or holds
    /// an unparsable date.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let index = reader
            .headers()?
            .iter()
            .position(|h| h.trim() == crate::TRADE_DATE)
            .ok_or_else(|| RondaError::MissingColumn(crate::TRADE_DATE.to_string()))?;

        let mut dates = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(field) = record.get(index) {
                dates.push(parse_date(field)?);
            }
        }
        if dates.is_empty() {
            return Err(RondaError::InsufficientData(format!(
                "calendar {} has no dates",
                path.as_ref().display()
            )));
        }
        Ok(Self::new(dates))
    }

    /// All trading days.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    fn position(&self, date: Date) -> Result<usize> {
        self.dates
            .binary_search(&date)
            .map_err(|_| RondaError::Calendar(format!("{date} is not a trading day")))
    }

    fn lower_bound(&self, date: Date) -> usize {
        self.dates.partition_point(|d| *d < date)
    }
}

impl TradingCalendar for Calendar {
    fn next_date(&self, date: Date, shift: i64) -> Result<Date> {
        let pos = self.position(date)? as i64 + shift;
        usize::try_from(pos)
            .ok()
            .and_then(|p| self.dates.get(p).copied())
            .ok_or_else(|| {
                RondaError::Calendar(format!("shifting {date} by {shift} leaves the calendar"))
            })
    }

    fn shift_clamped(&self, date: Date, shift: i64) -> Result<Date> {
        let pos = (self.position(date)? as i64 + shift).max(0);
        usize::try_from(pos)
            .ok()
            .and_then(|p| self.dates.get(p).copied())
            .ok_or_else(|| {
                RondaError::Calendar(format!("shifting {date} by {shift} leaves the calendar"))
            })
    }

    fn dates_header(&self, bgn: Date, stp: Date) -> Vec<Date> {
        let lo = self.lower_bound(bgn);
        let hi = self.lower_bound(stp).max(lo);
        self.dates[lo..hi].to_vec()
    }

    fn last_trading_day_in_range(&self, bgn: Date, stp: Date) -> Vec<Date> {
        let lo = self.lower_bound(bgn);
        let hi = self.lower_bound(stp).max(lo);
        (lo..hi)
            .filter(|&i| match self.dates.get(i + 1) {
                Some(next) => {
                    let this = self.dates[i];
                    (next.year(), next.month()) != (this.year(), this.month())
                }
                None => true,
            })
            .map(|i| self.dates[i])
            .collect()
    }

    fn contains(&self, date: Date) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    fn first_date(&self) -> Option<Date> {
        self.dates.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    /// Weekdays from 2024-01-01 through 2024-03-29.
    fn weekdays() -> Calendar {
        let mut dates = Vec::new();
        let mut day = d(2024, 1, 1);
        while day <= d(2024, 3, 29) {
            if day.weekday().number_from_monday() <= 5 {
                dates.push(day);
            }
            day = day.succ_opt().unwrap();
        }
        Calendar::new(dates)
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("20240105").unwrap(), d(2024, 1, 5));
        assert_eq!(parse_date("2024-01-05").unwrap(), d(2024, 1, 5));
        assert!(matches!(parse_date("05/01/2024"), Err(RondaError::InvalidDate(_))));
    }

    #[test]
    fn test_next_date_skips_weekends() {
        let cal = weekdays();
        assert_eq!(cal.next_date(d(2024, 1, 5), 1).unwrap(), d(2024, 1, 8));
        assert_eq!(cal.next_date(d(2024, 1, 8), -1).unwrap(), d(2024, 1, 5));
        assert_eq!(cal.next_date(d(2024, 1, 8), 0).unwrap(), d(2024, 1, 8));
    }

    #[test]
    fn test_next_date_errors() {
        let cal = weekdays();
        assert!(cal.next_date(d(2024, 1, 6), 1).is_err());
        assert!(cal.next_date(d(2024, 1, 2), -5).is_err());
        assert!(cal.next_date(d(2024, 3, 29), 1).is_err());
    }

    #[test]
    fn test_shift_clamped() {
        let cal = weekdays();
        assert_eq!(cal.shift_clamped(d(2024, 1, 3), -10).unwrap(), d(2024, 1, 1));
        assert_eq!(cal.shift_clamped(d(2024, 1, 10), -2).unwrap(), d(2024, 1, 8));
    }

    #[test]
    fn test_dates_header_half_open() {
        let cal = weekdays();
        let header = cal.dates_header(d(2024, 1, 5), d(2024, 1, 10));
        assert_eq!(header, vec![d(2024, 1, 5), d(2024, 1, 8), d(2024, 1, 9)]);
        assert!(cal.dates_header(d(2024, 1, 10), d(2024, 1, 5)).is_empty());
    }

    #[test]
    fn test_last_trading_day_in_range() {
        let cal = weekdays();
        let ends = cal.last_trading_day_in_range(d(2024, 1, 1), d(2024, 3, 1));
        assert_eq!(ends, vec![d(2024, 1, 31), d(2024, 2, 29)]);
        // the final calendar day counts as a period end
        let ends = cal.last_trading_day_in_range(d(2024, 3, 1), d(2024, 4, 1));
        assert_eq!(ends, vec![d(2024, 3, 29)]);
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trade_date").unwrap();
        writeln!(file, "20240103").unwrap();
        writeln!(file, "20240102").unwrap();
        writeln!(file, "2024-01-02").unwrap();
        let cal = Calendar::from_csv(file.path()).unwrap();
        assert_eq!(cal.dates(), &[d(2024, 1, 2), d(2024, 1, 3)]);
        assert!(cal.contains(d(2024, 1, 3)));
        assert_eq!(cal.first_date(), Some(d(2024, 1, 2)));
    }
}
