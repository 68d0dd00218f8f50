//! Error types for the Ronda pipeline.
//!
//! Every library crate in the workspace reports failures through
//! [`RondaError`]. Continuity violations get their own variant because the
//! batch drivers treat them as a skipped write rather than a failed unit.

use crate::Date;
use thiserror::Error;

/// The main error type for Ronda operations.
#[derive(Debug, Error)]
pub enum RondaError {
    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a required column is missing from a panel.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error from filesystem operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error when data is insufficient for the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error when a date string cannot be parsed or is not usable.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Error raised by the trading calendar, e.g. a shift past its bounds.
    #[error("Calendar error: {0}")]
    Calendar(String),

    /// An append would leave a gap in, or overlap, a persisted table.
    #[error(
        "Continuity violated for {table}: last persisted {last}, expected {expected}, found {found}"
    )]
    Continuity {
        /// Storage key of the table.
        table: String,
        /// Last persisted date.
        last: Date,
        /// Calendar date the next append has to start at.
        expected: Date,
        /// First date of the rejected append.
        found: Date,
    },

    /// A panel does not match the declared table schema.
    #[error("Schema mismatch: {0}")]
    Schema(String),

    /// A factor class name outside the enumerated set.
    #[error("Unknown factor class '{name}', expected one of: {valid}")]
    UnknownFactorClass {
        /// The rejected name.
        name: String,
        /// Comma separated list of accepted names.
        valid: String,
    },

    /// A portfolio solver did not produce a usable solution.
    #[error("Optimization failed: {0}")]
    Optimization(String),

    /// Illegal or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl RondaError {
    /// Returns true if this error is a rejected (skipped) append.
    pub const fn is_continuity(&self) -> bool {
        matches!(self, Self::Continuity { .. })
    }
}

impl From<String> for RondaError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for RondaError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<csv::Error> for RondaError {
    fn from(e: csv::Error) -> Self {
        Self::InvalidData(format!("csv: {e}"))
    }
}

/// A specialized Result type for Ronda operations.
pub type Result<T> = std::result::Result<T, RondaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RondaError::MissingColumn("weight".to_string());
        assert_eq!(err.to_string(), "Missing required column: weight");

        let err = RondaError::UnknownFactorClass {
            name: "FOO".to_string(),
            valid: "MTM, SKEW".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown factor class 'FOO', expected one of: MTM, SKEW"
        );
    }

    #[test]
    fn test_continuity_flag() {
        let d = |day| Date::from_ymd_opt(2024, 1, day).unwrap();
        let err = RondaError::Continuity {
            table: "nav".to_string(),
            last: d(2),
            expected: d(3),
            found: d(5),
        };
        assert!(err.is_continuity());
        assert!(err.to_string().contains("expected 2024-01-03"));
        assert!(!RondaError::Other("x".to_string()).is_continuity());
    }

    #[test]
    fn test_error_from_string() {
        let err: RondaError = "bad".into();
        assert!(matches!(err, RondaError::Other(_)));
    }
}
