#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types for the Ronda factor research pipeline.
//!
//! This crate holds what every stage shares: the [`Panel`] table type, the
//! [`TradingCalendar`] oracle, factor and return identifiers, simulation
//! units of work, cross-sectional statistics and the [`RondaError`] type.

/// The version of the ronda-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod calendar;
pub mod error;
pub mod factor;
pub mod returns;
pub mod sim;
pub mod stats;
pub mod types;

// Re-exports
pub use calendar::{Calendar, TradingCalendar, parse_date};
pub use error::{Result, RondaError};
pub use factor::{Factor, FactorClass, FactorGroup, NameTemplate};
pub use returns::{PriceAnchor, ReturnDef, ReturnKind};
pub use sim::{GroupBy, SimArgs, TableRef, group_key, group_sim_args};
pub use types::{CrossSection, Date, INSTRUMENT, Instrument, KeyKind, Panel, SECTOR, TRADE_DATE};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
