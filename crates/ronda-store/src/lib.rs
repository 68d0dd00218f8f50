#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Panel store for Ronda.
//!
//! Every artefact of the pipeline (factors, returns, signals, optimizer
//! weights, NAV records) is a [`PanelTable`]: an append-only parquet file
//! with a declared schema. Appends are rejected unless they start exactly on
//! the calendar day after the last persisted date.
//!
//! ```ignore
//! use ronda_store::{PanelTable, schemas};
//!
//! let table = PanelTable::new("/data/simulations/facNeu", "MTM010-NEU.MA05.Opn001L1RAW", schemas::nav());
//! table.update(&records, &calendar)?;
//! let history = table.read_by_range(bgn, stp, &[schemas::NET_RET])?;
//! ```

pub mod schemas;
pub mod table;

pub use table::{PanelTable, TableSchema, write_atomic};
