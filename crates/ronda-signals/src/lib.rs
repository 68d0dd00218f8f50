//! Cross-sectional transforms of the Ronda pipeline.
//!
//! - [`neutralize`]: rank-normal scores demeaned within each sector
//! - [`returns`]: forward test returns from daily prices
//! - [`generator`]: rank long-short signals with an optional moving average
//! - [`blend`]: signals combined with walk-forward optimizer weights
//!
//! Each stage comes with a job type that reads its inputs from the panel
//! store over `[bgn, stp)` and appends its output.
//!
//! # Example
//!
//! ```ignore
//! use ronda_signals::{SignalGenerator, SignalGeneratorConfig, SignalJob};
//!
//! let generator = SignalGenerator::new(SignalGeneratorConfig { maw: 5 });
//! let job = SignalJob::new(input, &signal_dir, "MTM010-NEU.MA05", generator);
//! let rows = job.run(bgn, stp, &calendar)?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod blend;
pub mod generator;
pub mod neutralize;
pub mod returns;

pub use blend::{BlendJob, blend_sections};
pub use generator::{SignalGenerator, SignalGeneratorConfig, SignalJob, rank_long_short};
pub use neutralize::{NeutralizeJob, Neutralizer, NeutralizerConfig, Sectors};
pub use returns::{TestReturnJob, neutral_test_return_job, raw_test_returns};
