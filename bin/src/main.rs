//! Ronda CLI binary.
//!
//! Runs one pipeline stage per invocation over a half-open date range.

mod cmd;
mod config;
mod plan;
mod pool;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use plan::{OptimizeKind, SignalKind};
use pool::Parallelism;
use ronda_traits::{Date, FactorClass, parse_date};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "ronda")]
#[command(about = "Cross-sectional factor research pipeline for futures", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Project file, defaults to $RONDA_CONFIG or ./ronda.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// First trading date (YYYYMMDD)
    #[arg(long, value_parser = parse_date)]
    bgn: Option<Date>,

    /// Stop date, excluded (YYYYMMDD); defaults to the trading day after bgn
    #[arg(long, value_parser = parse_date)]
    stp: Option<Date>,

    /// Worker threads, defaults to one per CPU
    #[arg(long)]
    processes: Option<usize>,

    /// Run units sequentially on the main thread
    #[arg(long)]
    nomp: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute raw and neutralized test returns
    TestReturn,

    /// Neutralize the raw factors of one class
    FactorNeu {
        /// Factor class, e.g. MTM
        #[arg(long, value_parser = FactorClass::from_str)]
        fclass: FactorClass,
    },

    /// Generate or blend signals
    Signals {
        /// Signal kind
        #[arg(long, value_enum)]
        kind: SignalKind,
    },

    /// Simulate NAV records
    Simulations {
        /// Signal kind
        #[arg(long, value_enum)]
        kind: SignalKind,
    },

    /// Evaluate simulations and write the ranked report and plots
    Evaluations {
        /// Signal kind
        #[arg(long, value_enum)]
        kind: SignalKind,
    },

    /// Walk-forward optimize blend weights
    Optimize {
        /// Simulation kind whose groups are weighted
        #[arg(long, value_enum)]
        kind: OptimizeKind,
    },

    /// List configured factor groups, factors and derived counts
    Available,
}

impl Commands {
    const fn label(&self) -> &'static str {
        match self {
            Self::TestReturn => "test-return",
            Self::FactorNeu { .. } => "factor-neu",
            Self::Signals { .. } => "signals",
            Self::Simulations { .. } => "simulations",
            Self::Evaluations { .. } => "evaluations",
            Self::Optimize { .. } => "optimize",
            Self::Available => "available",
        }
    }
}

impl Cli {
    /// Installs the global subscriber. `RUST_LOG` overrides `-v`.
    fn init_logging(&self) -> Result<()> {
        if std::env::var_os("RUST_LOG").is_some() {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(EnvFilter::from_default_env())
                .with_target(false)
                .finish();
            return tracing::subscriber::set_global_default(subscriber)
                .context("failed to set tracing subscriber");
        }

        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")
    }

    fn parallelism(&self) -> Parallelism {
        if self.nomp {
            Parallelism::Sequential
        } else {
            Parallelism::Threads(self.processes.unwrap_or(0))
        }
    }
}

fn main() {
    match run() {
        Ok(0) => {}
        Ok(_) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// Runs the selected stage, returning the number of failed units.
fn run() -> Result<usize> {
    // a missing .env file is fine
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    cli.init_logging()?;

    let config_path = config::ProjectConfig::resolve_path(cli.config.as_deref());
    let project = config::ProjectConfig::load(&config_path)?;

    if matches!(cli.command, Commands::Available) {
        cmd::available::run(&project)?;
        return Ok(0);
    }

    let bgn = cli
        .bgn
        .with_context(|| format!("--bgn is required for {}", cli.command.label()))?;
    let session = cmd::Session::open(project, bgn, cli.stp, cli.parallelism())?;

    match cli.command {
        Commands::TestReturn => cmd::test_return::run(&session),
        Commands::FactorNeu { fclass } => cmd::factor_neu::run(&session, fclass),
        Commands::Signals { kind } => cmd::signals::run(&session, kind),
        Commands::Simulations { kind } => cmd::simulations::run(&session, kind),
        Commands::Evaluations { kind } => cmd::evaluations::run(&session, kind),
        Commands::Optimize { kind } => cmd::optimize::run(&session, kind),
        Commands::Available => Ok(0),
    }
}
