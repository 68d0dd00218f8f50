//! Summary of the configured research universe.

use crate::config::ProjectConfig;
use crate::plan::{Planner, SignalKind};
use anyhow::Result;

pub(crate) fn run(config: &ProjectConfig) -> Result<()> {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Available Factors                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let classes = config.factor_classes()?;
    let mut n_factors = 0;
    for (class, factors) in &classes {
        n_factors += factors.len();
        let names: Vec<&str> = factors.iter().map(|f| f.name.as_str()).collect();
        println!("  {:8} {:>3}  {}", class.to_string(), factors.len(), names.join(", "));
    }
    println!();

    println!("Factor groups:");
    println!("{}", "-".repeat(60));
    for group in config.factor_groups()? {
        println!("  {:20} {:>4} factors", group.name(), group.members().len());
    }
    println!();

    println!("Models: {}", config.models.len());
    for model in &config.models {
        println!("  {} ({}, {}, trn_win {})", model.id, model.model, model.factor_group, model.trn_win);
    }
    println!();

    let maws = config.signals.as_ref().map_or(0, |s| s.maws.len());
    println!("Derived counts:");
    println!("{}", "-".repeat(60));
    println!("  {:28} {:>6}", "factor classes", classes.len());
    println!("  {:28} {:>6}", "factors", n_factors);
    println!("  {:28} {:>6}", "test return windows", config.test_returns().len());
    println!("  {:28} {:>6}", "facNeu signals", n_factors * maws);
    println!("  {:28} {:>6}", "mdlPrd signals", config.models.len() * maws);

    let planner = Planner::new(config);
    for kind in [SignalKind::FacNeu, SignalKind::MdlPrd, SignalKind::MdlOpt, SignalKind::GrpOpt] {
        // a kind whose sections are absent has nothing to count
        let count = planner.sims(kind).map_or(0, |sims| sims.len());
        println!("  {:28} {:>6}", format!("{kind} simulations"), count);
    }
    println!();
    Ok(())
}
