//! Units of work derived from the project configuration.
//!
//! Every signal, simulation and optimizer group is enumerated here so the
//! stages agree on ids and storage keys:
//!
//! | kind | signal id | sim id | cost |
//! |---|---|---|---|
//! | facNeu | `<factor>-NEU.MA<maw>` | `<signal>.<ret_name>` | `cost_sub` |
//! | mdlPrd | `<model>.MA<maw>` | `<signal>.<ret_name>` | `cost_sub` |
//! | mdlOpt | `<group>.<ret_name>` | signal id | `cost` |
//! | grpOpt | `<ret_name>` | signal id | `cost` |

use crate::config::{Layout, ProjectConfig};
use anyhow::Result;
use clap::ValueEnum;
use ronda_eval::SortKey;
use ronda_optimize::OptimizeJob;
use ronda_signals::{BlendJob, SignalGenerator, SignalGeneratorConfig, SignalJob};
use ronda_store::schemas;
use ronda_traits::sim::{
    TAG_FACTOR_CLASS, TAG_FACTOR_GROUP, TAG_FACTOR_NAME, TAG_MAW, TAG_MODEL, TAG_RET_NAME,
    TAG_TRN_WIN,
};
use ronda_traits::{Factor, GroupBy, ReturnDef, SimArgs, TableRef, group_sim_args};
use std::fmt;

/// Kind of signal, and of the simulations and reports built on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SignalKind {
    /// Neutralized factors
    FacNeu,
    /// Model predictions
    MdlPrd,
    /// Model signals blended per factor group and target
    MdlOpt,
    /// Factor group signals blended per target
    GrpOpt,
}

impl SignalKind {
    /// Directory and report name.
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::FacNeu => "facNeu",
            Self::MdlPrd => "mdlPrd",
            Self::MdlOpt => "mdlOpt",
            Self::GrpOpt => "grpOpt",
        }
    }

    /// Indicator the evaluation report is ranked by.
    pub(crate) const fn sort_key(self) -> SortKey {
        match self {
            Self::FacNeu => SortKey::Sharpe,
            Self::MdlPrd | Self::MdlOpt | Self::GrpOpt => SortKey::SharpeCalmar,
        }
    }

    /// Grouping of NAV curves into plots.
    pub(crate) const fn plot_grouping(self) -> GroupBy {
        match self {
            Self::FacNeu => GroupBy::FactorClass,
            Self::MdlPrd => GroupBy::FactorGroup,
            Self::MdlOpt | Self::GrpOpt => GroupBy::TargetReturn,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<std::path::Path> for SignalKind {
    fn as_ref(&self) -> &std::path::Path {
        self.as_str().as_ref()
    }
}

/// Simulation kinds the optimizer blends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OptimizeKind {
    /// Model simulations of one factor group and target
    MdlPrd,
    /// Factor group simulations of one target
    MdlOpt,
}

impl OptimizeKind {
    /// Simulations being weighted and how they are grouped.
    pub(crate) const fn source(self) -> (SignalKind, GroupBy) {
        match self {
            Self::MdlPrd => (SignalKind::MdlPrd, GroupBy::FactorGroup),
            Self::MdlOpt => (SignalKind::MdlOpt, GroupBy::TargetReturn),
        }
    }
}

pub(crate) fn fac_neu_signal_id(factor: &Factor, maw: usize) -> String {
    format!("{}.MA{maw:02}", factor.neutral_name())
}

pub(crate) fn mdl_prd_signal_id(model_id: &str, maw: usize) -> String {
    format!("{model_id}.MA{maw:02}")
}

fn sim_id(signal_id: &str, ret: &ReturnDef) -> String {
    format!("{signal_id}.{}", ret.ret_name())
}

fn tags(pairs: &[(&str, String)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Enumerates units of work for one project.
#[derive(Debug)]
pub(crate) struct Planner<'a> {
    config: &'a ProjectConfig,
    layout: Layout,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(config: &'a ProjectConfig) -> Self {
        Self {
            config,
            layout: config.layout(),
        }
    }

    fn ret_ref(&self, ret: &ReturnDef) -> TableRef {
        TableRef::new(self.layout.test_return(), ret.save_id(), ret.ret_name())
    }

    fn sig_ref(&self, kind: SignalKind, signal_id: &str) -> TableRef {
        TableRef::new(self.layout.signals(kind), signal_id, schemas::WEIGHT)
    }

    /// Simulations of one kind.
    pub(crate) fn sims(&self, kind: SignalKind) -> Result<Vec<SimArgs>> {
        match kind {
            SignalKind::FacNeu => self.fac_neu_sims(),
            SignalKind::MdlPrd => self.mdl_prd_sims(),
            SignalKind::MdlOpt => self.mdl_opt_sims(),
            SignalKind::GrpOpt => self.grp_opt_sims(),
        }
    }

    fn fac_neu_sims(&self) -> Result<Vec<SimArgs>> {
        let maws = &self.config.signals()?.maws;
        let rets = self.config.sim_returns();
        let mut sims = Vec::new();
        for (class, factors) in self.config.require_factors()? {
            for factor in &factors {
                for &maw in maws {
                    let signal_id = fac_neu_signal_id(factor, maw);
                    for ret in &rets {
                        sims.push(SimArgs::new(
                            sim_id(&signal_id, ret),
                            signal_id.clone(),
                            tags(&[
                                (TAG_FACTOR_CLASS, class.to_string()),
                                (TAG_FACTOR_NAME, factor.neutral_name()),
                                (TAG_MAW, format!("{maw:02}")),
                                (TAG_RET_NAME, ret.ret_name()),
                            ]),
                            *ret,
                            self.sig_ref(SignalKind::FacNeu, &signal_id),
                            self.ret_ref(ret),
                            self.config.costs.cost_sub,
                        ));
                    }
                }
            }
        }
        Ok(sims)
    }

    fn mdl_prd_sims(&self) -> Result<Vec<SimArgs>> {
        let maws = &self.config.signals()?.maws;
        let mut sims = Vec::new();
        for model in self.config.models()? {
            let target = model.target()?;
            for &maw in maws {
                let signal_id = mdl_prd_signal_id(&model.id, maw);
                sims.push(SimArgs::new(
                    sim_id(&signal_id, &target),
                    signal_id.clone(),
                    tags(&[
                        (TAG_MODEL, model.model.clone()),
                        (TAG_FACTOR_GROUP, model.factor_group.clone()),
                        (TAG_TRN_WIN, model.trn_win.to_string()),
                        (TAG_MAW, format!("{maw:02}")),
                        (TAG_RET_NAME, target.ret_name()),
                    ]),
                    target,
                    self.sig_ref(SignalKind::MdlPrd, &signal_id),
                    self.ret_ref(&target),
                    self.config.costs.cost_sub,
                ));
            }
        }
        Ok(sims)
    }

    fn mdl_opt_sims(&self) -> Result<Vec<SimArgs>> {
        let groups = group_sim_args(&self.mdl_prd_sims()?, GroupBy::FactorGroup)?;
        let mut sims = Vec::new();
        for (key, members) in groups {
            let Some(first) = members.first() else {
                continue;
            };
            let target = *first.tgt_ret();
            let factor_group = first.tag(TAG_FACTOR_GROUP).unwrap_or_default().to_string();
            sims.push(SimArgs::new(
                key.clone(),
                factor_group.clone(),
                tags(&[
                    (TAG_FACTOR_GROUP, factor_group),
                    (TAG_RET_NAME, target.ret_name()),
                ]),
                target,
                self.sig_ref(SignalKind::MdlOpt, &key),
                self.ret_ref(&target),
                self.config.costs.cost,
            ));
        }
        Ok(sims)
    }

    fn grp_opt_sims(&self) -> Result<Vec<SimArgs>> {
        let groups = group_sim_args(&self.mdl_opt_sims()?, GroupBy::TargetReturn)?;
        let mut sims = Vec::new();
        for (key, members) in groups {
            let Some(first) = members.first() else {
                continue;
            };
            let target = *first.tgt_ret();
            sims.push(SimArgs::new(
                key.clone(),
                key.clone(),
                tags(&[(TAG_RET_NAME, target.ret_name())]),
                target,
                self.sig_ref(SignalKind::GrpOpt, &key),
                self.ret_ref(&target),
                self.config.costs.cost,
            ));
        }
        Ok(sims)
    }

    /// Signal jobs reading a single factor or prediction column.
    pub(crate) fn signal_jobs(&self, kind: SignalKind) -> Result<Vec<SignalJob>> {
        let maws = &self.config.signals()?.maws;
        let generator = |maw| SignalGenerator::new(SignalGeneratorConfig { maw });
        let out_dir = self.layout.signals(kind);
        let mut jobs = Vec::new();
        match kind {
            SignalKind::FacNeu => {
                for (class, factors) in self.config.require_factors()? {
                    for factor in &factors {
                        let input = TableRef::new(
                            self.layout.neutral_by_instru(),
                            class.to_string(),
                            factor.neutral_name(),
                        );
                        for &maw in maws {
                            let id = fac_neu_signal_id(factor, maw);
                            jobs.push(SignalJob::new(input.clone(), &out_dir, &id, generator(maw)));
                        }
                    }
                }
            }
            SignalKind::MdlPrd => {
                for model in self.config.models()? {
                    let input = TableRef::new(self.layout.prediction(), &model.id, schemas::PREDICTION);
                    for &maw in maws {
                        let id = mdl_prd_signal_id(&model.id, maw);
                        jobs.push(SignalJob::new(input.clone(), &out_dir, &id, generator(maw)));
                    }
                }
            }
            SignalKind::MdlOpt | SignalKind::GrpOpt => {
                anyhow::bail!("{kind} signals are blended, not generated")
            }
        }
        Ok(jobs)
    }

    /// Jobs blending member signals with their group's optimizer weights.
    pub(crate) fn blend_jobs(&self, kind: SignalKind) -> Result<Vec<BlendJob>> {
        let optimized = match kind {
            SignalKind::MdlOpt => OptimizeKind::MdlPrd,
            SignalKind::GrpOpt => OptimizeKind::MdlOpt,
            SignalKind::FacNeu | SignalKind::MdlPrd => {
                anyhow::bail!("{kind} signals are generated, not blended")
            }
        };
        let (source, by) = optimized.source();
        let weights_dir = self.layout.optimize(source);
        let out_dir = self.layout.signals(kind);
        Ok(group_sim_args(&self.sims(source)?, by)?
            .into_iter()
            .map(|(key, members)| {
                let members = members
                    .iter()
                    .map(|a| (a.candidate().to_string(), a.sig().clone()))
                    .collect();
                BlendJob::new(&weights_dir, &key, members, &out_dir)
            })
            .collect())
    }

    /// One optimizer job per group of source simulations.
    pub(crate) fn optimize_jobs(&self, kind: OptimizeKind) -> Result<Vec<OptimizeJob>> {
        let (source, by) = kind.source();
        let walk_forward = self.config.walk_forward()?;
        let sim_dir = self.layout.simulations(source);
        let opt_dir = self.layout.optimize(source);
        Ok(group_sim_args(&self.sims(source)?, by)?
            .into_iter()
            .map(|(key, members)| {
                OptimizeJob::from_sim_args(&key, &members, &sim_dir, &opt_dir, walk_forward.clone())
            })
            .collect())
    }
}
