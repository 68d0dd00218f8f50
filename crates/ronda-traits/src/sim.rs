//! Simulation units of work and their grouping.

use crate::returns::ReturnDef;
use crate::{Result, RondaError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Tag naming the factor class of a simulation.
pub const TAG_FACTOR_CLASS: &str = "factor_class";
/// Tag naming the factor of a simulation.
pub const TAG_FACTOR_NAME: &str = "factor_name";
/// Tag naming the factor group of a simulation.
pub const TAG_FACTOR_GROUP: &str = "factor_group";
/// Tag holding the moving average window.
pub const TAG_MAW: &str = "maw";
/// Tag holding the target return name.
pub const TAG_RET_NAME: &str = "ret_name";
/// Tag naming the model behind a prediction.
pub const TAG_MODEL: &str = "model";
/// Tag holding a model's training window.
pub const TAG_TRN_WIN: &str = "trn_win";

/// Handle to one column of a persisted table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    dir: PathBuf,
    save_id: String,
    column: String,
}

impl TableRef {
    /// Creates a handle.
    pub fn new(dir: impl Into<PathBuf>, save_id: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            save_id: save_id.into(),
            column: column.into(),
        }
    }

    /// Directory holding the table.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Storage key of the table.
    pub fn save_id(&self) -> &str {
        &self.save_id
    }

    /// Column read from the table.
    pub fn column(&self) -> &str {
        &self.column
    }
}

/// One simulation: a signal, the forward return it is scored against and the
/// cost rate. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SimArgs {
    sim_id: String,
    candidate: String,
    tags: Vec<(String, String)>,
    tgt_ret: ReturnDef,
    sig: TableRef,
    ret: TableRef,
    cost: f64,
}

impl SimArgs {
    /// Creates a simulation unit.
    ///
    /// # Arguments
    ///
    /// * `sim_id` - Storage key of the NAV table
    /// * `candidate` - Column name of this simulation when it is an optimizer candidate
    /// * `tags` - Ordered identifying fields reported by the evaluator
    /// * `tgt_ret` - Target return definition
    /// * `sig` - Signal table, column `weight`
    /// * `ret` - Forward return table and column
    /// * `cost` - Cost rate applied to turnover
    pub const fn new(
        sim_id: String,
        candidate: String,
        tags: Vec<(String, String)>,
        tgt_ret: ReturnDef,
        sig: TableRef,
        ret: TableRef,
        cost: f64,
    ) -> Self {
        Self { sim_id, candidate, tags, tgt_ret, sig, ret, cost }
    }

    /// Storage key of the NAV table.
    pub fn sim_id(&self) -> &str {
        &self.sim_id
    }

    /// Optimizer candidate name.
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    /// Identifying fields in report order.
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Value of one tag.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Target return definition.
    pub const fn tgt_ret(&self) -> &ReturnDef {
        &self.tgt_ret
    }

    /// Signal handle.
    pub const fn sig(&self) -> &TableRef {
        &self.sig
    }

    /// Return handle.
    pub const fn ret(&self) -> &TableRef {
        &self.ret
    }

    /// Cost rate.
    pub const fn cost(&self) -> f64 {
        self.cost
    }
}

/// How simulations are grouped for optimization and plotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// One group per factor class.
    FactorClass,
    /// One group per factor group and target return.
    FactorGroup,
    /// One group per target return.
    TargetReturn,
}

/// Joins group id parts into a storage key.
pub fn group_key(parts: &[&str]) -> String {
    parts.join(".")
}

/// Groups simulations, keyed by the joined group id.
///
/// # Errors
///
/// Returns [`RondaError::InvalidData`] if a simulation lacks the tag the
/// grouping needs.
pub fn group_sim_args(args: &[SimArgs], by: GroupBy) -> Result<BTreeMap<String, Vec<SimArgs>>> {
    let mut groups: BTreeMap<String, Vec<SimArgs>> = BTreeMap::new();
    for sim in args {
        let tag = |name: &str| {
            sim.tag(name).ok_or_else(|| {
                RondaError::InvalidData(format!("{} has no '{name}' tag", sim.sim_id()))
            })
        };
        let ret_name = sim.tgt_ret().ret_name();
        let key = match by {
            GroupBy::FactorClass => tag(TAG_FACTOR_CLASS)?.to_string(),
            GroupBy::FactorGroup => group_key(&[tag(TAG_FACTOR_GROUP)?, ret_name.as_str()]),
            GroupBy::TargetReturn => ret_name,
        };
        groups.entry(key).or_default().push(sim.clone());
    }
    Ok(groups)
}
