//! Project configuration and on-disk layout.

use anyhow::{Context, Result, bail};
use ronda_eval::MetricsConfig;
use ronda_optimize::{MaxSharpe, MaxSharpeConfig, WalkForward, WalkForwardConfig};
use ronda_signals::{Neutralizer, NeutralizerConfig, Sectors};
use ronda_traits::{Factor, FactorClass, FactorGroup, PriceAnchor, ReturnDef, ReturnKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the project file.
pub(crate) const CONFIG_ENV: &str = "RONDA_CONFIG";

/// Project file looked up in the working directory.
pub(crate) const DEFAULT_CONFIG: &str = "ronda.toml";

/// Cost rates charged per unit of turnover.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Costs {
    /// Rate for blended model signals.
    pub(crate) cost: f64,
    /// Rate for single factor and single model signals.
    pub(crate) cost_sub: f64,
}

/// Test return windows.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReturnsSection {
    pub(crate) lag: u32,
    /// Windows models are trained to predict.
    pub(crate) prd_wins: Vec<u32>,
    /// Windows simulations are scored on.
    pub(crate) sim_wins: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignalsSection {
    /// Moving average windows, one signal per window.
    pub(crate) maws: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OptimizeSection {
    /// Trailing window in trading days.
    pub(crate) win: usize,
    #[serde(default)]
    pub(crate) solver: MaxSharpeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FactorParams {
    /// One tuple per factor, matching the class's name template.
    pub(crate) params: Vec<Vec<u32>>,
}

/// A fitted model whose predictions are read as a black box.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelSpec {
    pub(crate) id: String,
    pub(crate) factor_group: String,
    /// Target the model predicts, e.g. `Opn010L1NEU`.
    pub(crate) ret_name: String,
    pub(crate) trn_win: u32,
    pub(crate) model: String,
}

impl ModelSpec {
    /// Raw return the model's signals are simulated against.
    pub(crate) fn target(&self) -> Result<ReturnDef> {
        let ret = ReturnDef::parse(&self.ret_name)
            .with_context(|| format!("model {} has a bad ret_name", self.id))?;
        Ok(ret.with_kind(ReturnKind::RAW))
    }
}

/// Deserialized `ronda.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProjectConfig {
    pub(crate) root_dir: PathBuf,
    pub(crate) calendar_path: PathBuf,
    /// Instrument to sector.
    pub(crate) universe: Sectors,
    pub(crate) costs: Costs,
    pub(crate) returns: ReturnsSection,
    pub(crate) signals: Option<SignalsSection>,
    pub(crate) optimize: Option<OptimizeSection>,
    #[serde(default)]
    pub(crate) neutralize: NeutralizerConfig,
    #[serde(default)]
    pub(crate) evaluation: MetricsConfig,
    #[serde(default)]
    pub(crate) factors: BTreeMap<String, FactorParams>,
    #[serde(default)]
    pub(crate) factor_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub(crate) models: Vec<ModelSpec>,
}

impl ProjectConfig {
    /// Picks the project file: `--config`, then `RONDA_CONFIG`, then
    /// `ronda.toml`.
    pub(crate) fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
    }

    /// Loads and validates a project file. Relative paths inside it are
    /// taken relative to the file's directory.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::parse(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.root_dir = base.join(&config.root_dir);
            config.calendar_path = base.join(&config.calendar_path);
        }
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.universe.is_empty() {
            bail!("[universe] lists no instruments");
        }
        for (name, rate) in [("cost", self.costs.cost), ("cost_sub", self.costs.cost_sub)] {
            if !rate.is_finite() || rate < 0.0 {
                bail!("costs.{name} must be a non-negative number, got {rate}");
            }
        }
        if self.returns.lag == 0 {
            bail!("returns.lag must be at least 1");
        }
        if self.returns.prd_wins.iter().chain(&self.returns.sim_wins).any(|w| *w == 0) {
            bail!("return windows must be at least 1");
        }
        if let Some(signals) = &self.signals
            && signals.maws.iter().any(|m| *m == 0)
        {
            bail!("signals.maws must be at least 1");
        }
        // surfaces unknown classes and bad tuples before any stage runs
        self.factor_classes()?;
        self.factor_groups()?;
        for model in &self.models {
            model.target()?;
            if !self.factor_groups.contains_key(&model.factor_group) {
                bail!("model {} uses unknown factor group {}", model.id, model.factor_group);
            }
        }
        Ok(())
    }

    /// Directory layout below `root_dir`.
    pub(crate) fn layout(&self) -> Layout {
        Layout::new(&self.root_dir)
    }

    /// Configured factor classes with their factors, in class order.
    pub(crate) fn factor_classes(&self) -> Result<Vec<(FactorClass, Vec<Factor>)>> {
        let mut classes = self
            .factors
            .iter()
            .map(|(name, p)| {
                let class = FactorClass::from_str(name)?;
                Ok((class, class.factors(&p.params)?))
            })
            .collect::<Result<Vec<_>>>()?;
        classes.sort_by_key(|(class, _)| *class);
        Ok(classes)
    }

    /// Factors of one class.
    pub(crate) fn factors_of(&self, class: FactorClass) -> Result<Vec<Factor>> {
        let params = self
            .factors
            .get(&class.to_string())
            .with_context(|| format!("no [factors.{class}] section"))?;
        Ok(class.factors(&params.params)?)
    }

    /// Factor groups, each holding every factor of its listed classes.
    pub(crate) fn factor_groups(&self) -> Result<Vec<FactorGroup>> {
        self.factor_groups
            .iter()
            .map(|(name, classes)| {
                let mut members = Vec::new();
                for class in classes {
                    let class = FactorClass::from_str(class)?;
                    members.extend(
                        self.factors_of(class)
                            .with_context(|| format!("factor group {name}"))?,
                    );
                }
                Ok(FactorGroup::new(name.clone(), members))
            })
            .collect()
    }

    /// Every factor class, failing when none is configured.
    pub(crate) fn require_factors(&self) -> Result<Vec<(FactorClass, Vec<Factor>)>> {
        if self.factors.is_empty() {
            bail!("missing [factors] section");
        }
        self.factor_classes()
    }

    pub(crate) fn signals(&self) -> Result<&SignalsSection> {
        self.signals.as_ref().context("missing [signals] section")
    }

    pub(crate) fn optimize(&self) -> Result<&OptimizeSection> {
        self.optimize.as_ref().context("missing [optimize] section")
    }

    pub(crate) fn models(&self) -> Result<&[ModelSpec]> {
        if self.models.is_empty() {
            bail!("missing [[models]] section");
        }
        Ok(&self.models)
    }

    /// One raw return per distinct window; each job writes both anchors.
    pub(crate) fn test_returns(&self) -> Vec<ReturnDef> {
        let mut wins: Vec<u32> = self
            .returns
            .prd_wins
            .iter()
            .chain(&self.returns.sim_wins)
            .copied()
            .collect();
        wins.sort_unstable();
        wins.dedup();
        wins.into_iter()
            .map(|win| ReturnDef::new(PriceAnchor::Opn, win, self.returns.lag, ReturnKind::RAW))
            .collect()
    }

    /// Raw targets every factor signal is simulated against.
    pub(crate) fn sim_returns(&self) -> Vec<ReturnDef> {
        let mut rets = Vec::new();
        for &win in &self.returns.sim_wins {
            for anchor in PriceAnchor::ALL {
                rets.push(ReturnDef::new(anchor, win, self.returns.lag, ReturnKind::RAW));
            }
        }
        rets
    }

    pub(crate) fn neutralizer(&self) -> Neutralizer {
        Neutralizer::new(self.neutralize.clone(), self.universe.clone())
    }

    pub(crate) fn walk_forward(&self) -> Result<WalkForward> {
        let section = self.optimize()?;
        Ok(WalkForward::with_optimizer(
            WalkForwardConfig { win: section.win },
            MaxSharpe::new(section.solver.clone()),
        ))
    }
}

/// Directories below the project root.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    root: PathBuf,
}

impl Layout {
    pub(crate) fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    /// Daily price table `prices`.
    pub(crate) fn market(&self) -> PathBuf {
        self.root.join("market")
    }

    pub(crate) fn factors_by_instru(&self) -> PathBuf {
        self.root.join("factors_by_instru")
    }

    pub(crate) fn neutral_by_instru(&self) -> PathBuf {
        self.root.join("neutral_by_instru")
    }

    pub(crate) fn test_return(&self) -> PathBuf {
        self.root.join("test_return")
    }

    pub(crate) fn prediction(&self) -> PathBuf {
        self.root.join("mclrn").join("prediction")
    }

    pub(crate) fn signals(&self, kind: impl AsRef<Path>) -> PathBuf {
        self.root.join("signals").join(kind)
    }

    pub(crate) fn simulations(&self, kind: impl AsRef<Path>) -> PathBuf {
        self.root.join("simulations").join(kind)
    }

    pub(crate) fn optimize(&self, kind: impl AsRef<Path>) -> PathBuf {
        self.root.join("optimize").join(kind)
    }

    pub(crate) fn evaluations(&self, kind: impl AsRef<Path>) -> PathBuf {
        self.root.join("evaluations").join(kind)
    }
}

/// Example project file used across tests.
#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"
root_dir = "data"
calendar_path = "data/calendar.csv"

[universe]
cu = "metal"
al = "metal"
m = "agri"
y = "agri"

[costs]
cost = 0.0005
cost_sub = 0.0003

[returns]
lag = 1
prd_wins = [10]
sim_wins = [1, 10]

[signals]
maws = [1, 5]

[optimize]
win = 60

[factors.MTM]
params = [[5], [10]]

[factors.CTP]
params = [[120, 2]]

[factor_groups]
price = ["MTM", "CTP"]

[[models]]
id = "price-Opn010L1NEU-W240-ridge"
factor_group = "price"
ret_name = "Opn010L1NEU"
trn_win = 240
model = "ridge"
"#;
