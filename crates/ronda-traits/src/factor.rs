//! Factor classes, naming templates and factor groups.
//!
//! Factor computation lives outside this workspace; what the pipeline needs
//! is the closed set of classes, a deterministic name for every parameter
//! tuple of a class, and the grouping of factors into feature sets.

use crate::{Result, RondaError};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Suffix appended to a factor name for its neutralized variant.
pub const NEU_SUFFIX: &str = "-NEU";

/// The enumerated set of factor classes.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub enum FactorClass {
    /// Momentum.
    MTM,
    /// Return skewness.
    SKEW,
    /// Registered stock.
    RS,
    /// Spot-futures basis.
    BASIS,
    /// Term structure.
    TS,
    /// Beta to the equally weighted market.
    S0BETA,
    /// Beta to the sector index.
    S1BETA,
    /// Beta to the currency.
    CBETA,
    /// Beta to interest rates.
    IBETA,
    /// Beta to producer prices.
    PBETA,
    /// Correlation between price and turnover.
    CTP,
    /// Correlation between return and turnover.
    CTR,
    /// Correlation between volume and price.
    CVP,
    /// Correlation between volume and return.
    CVR,
    /// Correlation between spread and price.
    CSP,
    /// Correlation between spread and return.
    CSR,
    /// Net open interest of top members.
    NOI,
    /// Change of net open interest of top members.
    NDOI,
    /// Weighted net open interest.
    WNOI,
    /// Change of weighted net open interest.
    WNDOI,
    /// Amplitude.
    AMP,
    /// Extreme return.
    EXR,
    /// Smart money.
    SMT,
    /// Real weighted turnover concentration.
    RWTC,
    /// Technical analysis composite.
    TA,
}

/// Declarative naming table: one suffix pattern per class.
///
/// Placeholders are `{i}` or `{i:0w}` where `i` indexes the parameter tuple
/// and `w` is a zero padded width.
const TEMPLATES: [(FactorClass, &str); 25] = [
    (FactorClass::MTM, "{0:03}"),
    (FactorClass::SKEW, "{0:03}"),
    (FactorClass::RS, "{0:03}"),
    (FactorClass::BASIS, "{0:03}"),
    (FactorClass::TS, "{0:03}"),
    (FactorClass::S0BETA, "{0:03}"),
    (FactorClass::S1BETA, "{0:03}"),
    (FactorClass::CBETA, "{0:03}"),
    (FactorClass::IBETA, "{0:03}"),
    (FactorClass::PBETA, "{0:03}"),
    (FactorClass::CTP, "{0:03}T{1:02}"),
    (FactorClass::CTR, "{0:03}T{1:02}"),
    (FactorClass::CVP, "{0:03}T{1:02}"),
    (FactorClass::CVR, "{0:03}T{1:02}"),
    (FactorClass::CSP, "{0:03}T{1:02}"),
    (FactorClass::CSR, "{0:03}T{1:02}"),
    (FactorClass::NOI, "{0:03}T{1:02}"),
    (FactorClass::NDOI, "{0:03}T{1:02}"),
    (FactorClass::WNOI, "{0:03}T{1:02}"),
    (FactorClass::WNDOI, "{0:03}T{1:02}"),
    (FactorClass::AMP, "{0:03}T{1:02}"),
    (FactorClass::EXR, "{0:03}D{1}"),
    (FactorClass::SMT, "{0:03}T{1:02}"),
    (FactorClass::RWTC, "{0:03}"),
    (FactorClass::TA, "{0:03}S{1:03}"),
];

impl FactorClass {
    /// Every class, in declaration order.
    pub const ALL: [Self; 25] = [
        Self::MTM,
        Self::SKEW,
        Self::RS,
        Self::BASIS,
        Self::TS,
        Self::S0BETA,
        Self::S1BETA,
        Self::CBETA,
        Self::IBETA,
        Self::PBETA,
        Self::CTP,
        Self::CTR,
        Self::CVP,
        Self::CVR,
        Self::CSP,
        Self::CSR,
        Self::NOI,
        Self::NDOI,
        Self::WNOI,
        Self::WNDOI,
        Self::AMP,
        Self::EXR,
        Self::SMT,
        Self::RWTC,
        Self::TA,
    ];

    /// The naming template of this class.
    pub fn template(self) -> NameTemplate {
        let pattern = TEMPLATES
            .iter()
            .find(|(class, _)| *class == self)
            .map_or("{0:03}", |(_, pattern)| pattern);
        NameTemplate::new(pattern)
    }

    /// Expands parameter tuples into the factors of this class.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::Config`] if a tuple does not match the template.
    pub fn factors(self, params: &[Vec<u32>]) -> Result<Vec<Factor>> {
        let template = self.template();
        params
            .iter()
            .map(|p| {
                Ok(Factor {
                    class: self,
                    name: format!("{self}{}", template.render(p)?),
                })
            })
            .collect()
    }

    fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for FactorClass {
    type Err = RondaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.to_string() == s)
            .ok_or_else(|| RondaError::UnknownFactorClass {
                name: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// A suffix pattern with positional integer placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTemplate {
    pattern: &'static str,
}

impl NameTemplate {
    /// Wraps a pattern such as `"{0:03}T{1:02}"`.
    pub const fn new(pattern: &'static str) -> Self {
        Self { pattern }
    }

    /// Number of placeholders in the pattern.
    pub fn arity(&self) -> usize {
        self.pattern.matches('{').count()
    }

    /// Renders the suffix for one parameter tuple.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::Config`] when the tuple length differs from the
    /// arity or the pattern is malformed.
    pub fn render(&self, params: &[u32]) -> Result<String> {
        if params.len() != self.arity() {
            return Err(RondaError::Config(format!(
                "template '{}' takes {} parameters, got {:?}",
                self.pattern,
                self.arity(),
                params
            )));
        }

        let mut out = String::new();
        let mut rest = self.pattern;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let close = rest[open..]
                .find('}')
                .map(|c| open + c)
                .ok_or_else(|| RondaError::Config(format!("unclosed '{{' in '{}'", self.pattern)))?;
            let spec = &rest[open + 1..close];
            let (index, width) = match spec.split_once(':') {
                Some((index, width)) => (index, width.trim_start_matches('0')),
                None => (spec, ""),
            };
            let bad = |_| RondaError::Config(format!("bad placeholder '{{{spec}}}'"));
            let index: usize = index.parse().map_err(bad)?;
            let width: usize = if width.is_empty() { 0 } else { width.parse().map_err(bad)? };
            let value = params.get(index).ok_or_else(|| {
                RondaError::Config(format!("placeholder {index} out of range in '{}'", self.pattern))
            })?;
            out.push_str(&format!("{value:0width$}"));
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// A single factor: its class and full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Factor {
    /// The class the factor belongs to.
    pub class: FactorClass,
    /// The raw factor name, e.g. `MTM010`.
    pub name: String,
}

impl Factor {
    /// Name of the neutralized variant.
    pub fn neutral_name(&self) -> String {
        format!("{}{NEU_SUFFIX}", self.name)
    }
}

/// A named, immutable collection of factors used as one feature set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorGroup {
    name: String,
    members: Vec<Factor>,
}

impl FactorGroup {
    /// Creates a group.
    pub const fn new(name: String, members: Vec<Factor>) -> Self {
        Self { name, members }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member factors.
    pub fn members(&self) -> &[Factor] {
        &self.members
    }

    /// Neutralized names of all members.
    pub fn neutral_names(&self) -> Vec<String> {
        self.members.iter().map(Factor::neutral_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_has_template() {
        for class in FactorClass::ALL {
            assert!(TEMPLATES.iter().any(|(c, _)| *c == class), "{class}");
        }
    }

    #[test]
    fn test_from_str_round_trip() {
        for class in FactorClass::ALL {
            assert_eq!(class.to_string().parse::<FactorClass>().unwrap(), class);
        }
    }

    #[test]
    fn test_unknown_class_fails_fast() {
        let err = "XYZ".parse::<FactorClass>().unwrap_err();
        match err {
            RondaError::UnknownFactorClass { name, valid } => {
                assert_eq!(name, "XYZ");
                assert!(valid.starts_with("MTM, SKEW"));
                assert!(valid.ends_with("TA"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_template_render() {
        assert_eq!(NameTemplate::new("{0:03}").render(&[10]).unwrap(), "010");
        assert_eq!(NameTemplate::new("{0:03}T{1:02}").render(&[120, 2]).unwrap(), "120T02");
        assert_eq!(NameTemplate::new("{0:03}D{1}").render(&[5, 3]).unwrap(), "005D3");
        assert_eq!(NameTemplate::new("{1}X{0}").render(&[1, 2]).unwrap(), "2X1");
    }

    #[test]
    fn test_template_arity_mismatch() {
        let err = NameTemplate::new("{0:03}T{1:02}").render(&[10]).unwrap_err();
        assert!(matches!(err, RondaError::Config(_)));
    }

    #[test]
    fn test_class_factors() {
        let factors = FactorClass::CTP.factors(&[vec![120, 2], vec![240, 5]]).unwrap();
        let names: Vec<&str> = factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["CTP120T02", "CTP240T05"]);
        assert_eq!(factors[0].neutral_name(), "CTP120T02-NEU");
    }

    #[test]
    fn test_factor_group() {
        let members = FactorClass::MTM.factors(&[vec![5], vec![10]]).unwrap();
        let group = FactorGroup::new("MTM".to_string(), members);
        assert_eq!(group.name(), "MTM");
        assert_eq!(group.members().len(), 2);
        assert_eq!(group.neutral_names(), vec!["MTM005-NEU", "MTM010-NEU"]);
    }
}
