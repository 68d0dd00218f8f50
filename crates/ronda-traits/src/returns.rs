//! Forward return definitions and their canonical string encodings.

use crate::{Result, RondaError};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Price a return is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub enum PriceAnchor {
    /// Opening price.
    Opn,
    /// Closing price.
    Cls,
}

impl PriceAnchor {
    /// Both anchors.
    pub const ALL: [Self; 2] = [Self::Opn, Self::Cls];

    /// Column of the price panel the anchor reads.
    pub const fn price_column(self) -> &'static str {
        match self {
            Self::Opn => "open",
            Self::Cls => "close",
        }
    }
}

/// Whether a return is raw or neutralized.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub enum ReturnKind {
    /// Plain price return.
    RAW,
    /// Cross-sectionally neutralized return.
    NEU,
}

/// A forward return: anchor, window, lag and kind.
///
/// A return at trade date `T` runs from `T + lag` to `T + lag + win`
/// trading days, so it never observes a price on `T` itself.
///
/// # Example
///
/// ```
/// use ronda_traits::returns::{PriceAnchor, ReturnDef, ReturnKind};
///
/// let ret = ReturnDef::new(PriceAnchor::Opn, 1, 1, ReturnKind::RAW);
/// assert_eq!(ret.shift(), 2);
/// assert_eq!(ret.ret_name(), "Opn001L1RAW");
/// assert_eq!(ret.save_id(), "001L1RAW");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReturnDef {
    /// Price anchor.
    pub anchor: PriceAnchor,
    /// Holding window in trading days.
    pub win: u32,
    /// Trading days between the decision date and the entry price.
    pub lag: u32,
    /// Raw or neutralized.
    pub kind: ReturnKind,
}

impl ReturnDef {
    /// Creates a return definition.
    pub const fn new(anchor: PriceAnchor, win: u32, lag: u32, kind: ReturnKind) -> Self {
        Self { anchor, win, lag, kind }
    }

    /// How far forward the return looks: `win + lag`.
    pub const fn shift(&self) -> u32 {
        self.win + self.lag
    }

    /// Window and lag encoding shared by both anchors, e.g. `010L1`.
    pub fn ret_class(&self) -> String {
        format!("{:03}L{}", self.win, self.lag)
    }

    /// Column name of this return, e.g. `Cls010L1NEU`.
    pub fn ret_name(&self) -> String {
        format!("{}{}{}", self.anchor, self.ret_class(), self.kind)
    }

    /// Storage key of the table holding this return for both anchors.
    pub fn save_id(&self) -> String {
        format!("{}{}", self.ret_class(), self.kind)
    }

    /// The same return with a different kind.
    pub const fn with_kind(&self, kind: ReturnKind) -> Self {
        Self { kind, ..*self }
    }

    /// Parses a name produced by [`ret_name`](Self::ret_name).
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::Config`] for anything that is not
    /// `<Opn|Cls><www>L<lag><RAW|NEU>`.
    pub fn parse(name: &str) -> Result<Self> {
        let bad = || RondaError::Config(format!("illegal return name '{name}'"));
        if name.len() < 10 || !name.is_ascii() {
            return Err(bad());
        }
        let anchor = match &name[..3] {
            "Opn" => PriceAnchor::Opn,
            "Cls" => PriceAnchor::Cls,
            _ => return Err(bad()),
        };
        let kind = match &name[name.len() - 3..] {
            "RAW" => ReturnKind::RAW,
            "NEU" => ReturnKind::NEU,
            _ => return Err(bad()),
        };
        let body = &name[3..name.len() - 3];
        let (win, lag) = body.split_once('L').ok_or_else(bad)?;
        if win.len() != 3 {
            return Err(bad());
        }
        let win = win.parse().map_err(|_| bad())?;
        let lag = lag.parse().map_err(|_| bad())?;
        Ok(Self::new(anchor, win, lag, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodings() {
        let ret = ReturnDef::new(PriceAnchor::Cls, 10, 1, ReturnKind::NEU);
        assert_eq!(ret.shift(), 11);
        assert_eq!(ret.ret_class(), "010L1");
        assert_eq!(ret.ret_name(), "Cls010L1NEU");
        assert_eq!(ret.save_id(), "010L1NEU");
        assert_eq!(ret.with_kind(ReturnKind::RAW).ret_name(), "Cls010L1RAW");
    }

    #[test]
    fn test_parse() {
        let ret = ReturnDef::parse("Opn001L1RAW").unwrap();
        assert_eq!(ret, ReturnDef::new(PriceAnchor::Opn, 1, 1, ReturnKind::RAW));
        assert_eq!(ReturnDef::parse(&ret.ret_name()).unwrap(), ret);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for name in ["", "Opn001L1", "Xyz001L1RAW", "Opn01L1RAW", "Opn001X1RAW", "Opn001L1ABC"] {
            assert!(ReturnDef::parse(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_price_columns() {
        assert_eq!(PriceAnchor::Opn.price_column(), "open");
        assert_eq!(PriceAnchor::Cls.price_column(), "close");
    }
}
