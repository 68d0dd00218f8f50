//! Table schemas of every artefact the pipeline persists.

use crate::TableSchema;
use ronda_traits::{KeyKind, PriceAnchor, ReturnDef, ReturnKind};

/// Signal weight column.
pub const WEIGHT: &str = "weight";
/// Model prediction column.
pub const PREDICTION: &str = "prediction";
/// Signal dot forward return.
pub const RAW_RET: &str = "raw_ret";
/// Turnover since the prior date.
pub const DLT_WGT: &str = "dlt_wgt";
/// Turnover times the cost rate.
pub const COST: &str = "cost";
/// Return net of cost.
pub const NET_RET: &str = "net_ret";
/// Cumulative net asset value.
pub const NAV: &str = "nav";

/// NAV record columns in storage order.
pub const NAV_COLUMNS: [&str; 5] = [RAW_RET, DLT_WGT, COST, NET_RET, NAV];

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Raw or neutralized factor values, one column per factor name.
pub fn factor(names: &[String]) -> TableSchema {
    TableSchema::new(KeyKind::DateInstrument, names.to_vec())
}

/// Neutralized factor values, labelled with each instrument's sector.
pub fn neutral_factor(names: &[String]) -> TableSchema {
    factor(names).with_sector()
}

/// Daily prices used to compute test returns.
pub fn prices() -> TableSchema {
    let columns: Vec<&str> = PriceAnchor::ALL.iter().map(|a| a.price_column()).collect();
    TableSchema::new(KeyKind::DateInstrument, owned(&columns))
}

/// Test returns for one window and kind, one column per price anchor.
/// Neutralized returns carry the sector label.
pub fn test_return(ret: &ReturnDef) -> TableSchema {
    let columns = PriceAnchor::ALL
        .iter()
        .map(|anchor| ReturnDef { anchor: *anchor, ..*ret }.ret_name())
        .collect();
    let schema = TableSchema::new(KeyKind::DateInstrument, columns);
    match ret.kind {
        ReturnKind::RAW => schema,
        ReturnKind::NEU => schema.with_sector(),
    }
}

/// Signal weights.
pub fn signal() -> TableSchema {
    TableSchema::new(KeyKind::DateInstrument, owned(&[WEIGHT]))
}

/// Black-box model predictions.
pub fn prediction() -> TableSchema {
    TableSchema::new(KeyKind::DateInstrument, owned(&[PREDICTION]))
}

/// NAV records of one simulation.
pub fn nav() -> TableSchema {
    TableSchema::new(KeyKind::Date, owned(&NAV_COLUMNS))
}

/// Optimizer weights, one column per candidate.
pub fn opt_weight(candidates: &[String]) -> TableSchema {
    TableSchema::new(KeyKind::Date, candidates.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_return_columns() {
        let ret = ReturnDef::new(PriceAnchor::Cls, 10, 1, ReturnKind::NEU);
        assert_eq!(test_return(&ret).values(), &["Opn010L1NEU", "Cls010L1NEU"]);
        assert!(test_return(&ret).has_sector());
        assert!(!test_return(&ret.with_kind(ReturnKind::RAW)).has_sector());
        assert!(neutral_factor(&["MTM010-NEU".to_string()]).has_sector());
        assert!(!factor(&["MTM010".to_string()]).has_sector());
    }

    #[test]
    fn test_key_kinds() {
        assert_eq!(nav().key(), KeyKind::Date);
        assert_eq!(nav().values().len(), 5);
        assert_eq!(signal().key(), KeyKind::DateInstrument);
        assert_eq!(prices().values(), &["open", "close"]);
    }
}
