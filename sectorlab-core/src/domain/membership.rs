//! Industry classification and constituent membership.
//!
//! Membership rows carry validity intervals so historical (closed) rows can
//! answer point-in-time queries; the engine itself only uses the *current*
//! mapping (rows flagged active, no valid-to).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One level-N industry from the classification list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryInfo {
    pub industry_id: String,
    pub name: String,
}

/// One (symbol, industry) membership interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipRow {
    pub symbol: String,
    pub industry_id: String,
    pub industry_name: String,
    pub valid_from: Option<NaiveDate>,
    /// None for a still-open membership.
    pub valid_to: Option<NaiveDate>,
    pub active: bool,
}

/// Full membership table, active and historical rows together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndustryMembership {
    rows: Vec<MembershipRow>,
}

impl IndustryMembership {
    /// Build from raw rows. Keeps every row, but enforces the invariant
    /// that a symbol has at most one active membership: a later active row
    /// for an already-active symbol is demoted to historical.
    pub fn new(rows: Vec<MembershipRow>) -> Self {
        let mut seen_active: BTreeMap<String, ()> = BTreeMap::new();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.active {
                    if seen_active.contains_key(&row.symbol) {
                        row.active = false;
                    } else {
                        seen_active.insert(row.symbol.clone(), ());
                    }
                }
                row
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[MembershipRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Industry id → name, from every row observed.
    pub fn industry_names(&self) -> BTreeMap<String, String> {
        self.rows
            .iter()
            .map(|r| (r.industry_id.clone(), r.industry_name.clone()))
            .collect()
    }

    /// Current mapping: industry id → active member symbols, sorted.
    pub fn current_by_industry(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in self.rows.iter().filter(|r| r.active) {
            map.entry(row.industry_id.clone())
                .or_default()
                .push(row.symbol.clone());
        }
        for symbols in map.values_mut() {
            symbols.sort();
        }
        map
    }

    /// Point-in-time membership: symbols that belonged to `industry_id`
    /// on `as_of`, judged by validity intervals rather than the active flag.
    pub fn members_as_of(&self, industry_id: &str, as_of: NaiveDate) -> Vec<&str> {
        let mut symbols: Vec<&str> = self
            .rows
            .iter()
            .filter(|r| r.industry_id == industry_id)
            .filter(|r| r.valid_from.map_or(true, |from| from <= as_of))
            .filter(|r| r.valid_to.map_or(true, |to| to >= as_of))
            .map(|r| r.symbol.as_str())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}
