//! Price panel: one row per (symbol, trading day).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily price observation as delivered by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub symbol: String,
    pub date: NaiveDate,
    /// Raw (unadjusted) close.
    pub close: f64,
    /// Backward adjustment factor; 1.0 when the provider had no row.
    pub adj_factor: f64,
}

impl PriceRow {
    /// Adjusted close used by all return computations.
    pub fn adj_close(&self) -> f64 {
        self.close * self.adj_factor
    }
}

/// Panel of daily prices, sorted by (symbol, date) with one row per key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricePanel {
    rows: Vec<PriceRow>,
}

impl PricePanel {
    /// Build a panel from raw rows: sorts by (symbol, date) and drops
    /// duplicate (symbol, date) keys keeping the first occurrence.
    pub fn from_rows(mut rows: Vec<PriceRow>) -> Self {
        rows.sort_by(|a, b| (a.symbol.as_str(), a.date).cmp(&(b.symbol.as_str(), b.date)));
        rows.dedup_by(|b, a| a.symbol == b.symbol && a.date == b.date);
        Self { rows }
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct symbols in the panel.
    pub fn symbol_count(&self) -> usize {
        let mut count = 0;
        let mut last: Option<&str> = None;
        for row in &self.rows {
            if last != Some(row.symbol.as_str()) {
                count += 1;
                last = Some(row.symbol.as_str());
            }
        }
        count
    }

    /// Sorted unique trading days observed in the panel.
    pub fn trading_days(&self) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();
        days.sort();
        days.dedup();
        days
    }

    /// Earliest and latest observed trading day, if any.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let days = self.trading_days();
        Some((*days.first()?, *days.last()?))
    }
}
