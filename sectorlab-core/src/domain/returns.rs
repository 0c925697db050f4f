//! Return series derived from the price panel.
//!
//! Never persisted; recomputed on demand from cached prices.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One return observation. For daily series `date` is the trading day;
/// for weekly series it is the week-ending Friday label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnObs {
    pub symbol: String,
    pub date: NaiveDate,
    pub ret: f64,
}

/// A set of return observations sorted by (symbol, date).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnSeries {
    obs: Vec<ReturnObs>,
}

impl ReturnSeries {
    pub fn new(mut obs: Vec<ReturnObs>) -> Self {
        obs.sort_by(|a, b| (a.symbol.as_str(), a.date).cmp(&(b.symbol.as_str(), b.date)));
        Self { obs }
    }

    pub fn observations(&self) -> &[ReturnObs] {
        &self.obs
    }

    pub fn len(&self) -> usize {
        self.obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }

    /// Sorted unique dates present in the series.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.obs.iter().map(|o| o.date).collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Observations grouped by date, each group as (symbol, return) pairs.
    pub fn by_date(&self) -> BTreeMap<NaiveDate, Vec<(&str, f64)>> {
        let mut map: BTreeMap<NaiveDate, Vec<(&str, f64)>> = BTreeMap::new();
        for o in &self.obs {
            map.entry(o.date).or_default().push((o.symbol.as_str(), o.ret));
        }
        map
    }
}
