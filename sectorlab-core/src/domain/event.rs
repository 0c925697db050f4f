//! Events and their realized outcomes.

use crate::selector::Laggard;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::membership::IndustryInfo;

/// A concentration-threshold crossing. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Week (Friday label) whose signal crossed the threshold.
    pub trigger_week: NaiveDate,
    /// The signal value that fired (delta or level, per trigger mode).
    pub signal: f64,
    /// Market concentration level at the trigger week.
    pub concentration: f64,
    /// Top-ranked industries selected for the event.
    pub industries: Vec<IndustryInfo>,
}

/// One point of the equal-weight forward return path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub date: NaiveDate,
    pub ret: f64,
}

/// An [`Event`] plus its holding-window outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResult {
    pub event: Event,
    /// First trading day of the holding window.
    pub entry_date: NaiveDate,
    /// Last evaluated trading day (may precede the full window's end).
    pub exit_date: NaiveDate,
    /// Symbols held, sorted.
    pub symbols: Vec<String>,
    /// Laggard snapshot at selection time, for reporting.
    pub laggards: Vec<Laggard>,
    /// Equal-weight daily return path over the holding window.
    pub path: Vec<PathPoint>,
    /// Compounded aggregate return over the path.
    pub total_return: f64,
    /// Per-symbol compounded return over each symbol's available days.
    pub stock_returns: BTreeMap<String, f64>,
    /// True when the data ended before `hold_days` trading days elapsed.
    pub partial_window: bool,
}

impl EventResult {
    /// Win indicator: positive aggregate return.
    pub fn win(&self) -> bool {
        self.total_return > 0.0
    }

    /// Number of trading days actually evaluated.
    pub fn holding_days(&self) -> usize {
        self.path.len()
    }

    /// Running-peak equity curve of the aggregate path.
    pub fn equity_curve(&self) -> Vec<f64> {
        let mut equity = 1.0;
        self.path
            .iter()
            .map(|p| {
                equity *= 1.0 + p.ret;
                equity
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_path(rets: &[f64]) -> EventResult {
        let path: Vec<PathPoint> = rets
            .iter()
            .enumerate()
            .map(|(i, &ret)| PathPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
                    + chrono::Duration::days(i as i64),
                ret,
            })
            .collect();
        let total_return = rets.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        EventResult {
            event: Event {
                trigger_week: NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
                signal: 0.1,
                concentration: 0.2,
                industries: vec![],
            },
            entry_date: path.first().unwrap().date,
            exit_date: path.last().unwrap().date,
            symbols: vec!["AAA".into()],
            laggards: vec![],
            path,
            total_return,
            stock_returns: BTreeMap::new(),
            partial_window: false,
        }
    }

    #[test]
    fn win_flag_tracks_sign_of_total_return() {
        assert!(result_with_path(&[0.01, 0.02]).win());
        assert!(!result_with_path(&[-0.01, -0.02]).win());
    }

    #[test]
    fn equity_curve_compounds_path() {
        let curve = result_with_path(&[0.1, -0.5]).equity_curve();
        assert!((curve[0] - 1.1).abs() < 1e-12);
        assert!((curve[1] - 0.55).abs() < 1e-12);
    }
}
