//! Market- and industry-level concentration series.
//!
//! Concentration for a week is the spread between the mean return of the
//! top `top_pct` fraction of symbols and the median return of the whole
//! population. Weeks observing fewer than 2 symbols are undefined and
//! skipped; an industry with no active members in a week simply has no
//! point for that week.

use crate::domain::{IndustryMembership, ReturnSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Concentration is undefined below this population size.
const MIN_POPULATION: usize = 2;

/// One week of a concentration series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationPoint {
    pub week: NaiveDate,
    pub top_mean: f64,
    pub median: f64,
    /// `top_mean - median`.
    pub value: f64,
    /// Change from the previous computed week; None for the first point.
    pub delta: Option<f64>,
}

/// Weekly concentration series, sorted by week.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcentrationSeries {
    points: Vec<ConcentrationPoint>,
}

impl ConcentrationSeries {
    pub fn points(&self) -> &[ConcentrationPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Concentration value for a specific week, if computed.
    pub fn value_at(&self, week: NaiveDate) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.week == week)
            .map(|p| p.value)
    }
}

/// Size of the top bucket: `max(1, floor(top_pct * n))`.
fn top_count(n: usize, top_pct: f64) -> usize {
    ((top_pct * n as f64).floor() as usize).max(1)
}

fn median(sorted_ascending: &[f64]) -> f64 {
    let n = sorted_ascending.len();
    if n % 2 == 1 {
        sorted_ascending[n / 2]
    } else {
        (sorted_ascending[n / 2 - 1] + sorted_ascending[n / 2]) / 2.0
    }
}

/// Shared computation over week → returns groups.
fn compute_series(weeks: BTreeMap<NaiveDate, Vec<f64>>, top_pct: f64) -> ConcentrationSeries {
    let mut points = Vec::new();
    let mut prev_value: Option<f64> = None;
    for (week, mut returns) in weeks {
        if returns.len() < MIN_POPULATION {
            continue;
        }
        returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let k = top_count(returns.len(), top_pct);
        let top_mean: f64 = returns.iter().rev().take(k).sum::<f64>() / k as f64;
        let med = median(&returns);
        let value = top_mean - med;
        points.push(ConcentrationPoint {
            week,
            top_mean,
            median: med,
            value,
            delta: prev_value.map(|prev| value - prev),
        });
        prev_value = Some(value);
    }
    ConcentrationSeries { points }
}

/// Market-wide concentration over all symbols observed each week.
pub fn market_concentration(weekly: &ReturnSeries, top_pct: f64) -> ConcentrationSeries {
    let weeks = weekly
        .by_date()
        .into_iter()
        .map(|(week, obs)| (week, obs.into_iter().map(|(_, ret)| ret).collect()))
        .collect();
    compute_series(weeks, top_pct)
}

/// Per-industry concentration restricted to each industry's current members.
pub fn industry_concentration(
    weekly: &ReturnSeries,
    membership: &IndustryMembership,
    top_pct: f64,
) -> BTreeMap<String, ConcentrationSeries> {
    let mut map = BTreeMap::new();
    for (industry_id, symbols) in membership.current_by_industry() {
        let members: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        let mut weeks: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for o in weekly.observations() {
            if members.contains(o.symbol.as_str()) {
                weeks.entry(o.date).or_default().push(o.ret);
            }
        }
        let series = compute_series(weeks, top_pct);
        if !series.is_empty() {
            map.insert(industry_id, series);
        }
    }
    map
}

/// Industries ordered by descending concentration for one week, ties broken
/// by industry id ascending, truncated to `top_n`.
pub fn rank_industries(
    by_industry: &BTreeMap<String, ConcentrationSeries>,
    week: NaiveDate,
    top_n: usize,
) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = by_industry
        .iter()
        .filter_map(|(id, series)| series.value_at(week).map(|v| (id.clone(), v)))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(top_n);
    ranked
}
