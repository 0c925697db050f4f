//! Per-event reporting: tabular event records, return quantiles, and
//! per-year aggregation for explaining a run's output.

use chrono::Datelike;
use sectorlab_core::domain::EventResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the exported event table.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub event_id: usize,
    pub signal_date: chrono::NaiveDate,
    pub entry_date: chrono::NaiveDate,
    pub exit_date: chrono::NaiveDate,
    pub holding_days: usize,
    pub industries: String,
    pub ticker_count: usize,
    pub tickers: String,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub partial_window: bool,
    pub win: bool,
}

/// Convert event results into records with derived statistics, sorted by
/// entry date.
pub fn build_event_table(events: &[EventResult]) -> Vec<EventRecord> {
    let mut records: Vec<EventRecord> = events
        .iter()
        .enumerate()
        .map(|(event_id, evt)| EventRecord {
            event_id,
            signal_date: evt.event.trigger_week,
            entry_date: evt.entry_date,
            exit_date: evt.exit_date,
            holding_days: evt.holding_days(),
            industries: evt
                .event
                .industries
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            ticker_count: evt.symbols.len(),
            tickers: evt.symbols.join(","),
            total_return: evt.total_return,
            max_drawdown: max_drawdown(&evt.equity_curve()),
            partial_window: evt.partial_window,
            win: evt.win(),
        })
        .collect();
    records.sort_by_key(|r| (r.entry_date, r.event_id));
    records
}

/// Worst running-peak dip of an equity curve, as a non-positive fraction.
fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &equity in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.min(equity / peak - 1.0);
        }
    }
    worst
}

/// Total-return quantiles over the event table.
pub fn return_quantiles(records: &[EventRecord]) -> BTreeMap<String, f64> {
    const PERCENTILES: [f64; 5] = [0.1, 0.25, 0.5, 0.75, 0.9];
    let mut quantiles = BTreeMap::new();
    let mut returns: Vec<f64> = records.iter().map(|r| r.total_return).collect();
    returns.sort_by(|a, b| a.total_cmp(b));
    for p in PERCENTILES {
        let key = format!("p{}", (p * 100.0) as u32);
        quantiles.insert(key, quantile(&returns, p));
    }
    quantiles
}

/// Linear-interpolation quantile of a sorted slice; 0 when empty.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Aggregated statistics for one calendar year of events.
#[derive(Debug, Clone, Serialize)]
pub struct YearlySummary {
    pub year: i32,
    pub events: usize,
    pub avg_return: f64,
    pub median_return: f64,
    pub win_rate: f64,
    pub avg_drawdown: f64,
}

/// Group the event table by entry year.
pub fn summarize_by_year(records: &[EventRecord]) -> Vec<YearlySummary> {
    let mut by_year: BTreeMap<i32, Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        by_year.entry(record.entry_date.year()).or_default().push(record);
    }
    by_year
        .into_iter()
        .map(|(year, group)| {
            let n = group.len();
            let mut returns: Vec<f64> = group.iter().map(|r| r.total_return).collect();
            returns.sort_by(|a, b| a.total_cmp(b));
            YearlySummary {
                year,
                events: n,
                avg_return: returns.iter().sum::<f64>() / n as f64,
                median_return: quantile(&returns, 0.5),
                win_rate: group.iter().filter(|r| r.win).count() as f64 / n as f64,
                avg_drawdown: group.iter().map(|r| r.max_drawdown).sum::<f64>() / n as f64,
            }
        })
        .collect()
}

/// JSON-exportable summary of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryPayload {
    #[serde(rename = "events")]
    pub event_count: usize,
    pub avg_return: f64,
    pub win_rate: f64,
    pub quantiles: BTreeMap<String, f64>,
    pub yearly: Vec<YearlySummary>,
}

/// Build the full summary payload from event results.
pub fn summarize(events: &[EventResult]) -> SummaryPayload {
    let records = build_event_table(events);
    let n = records.len();
    SummaryPayload {
        event_count: n,
        avg_return: if n == 0 {
            0.0
        } else {
            records.iter().map(|r| r.total_return).sum::<f64>() / n as f64
        },
        win_rate: if n == 0 {
            0.0
        } else {
            records.iter().filter(|r| r.win).count() as f64 / n as f64
        },
        quantiles: return_quantiles(&records),
        yearly: summarize_by_year(&records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sectorlab_core::domain::{Event, PathPoint};
    use std::collections::BTreeMap as Map;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event_result(entry: NaiveDate, rets: &[f64]) -> EventResult {
        let path: Vec<PathPoint> = rets
            .iter()
            .enumerate()
            .map(|(i, &ret)| PathPoint {
                date: entry + chrono::Duration::days(i as i64),
                ret,
            })
            .collect();
        let total_return = rets.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        EventResult {
            event: Event {
                trigger_week: entry - chrono::Duration::days(3),
                signal: 0.1,
                concentration: 0.1,
                industries: vec![],
            },
            entry_date: entry,
            exit_date: path.last().unwrap().date,
            symbols: vec!["AAA".into(), "BBB".into()],
            laggards: vec![],
            path,
            total_return,
            stock_returns: Map::new(),
            partial_window: false,
        }
    }

    #[test]
    fn drawdown_measures_worst_peak_dip() {
        // Up 10%, down 20%, recover: worst dip is -20% from the peak.
        let evt = event_result(date(2024, 1, 8), &[0.10, -0.20, 0.15]);
        let records = build_event_table(&[evt]);
        assert!((records[0].max_drawdown + 0.20).abs() < 1e-12);
    }

    #[test]
    fn table_is_sorted_by_entry_date() {
        let records = build_event_table(&[
            event_result(date(2024, 3, 4), &[0.01]),
            event_result(date(2024, 1, 8), &[0.02]),
        ]);
        assert_eq!(records[0].entry_date, date(2024, 1, 8));
        assert_eq!(records[1].event_id, 0);
    }

    #[test]
    fn quantiles_of_empty_table_are_zero() {
        let quantiles = return_quantiles(&[]);
        assert_eq!(quantiles["p50"], 0.0);
        assert_eq!(quantiles.len(), 5);
    }

    #[test]
    fn yearly_summary_groups_by_entry_year() {
        let records = build_event_table(&[
            event_result(date(2023, 5, 8), &[0.05]),
            event_result(date(2024, 1, 8), &[-0.02]),
            event_result(date(2024, 6, 3), &[0.04]),
        ]);
        let yearly = summarize_by_year(&records);
        assert_eq!(yearly.len(), 2);
        assert_eq!(yearly[0].year, 2023);
        assert_eq!(yearly[1].events, 2);
        assert!((yearly[1].win_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn summary_payload_matches_engine_level_stats() {
        let events = vec![
            event_result(date(2024, 1, 8), &[0.10]),
            event_result(date(2024, 2, 5), &[-0.10]),
        ];
        let payload = summarize(&events);
        assert_eq!(payload.event_count, 2);
        assert!((payload.avg_return - 0.0).abs() < 1e-12);
        assert!((payload.win_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn summary_json_uses_the_published_field_names() {
        let payload = summarize(&[event_result(date(2024, 1, 8), &[0.10])]);
        let json: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&payload).unwrap(),
        )
        .unwrap();
        assert_eq!(json["events"], 1);
        assert!(json.get("event_count").is_none());
        assert!(json["avg_return"].is_number());
        assert!(json["win_rate"].is_number());
    }
}
