//! Artifact export: event table CSV, run summary JSON, and grid pivot/raw
//! CSVs for external analysis tools.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sectorlab_core::domain::EventResult;

use crate::grid::{GridOutcome, PivotTable};
use crate::report::{build_event_table, SummaryPayload};

// ─── Event table ────────────────────────────────────────────────────

/// Render the event table as CSV.
///
/// Columns: event_id, signal_date, entry_date, exit_date, holding_days,
/// industries, ticker_count, tickers, total_return, max_drawdown,
/// partial_window, win
pub fn render_events_csv(events: &[EventResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "event_id",
        "signal_date",
        "entry_date",
        "exit_date",
        "holding_days",
        "industries",
        "ticker_count",
        "tickers",
        "total_return",
        "max_drawdown",
        "partial_window",
        "win",
    ])?;
    for r in build_event_table(events) {
        wtr.write_record([
            &r.event_id.to_string(),
            &r.signal_date.to_string(),
            &r.entry_date.to_string(),
            &r.exit_date.to_string(),
            &r.holding_days.to_string(),
            &r.industries,
            &r.ticker_count.to_string(),
            &r.tickers,
            &format!("{:.6}", r.total_return),
            &format!("{:.6}", r.max_drawdown),
            &r.partial_window.to_string(),
            &r.win.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the event table CSV to `path`.
pub fn write_events_csv(path: &Path, events: &[EventResult]) -> Result<()> {
    let csv = render_events_csv(events)?;
    fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Summary JSON ───────────────────────────────────────────────────

/// Write the run summary payload as pretty JSON to `path`.
pub fn write_summary_json(path: &Path, summary: &SummaryPayload) -> Result<()> {
    let json =
        serde_json::to_string_pretty(summary).context("failed to serialize run summary")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Grid pivots ────────────────────────────────────────────────────

/// Render a pivot table as CSV: first column is the trigger threshold,
/// remaining columns are one per laggard percentile.
pub fn render_pivot_csv(table: &PivotTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["trigger_threshold".to_string()];
    header.extend(table.cols.iter().map(|c| format!("{c}")));
    wtr.write_record(&header)?;
    for (row, values) in table.rows.iter().zip(&table.values) {
        let mut record = vec![format!("{row}")];
        record.extend(values.iter().map(|v| format!("{v:.6}")));
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write one pivot table CSV to `path`.
pub fn write_pivot_csv(path: &Path, table: &PivotTable) -> Result<()> {
    let csv = render_pivot_csv(table)?;
    fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

/// Render the full grid as one flat CSV, one row per event per cell.
///
/// Cells with zero events still contribute a single row with empty event
/// columns so every evaluated pair is visible in the output.
pub fn render_grid_raw_csv(outcome: &GridOutcome) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "trigger_threshold",
        "laggard_pct",
        "signal_date",
        "entry_date",
        "exit_date",
        "tickers",
        "total_return",
        "partial_window",
        "win",
    ])?;
    for cell in &outcome.cells {
        if cell.raw_events.is_empty() {
            let mut record = vec![
                format!("{}", cell.trigger_threshold),
                format!("{}", cell.laggard_pct),
            ];
            record.resize(9, String::new());
            wtr.write_record(&record)?;
            continue;
        }
        for evt in &cell.raw_events {
            wtr.write_record([
                &format!("{}", cell.trigger_threshold),
                &format!("{}", cell.laggard_pct),
                &evt.event.trigger_week.to_string(),
                &evt.entry_date.to_string(),
                &evt.exit_date.to_string(),
                &evt.symbols.join(","),
                &format!("{:.6}", evt.total_return),
                &evt.partial_window.to_string(),
                &evt.win().to_string(),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the flat grid CSV to `path`.
pub fn write_grid_raw_csv(path: &Path, outcome: &GridOutcome) -> Result<()> {
    let csv = render_grid_raw_csv(outcome)?;
    fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridCell;
    use crate::report::summarize;
    use chrono::NaiveDate;
    use sectorlab_core::domain::{Event, PathPoint};
    use std::collections::BTreeMap;

    fn sample_event() -> EventResult {
        let entry = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        EventResult {
            event: Event {
                trigger_week: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                signal: 0.12,
                concentration: 0.12,
                industries: vec![],
            },
            entry_date: entry,
            exit_date: entry,
            symbols: vec!["AAA".into()],
            laggards: vec![],
            path: vec![PathPoint {
                date: entry,
                ret: 0.02,
            }],
            total_return: 0.02,
            stock_returns: BTreeMap::new(),
            partial_window: true,
        }
    }

    #[test]
    fn events_csv_has_header_and_one_row_per_event() {
        let csv = render_events_csv(&[sample_event()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("event_id,signal_date"));
        assert!(lines[1].contains("2024-01-08"));
        assert!(lines[1].ends_with("true,true"));
    }

    #[test]
    fn pivot_csv_is_rows_by_cols() {
        let table = PivotTable {
            label: "avg_return".into(),
            rows: vec![0.0, 0.1],
            cols: vec![0.3, 0.5],
            values: vec![vec![0.01, 0.02], vec![0.03, 0.04]],
        };
        let csv = render_pivot_csv(&table).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "trigger_threshold,0.3,0.5");
        assert_eq!(lines[2], "0.1,0.030000,0.040000");
    }

    #[test]
    fn raw_grid_csv_keeps_empty_cells_visible() {
        let outcome = GridOutcome {
            cells: vec![
                GridCell {
                    trigger_threshold: 0.0,
                    laggard_pct: 0.3,
                    events: 1,
                    avg_return: 0.02,
                    win_rate: 1.0,
                    raw_events: vec![sample_event()],
                },
                GridCell {
                    trigger_threshold: 0.5,
                    laggard_pct: 0.3,
                    events: 0,
                    avg_return: 0.0,
                    win_rate: 0.0,
                    raw_events: vec![],
                },
            ],
        };
        let csv = render_grid_raw_csv(&outcome).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("0.5,0.3,,"));
    }

    #[test]
    fn summary_json_round_trips_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let payload = summarize(&[sample_event()]);
        write_summary_json(&path, &payload).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["events"], 1);
    }
}
