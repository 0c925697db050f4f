//! End-to-end tests: synthetic market through the access layer, the
//! single-run entry point, and the parameter grid.

use chrono::{Datelike, NaiveDate, Weekday};
use sectorlab_core::data::{DataAccess, MockProvider, PanelCache};
use sectorlab_core::domain::{MembershipRow, PriceRow};
use sectorlab_core::{StrategyConfig, TriggerMode};
use sectorlab_runner::grid::{run_grid, GridSpec};
use sectorlab_runner::runner::run_single_backtest;
use sectorlab_runner::export::render_events_csv;
use sectorlab_runner::summarize;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekday closes from Jan through Mar 2024 for four symbols in two
/// industries. AAA rallies hard, BBB stalls, the other industry drifts
/// down slowly, so every week concentrates on AAA and BBB is the laggard
/// of the leading industry.
fn synthetic_rows() -> Vec<PriceRow> {
    let drifts = [("AAA", 0.01), ("BBB", 0.0), ("CCC", -0.002), ("DDD", 0.0005)];
    let mut rows = Vec::new();
    for (symbol, drift) in drifts {
        let mut close = 100.0;
        let mut day = date(2024, 1, 1);
        while day <= date(2024, 3, 29) {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                close *= 1.0 + drift;
                rows.push(PriceRow {
                    symbol: symbol.to_string(),
                    date: day,
                    close,
                    adj_factor: 1.0,
                });
            }
            day = day.succ_opt().unwrap();
        }
    }
    rows
}

fn synthetic_membership() -> Vec<MembershipRow> {
    let assignments = [
        ("AAA", "801080", "Electronics"),
        ("BBB", "801080", "Electronics"),
        ("CCC", "801150", "Pharma"),
        ("DDD", "801150", "Pharma"),
    ];
    assignments
        .iter()
        .map(|(symbol, id, name)| MembershipRow {
            symbol: symbol.to_string(),
            industry_id: id.to_string(),
            industry_name: name.to_string(),
            valid_from: Some(date(2020, 1, 1)),
            valid_to: None,
            active: true,
        })
        .collect()
}

fn test_config(cache_dir: &std::path::Path) -> StrategyConfig {
    StrategyConfig {
        start_date: date(2024, 1, 1),
        end_date: date(2024, 3, 31),
        market_top_pct: 0.3,
        industry_top_pct: 0.3,
        laggard_pct: 0.5,
        trigger_threshold: -1.0,
        trigger_mode: TriggerMode::Delta,
        hold_days: 5,
        top_industry_n: 1,
        lookback_weeks: 1,
        cache_dir: cache_dir.to_path_buf(),
        ..StrategyConfig::default()
    }
}

fn access_for(config: &StrategyConfig) -> DataAccess {
    let provider = MockProvider::new(synthetic_rows(), synthetic_membership());
    DataAccess::new(Box::new(provider), PanelCache::new(&config.cache_dir)).with_config(config)
}

#[test]
fn single_run_picks_the_leading_industrys_laggard() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let access = access_for(&config);

    let output = run_single_backtest(&access, &config).unwrap();
    assert!(!output.run_id.is_empty());

    let summary = &output.summary;
    assert!(summary.event_count() > 0, "permissive delta threshold must fire");
    for evt in &summary.events {
        assert_eq!(evt.event.industries.len(), 1);
        assert_eq!(evt.event.industries[0].industry_id, "801080");
        assert_eq!(evt.symbols, vec!["BBB".to_string()]);
        assert!(evt.entry_date > evt.event.trigger_week);
        assert!(evt.total_return.is_finite());
    }
}

#[test]
fn second_run_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let first = run_single_backtest(&access_for(&config), &config).unwrap();

    // Same cache dir, a provider that errors on every request. The run
    // must succeed anyway and match the first run exactly.
    let failing = MockProvider::new(synthetic_rows(), synthetic_membership()).with_failing_daily();
    let offline =
        DataAccess::new(Box::new(failing), PanelCache::new(&config.cache_dir)).with_config(&config);
    let second = run_single_backtest(&offline, &config).unwrap();

    assert_eq!(first.summary.event_count(), second.summary.event_count());
    assert_eq!(
        render_events_csv(&first.summary.events).unwrap(),
        render_events_csv(&second.summary.events).unwrap()
    );
}

#[test]
fn grid_pivots_cover_every_cell_and_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let access = access_for(&config);
    let panel = access.fetch_prices(config.start_date, config.end_date).unwrap();
    let membership = access.fetch_membership(config.industry_level).unwrap();

    let spec = GridSpec {
        trigger_thresholds: vec![-1.0, 10.0],
        laggard_pcts: vec![0.5, 1.0],
    };
    let outcome = run_grid(&panel, &membership, &config, &spec).unwrap();
    assert_eq!(outcome.cells.len(), 4);

    let returns = outcome.return_table();
    assert_eq!(returns.rows, vec![-1.0, 10.0]);
    assert_eq!(returns.cols, vec![0.5, 1.0]);

    // An unreachable threshold keeps its cells in the table with no events.
    let silent: Vec<_> = outcome
        .cells
        .iter()
        .filter(|c| c.trigger_threshold == 10.0)
        .collect();
    assert!(silent.iter().all(|c| c.events == 0));
    assert!(returns.values[1].iter().all(|v| *v == 0.0));

    let again = run_grid(&panel, &membership, &config, &spec).unwrap();
    assert_eq!(again.return_table(), returns);
    assert_eq!(again.win_table(), outcome.win_table());
}

#[test]
fn summary_payload_reflects_engine_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let output = run_single_backtest(&access_for(&config), &config).unwrap();

    let payload = summarize(&output.summary.events);
    assert_eq!(payload.event_count, output.summary.event_count());
    assert!((payload.avg_return - output.summary.avg_return()).abs() < 1e-12);
    assert!(!payload.yearly.is_empty());
    assert_eq!(payload.yearly[0].year, 2024);
}
