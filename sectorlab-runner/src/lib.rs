//! SectorLab Runner — orchestration on top of `sectorlab-core`.
//!
//! This crate provides:
//! - Single-backtest runner (fetch via the access layer, run the engine)
//! - Parameter grid sweep over trigger thresholds × laggard percentiles
//! - Per-event reporting (drawdowns, quantiles, yearly aggregation)
//! - CSV/JSON export and TOML run configuration

pub mod config;
pub mod export;
pub mod grid;
pub mod report;
pub mod runner;

pub use config::{load_strategy_config, run_id};
pub use export::{
    write_events_csv, write_grid_raw_csv, write_pivot_csv, write_summary_json,
};
pub use grid::{run_grid, GridCell, GridOutcome, GridSpec, PivotTable};
pub use report::{build_event_table, summarize, EventRecord, SummaryPayload, YearlySummary};
pub use runner::{run_single_backtest, RunError, RunOutput};
