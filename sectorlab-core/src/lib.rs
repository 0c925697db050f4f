//! SectorLab Core — sector-rotation concentration backtest engine.
//!
//! This crate contains the heart of the research tool:
//! - Domain types (price panel, return series, industry membership, events)
//! - Data layer: provider trait, TuShare HTTP provider, Parquet cache,
//!   chunked access layer with day-by-day fallback
//! - Concentration analytics (market and per-industry)
//! - Laggard selection
//! - Event-driven backtest engine with holding-window evaluation

pub mod analytics;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod selector;

pub use config::{ConfigError, StrategyConfig, TriggerMode};
pub use engine::{BacktestEngine, BacktestSummary};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    /// The grid sweep shares panels and membership across rayon workers,
    /// so every type it touches must be Send + Sync.
    #[test]
    fn shared_types_are_send_sync() {
        assert_send::<domain::PricePanel>();
        assert_sync::<domain::PricePanel>();
        assert_send::<domain::IndustryMembership>();
        assert_sync::<domain::IndustryMembership>();
        assert_send::<domain::EventResult>();
        assert_sync::<domain::EventResult>();
        assert_send::<config::StrategyConfig>();
        assert_sync::<config::StrategyConfig>();
    }
}
