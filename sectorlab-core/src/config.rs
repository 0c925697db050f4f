//! Strategy configuration: every tunable knob for one backtest run.
//!
//! The config is immutable once handed to the engine. Validation happens at
//! engine construction so bad parameters fail before any data is touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fallback token used when neither an explicit token nor the
/// `TUSHARE_TOKEN` environment variable is set.
pub const DEFAULT_TOKEN: &str = "98b2900883e70c8b1e141fdb33e4a5a1123dc999d217fcd2c0ce4c89";

/// Environment variable consulted for the provider token.
pub const TOKEN_ENV_VAR: &str = "TUSHARE_TOKEN";

/// What the trigger threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Week-over-week change of market concentration.
    #[default]
    Delta,
    /// Absolute concentration level.
    Level,
}

/// Configuration errors, reported before any computation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("{name} must be in (0, 1], got {value}")]
    PercentileOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be at least 1, got {value}")]
    ZeroLength { name: &'static str, value: usize },
}

/// Immutable parameter bundle for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    /// Backtest start date (inclusive).
    pub start_date: NaiveDate,

    /// Backtest end date (inclusive).
    pub end_date: NaiveDate,

    /// Top fraction used for the market concentration spread.
    pub market_top_pct: f64,

    /// Top fraction used for per-industry concentration spreads.
    pub industry_top_pct: f64,

    /// Bottom fraction of an industry selected as laggards.
    pub laggard_pct: f64,

    /// Threshold the trigger signal must exceed to start an event.
    pub trigger_threshold: f64,

    /// Whether the trigger compares the delta or the absolute level.
    pub trigger_mode: TriggerMode,

    /// Holding window length in trading days.
    pub hold_days: usize,

    /// Number of top-ranked industries considered per event.
    pub top_industry_n: usize,

    /// Trailing lookback window (in weeks) for laggard selection.
    pub lookback_weeks: usize,

    /// Exchange whose trading calendar drives the day-by-day fallback.
    pub calendar: String,

    /// Industry classification source tag (e.g. "SW2021").
    pub classify_src: String,

    /// Classification hierarchy level.
    pub industry_level: u8,

    /// Provider token. Resolved via [`resolve_token`] before use.
    pub token: String,

    /// On-disk cache root.
    pub cache_dir: PathBuf,

    /// Width of one bulk request window, in calendar months.
    pub chunk_months: u32,

    /// Row count at which a window response is treated as truncated.
    pub row_limit: usize,

    /// Grid axis: trigger thresholds.
    pub grid_trigger_thresholds: Vec<f64>,

    /// Grid axis: laggard percentiles.
    pub grid_laggard_pcts: Vec<f64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(),
            market_top_pct: 0.3,
            industry_top_pct: 0.3,
            laggard_pct: 0.3,
            trigger_threshold: 0.3,
            trigger_mode: TriggerMode::Delta,
            hold_days: 60,
            top_industry_n: 3,
            lookback_weeks: 1,
            calendar: "SSE".to_string(),
            classify_src: "SW2021".to_string(),
            industry_level: 2,
            token: DEFAULT_TOKEN.to_string(),
            cache_dir: PathBuf::from("data_cache"),
            chunk_months: 3,
            row_limit: 5500,
            grid_trigger_thresholds: vec![0.0, 0.1, 0.3, 0.5],
            grid_laggard_pcts: vec![0.3, 0.5, 0.7],
        }
    }
}

impl StrategyConfig {
    /// Check every parameter the engine depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date > self.end_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        for (name, value) in [
            ("market_top_pct", self.market_top_pct),
            ("industry_top_pct", self.industry_top_pct),
            ("laggard_pct", self.laggard_pct),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::PercentileOutOfRange { name, value });
            }
        }
        for (name, value) in [
            ("hold_days", self.hold_days),
            ("top_industry_n", self.top_industry_n),
            ("lookback_weeks", self.lookback_weeks),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLength { name, value });
            }
        }
        Ok(())
    }
}

/// Resolve the provider token: explicit value, then environment, then the
/// built-in default. The result lives in the config, never in global state.
pub fn resolve_token(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_TOKEN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_date_range() {
        let config = StrategyConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_percentile() {
        for bad in [0.0, -0.1, 1.5] {
            let config = StrategyConfig {
                laggard_pct: bad,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "laggard_pct = {bad}");
        }
    }

    #[test]
    fn rejects_zero_holding_window() {
        let config = StrategyConfig {
            hold_days: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLength { name: "hold_days", .. })
        ));
    }

    #[test]
    fn explicit_token_wins() {
        assert_eq!(resolve_token(Some("abc".into())), "abc");
    }
}
