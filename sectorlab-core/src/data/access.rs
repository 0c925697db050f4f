//! Chunked, fault-tolerant access layer over the provider and cache.
//!
//! A requested range is served from the cache when fully covered, otherwise
//! split into calendar-month windows. The provider silently truncates
//! oversized responses, so a window whose row count reaches the configured
//! limit, or whose date coverage leaves a gap at either edge, is discarded
//! and re-fetched one trading day at a time via the trading calendar. The
//! merged result is de-duplicated and written through to the cache; a failed
//! window is never partially written.

use super::cache::{PanelCache, DAILY_DATASET};
use super::provider::{DataError, FetchProgress, MarketDataProvider, SilentProgress};
use crate::config::StrategyConfig;
use crate::domain::{IndustryMembership, PricePanel, PriceRow};
use chrono::{Duration, Months, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;

/// A window edge gap larger than this (calendar days) marks the bulk
/// response as incomplete even below the row limit.
const MAX_EDGE_GAP_DAYS: i64 = 5;

/// Coverage report for a requested range, produced by [`DataAccess::verify`].
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub cache_dir: PathBuf,
    pub cached_segments: usize,
    pub price_rows: usize,
    pub symbols: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub membership_rows: usize,
    pub industries: usize,
    pub industry_level: u8,
    pub chunk_months: u32,
}

/// Orchestrates chunked provider requests and writes through the cache.
pub struct DataAccess {
    provider: Box<dyn MarketDataProvider>,
    cache: PanelCache,
    progress: Box<dyn FetchProgress>,
    chunk_months: u32,
    row_limit: usize,
    max_retries: u32,
    base_delay: std::time::Duration,
}

impl DataAccess {
    pub fn new(provider: Box<dyn MarketDataProvider>, cache: PanelCache) -> Self {
        Self {
            provider,
            cache,
            progress: Box::new(SilentProgress),
            chunk_months: 3,
            row_limit: 5500,
            max_retries: 3,
            base_delay: std::time::Duration::from_millis(500),
        }
    }

    /// Report fetch progress through the given sink.
    pub fn with_progress(mut self, progress: Box<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Apply chunking parameters from a strategy config.
    pub fn with_config(mut self, config: &StrategyConfig) -> Self {
        self.chunk_months = config.chunk_months.max(1);
        self.row_limit = config.row_limit;
        self
    }

    /// Shrink the retry backoff (tests).
    pub fn with_base_delay(mut self, base_delay: std::time::Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn cache(&self) -> &PanelCache {
        &self.cache
    }

    /// Fetch the daily price panel covering exactly `[start, end]`,
    /// from the cache or the provider.
    pub fn fetch_prices(&self, start: NaiveDate, end: NaiveDate) -> Result<PricePanel, DataError> {
        if self.cache.covers(DAILY_DATASET, start, end) {
            return Ok(PricePanel::from_rows(self.cache.load_prices(start, end)?));
        }

        let windows = month_windows(start, end, self.chunk_months);
        let total = windows.len();
        let mut merged: Vec<PriceRow> = Vec::new();
        for (index, (window_start, window_end)) in windows.into_iter().enumerate() {
            self.progress.on_window(window_start, window_end, index, total);
            let rows = self
                .fetch_window(window_start, window_end)
                .map_err(|e| DataError::Fetch {
                    start: window_start,
                    end: window_end,
                    source: Box::new(e),
                })?;
            merged.extend(rows);
        }

        let panel = PricePanel::from_rows(merged);
        if panel.is_empty() {
            return Err(DataError::CoverageGap {
                dataset: DAILY_DATASET.to_string(),
                start,
                end,
            });
        }
        self.cache.write_prices(start, end, panel.rows())?;
        self.progress.on_range_complete(panel.len());
        Ok(panel)
    }

    /// Fetch the membership table, from the cache or via the two-step
    /// classification + per-industry member join.
    pub fn fetch_membership(&self, level: u8) -> Result<IndustryMembership, DataError> {
        if self.cache.has_membership(level) {
            return Ok(IndustryMembership::new(self.cache.load_membership(level)?));
        }

        let classification =
            self.with_retry(|| self.provider.industry_classification(level))?;
        let mut rows = Vec::new();
        for industry in &classification {
            match self.with_retry(|| self.provider.industry_members(industry)) {
                Ok(members) => rows.extend(members),
                Err(e) => {
                    // One broken industry should not sink the whole mapping.
                    eprintln!(
                        "WARNING: skipping industry {} ({}): {e}",
                        industry.industry_id, industry.name
                    );
                }
            }
        }
        if rows.is_empty() {
            return Err(DataError::ValidationError(format!(
                "no membership rows fetched for level {level}"
            )));
        }

        let membership = IndustryMembership::new(rows);
        self.cache.write_membership(level, membership.rows())?;
        Ok(membership)
    }

    /// Report what the cache (after fetching) holds for a range, so gaps
    /// are detectable before running the engine.
    pub fn verify(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        level: u8,
    ) -> Result<CoverageReport, DataError> {
        let panel = self.fetch_prices(start, end)?;
        let membership = self.fetch_membership(level)?;
        let bounds = panel.date_bounds();
        Ok(CoverageReport {
            cache_dir: self.cache.cache_dir().to_path_buf(),
            cached_segments: self.cache.status().iter().map(|m| m.segments.len()).sum(),
            price_rows: panel.len(),
            symbols: panel.symbol_count(),
            first_day: bounds.map(|(a, _)| a),
            last_day: bounds.map(|(_, b)| b),
            membership_rows: membership.len(),
            industries: membership.industry_names().len(),
            industry_level: level,
            chunk_months: self.chunk_months,
        })
    }

    // ── Window plumbing ─────────────────────────────────────────────

    /// Fetch one window, falling back to per-trading-day requests when the
    /// bulk response looks truncated.
    fn fetch_window(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceRow>, DataError> {
        let bulk = self.with_retry(|| self.provider.daily_bars(start, end))?;
        if !self.needs_day_split(&bulk, start, end)? {
            return Ok(bulk);
        }
        self.fetch_by_trading_day(start, end)
    }

    /// Re-request a window one trading day at a time. Day-sized responses
    /// stay under the row limit regardless of symbol-count growth.
    fn fetch_by_trading_day(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRow>, DataError> {
        let trading_days = self.with_retry(|| self.provider.trading_calendar(start, end))?;
        self.progress.on_day_split(start, end, trading_days.len());
        let mut rows = Vec::new();
        for day in trading_days {
            let daily = self
                .with_retry(|| self.provider.daily_bars(day, day))
                .map_err(|e| DataError::Fetch {
                    start: day,
                    end: day,
                    source: Box::new(e),
                })?;
            rows.extend(daily);
        }
        Ok(rows)
    }

    /// Decide whether a bulk window response must be discarded in favor of
    /// the day-by-day path.
    fn needs_day_split(
        &self,
        rows: &[PriceRow],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, DataError> {
        if start >= end {
            return Ok(false);
        }
        if rows.is_empty() {
            // Empty is fine only when the window has no trading days at all.
            let trading_days = self.with_retry(|| self.provider.trading_calendar(start, end))?;
            return Ok(!trading_days.is_empty());
        }
        if rows.len() >= self.row_limit {
            return Ok(true);
        }
        let min_date = rows.iter().map(|r| r.date).min();
        let max_date = rows.iter().map(|r| r.date).max();
        if let (Some(min), Some(max)) = (min_date, max_date) {
            if (min - start).num_days() > MAX_EDGE_GAP_DAYS
                || (end - max).num_days() > MAX_EDGE_GAP_DAYS
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Retry a provider request with exponential backoff on transient errors.
    fn with_retry<T>(
        &self,
        mut request: impl FnMut() -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.retry_delay(attempt, last_error.as_ref()));
            }
            match request() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    /// Backoff before retry `attempt` (1-based). A quota hit carries a
    /// provider-suggested wait, which takes precedence over the backoff
    /// when it is longer.
    fn retry_delay(&self, attempt: u32, last_error: Option<&DataError>) -> std::time::Duration {
        let backoff = self.base_delay * 2u32.pow(attempt - 1);
        match last_error {
            Some(DataError::RateLimited { retry_after_secs }) => {
                backoff.max(std::time::Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }
}

/// Split `[start, end]` into successive windows of `months` calendar months.
fn month_windows(start: NaiveDate, end: NaiveDate, months: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut current = start;
    while current <= end {
        let tentative_end = current
            .checked_add_months(Months::new(months))
            .map(|d| d - Duration::days(1))
            .unwrap_or(end);
        let window_end = tentative_end.min(end);
        windows.push((current, window_end));
        current = window_end + Duration::days(1);
    }
    windows
}
