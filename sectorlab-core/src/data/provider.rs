//! Provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over the remote source so the
//! access layer can be exercised against an in-memory mock with a
//! configurable row limit.

use crate::domain::{IndustryInfo, MembershipRow, PriceRow};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider rejected request (code {code}): {message}")]
    ProviderRejected { code: i64, message: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("fetch failed for {start}..{end} after retries: {source}")]
    Fetch {
        start: NaiveDate,
        end: NaiveDate,
        #[source]
        source: Box<DataError>,
    },

    #[error("requested range {start}..{end} not covered for dataset '{dataset}'")]
    CoverageGap {
        dataset: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no cached data for dataset '{dataset}'")]
    NoCachedData { dataset: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether a request that failed with this error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. }
        )
    }
}

/// Abstract remote source for prices, the trading calendar, and industry
/// classification/membership. Implementations enforce whatever row limits
/// and rate limits the real source has; the access layer compensates.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily price/adjustment rows for all symbols in `[start, end]`.
    ///
    /// A response may be silently truncated at the provider's row limit;
    /// callers detect that from the row count, not from the error channel.
    fn daily_bars(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceRow>, DataError>;

    /// Ordered list of trading days in `[start, end]`.
    fn trading_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, DataError>;

    /// Industry list at the given classification level.
    fn industry_classification(&self, level: u8) -> Result<Vec<IndustryInfo>, DataError>;

    /// Membership rows (active and historical) for one industry.
    fn industry_members(&self, industry: &IndustryInfo) -> Result<Vec<MembershipRow>, DataError>;
}

/// Progress callback for multi-window fetch operations.
pub trait FetchProgress: Send + Sync {
    /// Called when starting to fetch one window of the requested range.
    fn on_window(&self, start: NaiveDate, end: NaiveDate, index: usize, total: usize);

    /// Called when a truncated window falls back to day-by-day requests.
    fn on_day_split(&self, start: NaiveDate, end: NaiveDate, days: usize);

    /// Called when the whole range is merged and cached.
    fn on_range_complete(&self, rows: usize);
}

/// No-op progress reporter, the default for library use.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_window(&self, _start: NaiveDate, _end: NaiveDate, _index: usize, _total: usize) {}
    fn on_day_split(&self, _start: NaiveDate, _end: NaiveDate, _days: usize) {}
    fn on_range_complete(&self, _rows: usize) {}
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_window(&self, start: NaiveDate, end: NaiveDate, index: usize, total: usize) {
        println!("[{}/{}] Fetching {start}..{end}...", index + 1, total);
    }

    fn on_day_split(&self, start: NaiveDate, end: NaiveDate, days: usize) {
        println!("  window {start}..{end} looks truncated, refetching {days} trading days");
    }

    fn on_range_complete(&self, rows: usize) {
        println!("Fetch complete: {rows} rows cached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DataError::NetworkUnreachable("down".into()).is_transient());
        assert!(DataError::RateLimited { retry_after_secs: 60 }.is_transient());
        assert!(!DataError::ResponseFormatChanged("field gone".into()).is_transient());
        assert!(!DataError::ProviderRejected {
            code: 2002,
            message: "bad token".into()
        }
        .is_transient());
        assert!(!DataError::ValidationError("bad".into()).is_transient());
    }
}
