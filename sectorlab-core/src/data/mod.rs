//! Data layer: provider abstraction, TuShare HTTP provider, Parquet cache,
//! and the chunked access layer with day-by-day fallback.

pub mod access;
pub mod cache;
pub mod mock;
pub mod provider;
pub mod tushare;

pub use access::{CoverageReport, DataAccess};
pub use cache::PanelCache;
pub use mock::MockProvider;
pub use provider::{
    DataError, FetchProgress, MarketDataProvider, SilentProgress, StdoutProgress,
};
pub use tushare::TuShareProvider;
