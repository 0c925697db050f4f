//! Concentration analytics: price panel → return panels → concentration series.

pub mod concentration;
pub mod returns;

pub use concentration::{
    industry_concentration, market_concentration, rank_industries, ConcentrationPoint,
    ConcentrationSeries,
};
pub use returns::{daily_returns, week_ending, weekly_returns};
