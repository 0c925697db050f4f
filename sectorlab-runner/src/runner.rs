//! Single-backtest runner — wires the access layer and the engine.

use sectorlab_core::config::ConfigError;
use sectorlab_core::data::{DataAccess, DataError};
use sectorlab_core::domain::{IndustryMembership, PricePanel};
use sectorlab_core::{BacktestEngine, BacktestSummary, StrategyConfig};
use thiserror::Error;

use crate::config::run_id;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Outcome of one run, tagged with its config fingerprint.
#[derive(Debug)]
pub struct RunOutput {
    pub run_id: String,
    pub summary: BacktestSummary,
}

/// Fetch data through the access layer, then run the engine once.
///
/// This is the high-level entry point used by the CLI. For pre-loaded data
/// (the grid sweep), use [`run_backtest_from_data`] instead.
pub fn run_single_backtest(
    access: &DataAccess,
    config: &StrategyConfig,
) -> Result<RunOutput, RunError> {
    let engine = BacktestEngine::new(config.clone())?;
    let panel = access.fetch_prices(config.start_date, config.end_date)?;
    let membership = access.fetch_membership(config.industry_level)?;
    Ok(RunOutput {
        run_id: run_id(config),
        summary: engine.run(&panel, &membership),
    })
}

/// Run the engine on pre-fetched data with no I/O. The grid sweep calls this
/// for every cell against shared read-only panels.
pub fn run_backtest_from_data(
    config: &StrategyConfig,
    panel: &PricePanel,
    membership: &IndustryMembership,
) -> Result<BacktestSummary, RunError> {
    let engine = BacktestEngine::new(config.clone())?;
    Ok(engine.run(panel, membership))
}
