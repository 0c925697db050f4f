//! Parameter grid sweep over trigger thresholds × laggard percentiles.
//!
//! Every cell is an independent engine run against shared read-only data,
//! executed in parallel with rayon. Cell order is the deterministic
//! cross-product order, so identical inputs yield identical tables.

use rayon::prelude::*;
use sectorlab_core::domain::{EventResult, IndustryMembership, PricePanel};
use sectorlab_core::StrategyConfig;
use std::fmt;

use crate::runner::{run_backtest_from_data, RunError};

/// Axes of the sweep. All other config fields are held fixed.
#[derive(Debug, Clone)]
pub struct GridSpec {
    pub trigger_thresholds: Vec<f64>,
    pub laggard_pcts: Vec<f64>,
}

impl GridSpec {
    /// Axes from the config's grid fields.
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            trigger_thresholds: config.grid_trigger_thresholds.clone(),
            laggard_pcts: config.grid_laggard_pcts.clone(),
        }
    }

    pub fn size(&self) -> usize {
        self.trigger_thresholds.len() * self.laggard_pcts.len()
    }

    /// Cross-product of configs in row-major (trigger, then laggard) order.
    fn generate_configs(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &trigger in &self.trigger_thresholds {
            for &laggard in &self.laggard_pcts {
                configs.push(StrategyConfig {
                    trigger_threshold: trigger,
                    laggard_pct: laggard,
                    ..base.clone()
                });
            }
        }
        configs
    }
}

/// One evaluated cell: the pair, its run summary, and the raw events.
#[derive(Debug)]
pub struct GridCell {
    pub trigger_threshold: f64,
    pub laggard_pct: f64,
    pub events: usize,
    pub avg_return: f64,
    pub win_rate: f64,
    /// Per-event raw results, retained for external export.
    pub raw_events: Vec<EventResult>,
}

/// All cells of a completed sweep.
#[derive(Debug)]
pub struct GridOutcome {
    pub cells: Vec<GridCell>,
}

impl GridOutcome {
    pub fn return_table(&self) -> PivotTable {
        self.pivot("avg_return", |c| c.avg_return)
    }

    pub fn win_table(&self) -> PivotTable {
        self.pivot("win_rate", |c| c.win_rate)
    }

    fn pivot(&self, label: &str, value: impl Fn(&GridCell) -> f64) -> PivotTable {
        let mut rows: Vec<f64> = self.cells.iter().map(|c| c.trigger_threshold).collect();
        rows.sort_by(|a, b| a.total_cmp(b));
        rows.dedup();
        let mut cols: Vec<f64> = self.cells.iter().map(|c| c.laggard_pct).collect();
        cols.sort_by(|a, b| a.total_cmp(b));
        cols.dedup();

        let values = rows
            .iter()
            .map(|&trigger| {
                cols.iter()
                    .map(|&laggard| {
                        self.cells
                            .iter()
                            .find(|c| {
                                c.trigger_threshold == trigger && c.laggard_pct == laggard
                            })
                            .map(&value)
                            .unwrap_or(f64::NAN)
                    })
                    .collect()
            })
            .collect();
        PivotTable {
            label: label.to_string(),
            rows,
            cols,
            values,
        }
    }
}

/// Summary values pivoted by trigger threshold (rows) × laggard pct (cols).
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub label: String,
    pub rows: Vec<f64>,
    pub cols: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

impl fmt::Display for PivotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "trigger")?;
        for col in &self.cols {
            write!(f, "{col:>10.2}")?;
        }
        writeln!(f)?;
        for (row, values) in self.rows.iter().zip(&self.values) {
            write!(f, "{row:>10.2}")?;
            for v in values {
                write!(f, "{v:>10.4}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Run the sweep. Cells are independent; rayon shares only read access to
/// the pre-fetched panel and membership.
pub fn run_grid(
    panel: &PricePanel,
    membership: &IndustryMembership,
    base: &StrategyConfig,
    spec: &GridSpec,
) -> Result<GridOutcome, RunError> {
    let configs = spec.generate_configs(base);
    let cells = configs
        .par_iter()
        .map(|config| {
            let summary = run_backtest_from_data(config, panel, membership)?;
            Ok(GridCell {
                trigger_threshold: config.trigger_threshold,
                laggard_pct: config.laggard_pct,
                events: summary.event_count(),
                avg_return: summary.avg_return(),
                win_rate: summary.win_rate(),
                raw_events: summary.events,
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;
    Ok(GridOutcome { cells })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(trigger: f64, laggard: f64, avg: f64) -> GridCell {
        GridCell {
            trigger_threshold: trigger,
            laggard_pct: laggard,
            events: 1,
            avg_return: avg,
            win_rate: if avg > 0.0 { 1.0 } else { 0.0 },
            raw_events: vec![],
        }
    }

    #[test]
    fn pivot_preserves_axis_order() {
        let outcome = GridOutcome {
            cells: vec![
                cell(0.0, 0.3, 0.01),
                cell(0.0, 0.5, 0.02),
                cell(0.1, 0.3, 0.03),
                cell(0.1, 0.5, 0.04),
            ],
        };
        let table = outcome.return_table();
        assert_eq!(table.rows, vec![0.0, 0.1]);
        assert_eq!(table.cols, vec![0.3, 0.5]);
        assert_eq!(table.values[1][0], 0.03);
    }

    #[test]
    fn grid_spec_size_is_cross_product() {
        let spec = GridSpec {
            trigger_thresholds: vec![0.0, 0.1, 0.3],
            laggard_pcts: vec![0.3, 0.5],
        };
        assert_eq!(spec.size(), 6);
        let configs = spec.generate_configs(&StrategyConfig::default());
        assert_eq!(configs.len(), 6);
        assert_eq!(configs[0].trigger_threshold, 0.0);
        assert_eq!(configs[1].laggard_pct, 0.5);
    }
}
