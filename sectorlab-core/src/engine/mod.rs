//! Event-driven backtest loop.
//!
//! Iterates chronologically over weekly market concentration, fires an event
//! whenever the configured signal (delta or level) exceeds the trigger
//! threshold, selects laggards inside the top-ranked industries, and
//! evaluates each event's forward holding window independently. A new
//! trigger during an active holding window still produces its own event.

use crate::analytics::{
    daily_returns, industry_concentration, market_concentration, rank_industries, weekly_returns,
};
use crate::config::{ConfigError, StrategyConfig, TriggerMode};
use crate::domain::{
    Event, EventResult, IndustryInfo, IndustryMembership, PathPoint, PricePanel, ReturnSeries,
};
use crate::selector::{pick_laggards, Laggard, LaggardCandidate};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};

/// Aggregate outcome of one engine run.
#[derive(Debug, Clone, Default)]
pub struct BacktestSummary {
    pub events: Vec<EventResult>,
}

impl BacktestSummary {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Mean aggregate return across events; 0 when there are none.
    pub fn avg_return(&self) -> f64 {
        if self.events.is_empty() {
            return 0.0;
        }
        self.events.iter().map(|e| e.total_return).sum::<f64>() / self.events.len() as f64
    }

    /// Fraction of events with a positive aggregate return.
    pub fn win_rate(&self) -> f64 {
        if self.events.is_empty() {
            return 0.0;
        }
        self.events.iter().filter(|e| e.win()).count() as f64 / self.events.len() as f64
    }
}

/// The sector-rotation event engine. Construction validates the config;
/// a run borrows pre-fetched data and owns its events until returned.
pub struct BacktestEngine {
    config: StrategyConfig,
}

impl BacktestEngine {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the full event loop over a price panel and membership table.
    pub fn run(&self, panel: &PricePanel, membership: &IndustryMembership) -> BacktestSummary {
        let daily = daily_returns(panel);
        let weekly = weekly_returns(&daily);
        let market = market_concentration(&weekly, self.config.market_top_pct);
        let by_industry =
            industry_concentration(&weekly, membership, self.config.industry_top_pct);

        let trading_days = daily.dates();
        let daily_by_symbol = index_by_symbol(&daily);
        let weekly_by_symbol = index_by_symbol(&weekly);
        let current_members = membership.current_by_industry();
        let industry_names = membership.industry_names();

        let mut events = Vec::new();
        for point in market.points() {
            let signal = match self.config.trigger_mode {
                TriggerMode::Delta => match point.delta {
                    Some(delta) => delta,
                    None => continue,
                },
                TriggerMode::Level => point.value,
            };
            if signal <= self.config.trigger_threshold {
                continue;
            }

            let ranked = rank_industries(&by_industry, point.week, self.config.top_industry_n);
            if ranked.is_empty() {
                continue;
            }

            let laggards = self.select_laggards(
                &ranked,
                &current_members,
                &industry_names,
                &weekly_by_symbol,
                point.week,
            );
            if laggards.is_empty() {
                continue;
            }

            let event = Event {
                trigger_week: point.week,
                signal,
                concentration: point.value,
                industries: ranked
                    .iter()
                    .map(|(id, _)| IndustryInfo {
                        industry_id: id.clone(),
                        name: industry_names.get(id).cloned().unwrap_or_default(),
                    })
                    .collect(),
            };
            if let Some(result) =
                self.evaluate_holding(event, laggards, &trading_days, &daily_by_symbol)
            {
                events.push(result);
            }
        }
        BacktestSummary { events }
    }

    /// Laggard selection per ranked industry, unioned across industries.
    fn select_laggards(
        &self,
        ranked: &[(String, f64)],
        current_members: &BTreeMap<String, Vec<String>>,
        industry_names: &BTreeMap<String, String>,
        weekly_by_symbol: &HashMap<&str, Vec<(NaiveDate, f64)>>,
        trigger_week: NaiveDate,
    ) -> Vec<Laggard> {
        let mut selected = Vec::new();
        for (industry_id, _) in ranked {
            let Some(members) = current_members.get(industry_id) else {
                continue;
            };
            let name = industry_names.get(industry_id).cloned().unwrap_or_default();
            let candidates: Vec<LaggardCandidate> = members
                .iter()
                .filter_map(|symbol| {
                    let lookback = self.lookback_return(
                        weekly_by_symbol.get(symbol.as_str())?,
                        trigger_week,
                    )?;
                    Some(LaggardCandidate {
                        symbol: symbol.clone(),
                        industry_id: industry_id.clone(),
                        industry_name: name.clone(),
                        lookback_return: lookback,
                    })
                })
                .collect();
            selected.extend(pick_laggards(&candidates, self.config.laggard_pct));
        }
        selected
    }

    /// Cumulative weekly return over the trailing lookback window ending at
    /// the trigger week. A symbol must have traded in the trigger week
    /// itself to be a candidate.
    fn lookback_return(
        &self,
        weeks: &[(NaiveDate, f64)],
        trigger_week: NaiveDate,
    ) -> Option<f64> {
        weeks.iter().find(|(week, _)| *week == trigger_week)?;
        let window_start = trigger_week - Duration::weeks(self.config.lookback_weeks as i64 - 1);
        let growth: f64 = weeks
            .iter()
            .filter(|(week, _)| *week >= window_start && *week <= trigger_week)
            .map(|(_, ret)| 1.0 + ret)
            .product();
        Some(growth - 1.0)
    }

    /// Evaluate the forward holding window for a laggard set. Entry is the
    /// first trading day after the trigger week; the path runs `hold_days`
    /// trading days or until data ends (flagged partial). Returns None when
    /// no forward data exists at all.
    fn evaluate_holding(
        &self,
        event: Event,
        laggards: Vec<Laggard>,
        trading_days: &[NaiveDate],
        daily_by_symbol: &HashMap<&str, Vec<(NaiveDate, f64)>>,
    ) -> Option<EventResult> {
        let entry_idx = trading_days.partition_point(|d| *d <= event.trigger_week);
        if entry_idx >= trading_days.len() {
            return None;
        }
        let last_target = entry_idx + self.config.hold_days - 1;
        let exit_idx = last_target.min(trading_days.len() - 1);
        let partial_window = last_target > trading_days.len() - 1;
        let window = &trading_days[entry_idx..=exit_idx];
        let (entry_date, exit_date) = (window[0], window[window.len() - 1]);

        let mut symbols: Vec<String> = laggards.iter().map(|l| l.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();

        // Per-symbol daily returns inside the window, indexed by date.
        let mut per_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        let mut stock_returns: BTreeMap<String, f64> = BTreeMap::new();
        for symbol in &symbols {
            let Some(obs) = daily_by_symbol.get(symbol.as_str()) else {
                continue;
            };
            let mut growth = 1.0;
            let mut observed = false;
            for (date, ret) in obs {
                if *date >= entry_date && *date <= exit_date {
                    per_day.entry(*date).or_default().push(*ret);
                    growth *= 1.0 + ret;
                    observed = true;
                }
            }
            if observed {
                stock_returns.insert(symbol.clone(), growth - 1.0);
            }
        }

        let path: Vec<PathPoint> = per_day
            .into_iter()
            .map(|(date, rets)| PathPoint {
                date,
                ret: rets.iter().sum::<f64>() / rets.len() as f64,
            })
            .collect();
        if path.is_empty() {
            return None;
        }
        let total_return = path.iter().fold(1.0, |acc, p| acc * (1.0 + p.ret)) - 1.0;

        Some(EventResult {
            event,
            entry_date,
            exit_date,
            symbols,
            laggards,
            path,
            total_return,
            stock_returns,
            partial_window,
        })
    }
}

/// Index a return series by symbol, each entry sorted by date.
fn index_by_symbol(series: &ReturnSeries) -> HashMap<&str, Vec<(NaiveDate, f64)>> {
    let mut map: HashMap<&str, Vec<(NaiveDate, f64)>> = HashMap::new();
    for o in series.observations() {
        map.entry(o.symbol.as_str()).or_default().push((o.date, o.ret));
    }
    map
}
