//! Daily and weekly return construction.

use crate::domain::{PricePanel, ReturnObs, ReturnSeries};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Friday label of the calendar week containing `date`.
///
/// Weeks end on Friday; Saturday and Sunday fall into the following week's
/// bin, matching a W-FRI resample.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let from_monday = date.weekday().num_days_from_monday() as i64;
    let friday = Weekday::Fri.num_days_from_monday() as i64;
    date + Duration::days((friday - from_monday).rem_euclid(7))
}

/// Per-symbol day-over-day percentage change of adjusted close.
///
/// The first observed day of a symbol's history has no return. Rows with a
/// non-positive previous adjusted close are skipped.
pub fn daily_returns(panel: &PricePanel) -> ReturnSeries {
    let mut obs = Vec::new();
    let mut prev: Option<(&str, f64)> = None;
    for row in panel.rows() {
        let adj = row.adj_close();
        if let Some((prev_symbol, prev_adj)) = prev {
            if prev_symbol == row.symbol && prev_adj > 0.0 {
                obs.push(ReturnObs {
                    symbol: row.symbol.clone(),
                    date: row.date,
                    ret: adj / prev_adj - 1.0,
                });
            }
        }
        prev = Some((row.symbol.as_str(), adj));
    }
    ReturnSeries::new(obs)
}

/// Compound daily returns into weekly returns: `prod(1 + r) - 1` over the
/// trading days of each calendar week, labelled by the week-ending Friday.
pub fn weekly_returns(daily: &ReturnSeries) -> ReturnSeries {
    let mut obs = Vec::new();
    let mut current: Option<(String, NaiveDate, f64)> = None;
    for o in daily.observations() {
        let week = week_ending(o.date);
        match current.take() {
            Some((symbol, cur_week, growth)) if symbol == o.symbol && cur_week == week => {
                current = Some((symbol, cur_week, growth * (1.0 + o.ret)));
            }
            Some((symbol, cur_week, growth)) => {
                obs.push(ReturnObs {
                    symbol,
                    date: cur_week,
                    ret: growth - 1.0,
                });
                current = Some((o.symbol.clone(), week, 1.0 + o.ret));
            }
            None => current = Some((o.symbol.clone(), week, 1.0 + o.ret)),
        }
    }
    if let Some((symbol, week, growth)) = current {
        obs.push(ReturnObs {
            symbol,
            date: week,
            ret: growth - 1.0,
        });
    }
    ReturnSeries::new(obs)
}
