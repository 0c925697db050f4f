//! In-memory provider for tests and offline experiments.
//!
//! Mirrors the real provider's row-limit behavior: when a response cap is
//! set, bulk responses are silently truncated at the cap, exactly like the
//! remote source. A call counter lets tests assert how many requests the
//! access layer actually issued.

use super::provider::{DataError, MarketDataProvider};
use crate::domain::{IndustryInfo, MembershipRow, PriceRow};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct MockProvider {
    rows: Vec<PriceRow>,
    classification: Vec<IndustryInfo>,
    members: BTreeMap<String, Vec<MembershipRow>>,
    response_cap: Option<usize>,
    fail_daily: bool,
    daily_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(rows: Vec<PriceRow>, membership: Vec<MembershipRow>) -> Self {
        let mut classification: Vec<IndustryInfo> = Vec::new();
        let mut members: BTreeMap<String, Vec<MembershipRow>> = BTreeMap::new();
        for row in membership {
            if !classification.iter().any(|i| i.industry_id == row.industry_id) {
                classification.push(IndustryInfo {
                    industry_id: row.industry_id.clone(),
                    name: row.industry_name.clone(),
                });
            }
            members.entry(row.industry_id.clone()).or_default().push(row);
        }
        Self {
            rows,
            classification,
            members,
            response_cap: None,
            fail_daily: false,
            daily_calls: AtomicUsize::new(0),
        }
    }

    /// Truncate every daily-bars response to at most `cap` rows.
    pub fn with_response_cap(mut self, cap: usize) -> Self {
        self.response_cap = Some(cap);
        self
    }

    /// Make every daily-bars request fail with a transient network error.
    pub fn with_failing_daily(mut self) -> Self {
        self.fail_daily = true;
        self
    }

    /// Number of daily-bars requests served so far.
    pub fn daily_call_count(&self) -> usize {
        self.daily_calls.load(Ordering::Relaxed)
    }
}

impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn daily_bars(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceRow>, DataError> {
        self.daily_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_daily {
            return Err(DataError::NetworkUnreachable("mock outage".into()));
        }
        let mut rows: Vec<PriceRow> = self
            .rows
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.date, a.symbol.as_str()).cmp(&(b.date, b.symbol.as_str())));
        if let Some(cap) = self.response_cap {
            rows.truncate(cap);
        }
        Ok(rows)
    }

    fn trading_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, DataError> {
        let mut days: Vec<NaiveDate> = self
            .rows
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .map(|r| r.date)
            .collect();
        days.sort();
        days.dedup();
        Ok(days)
    }

    fn industry_classification(&self, _level: u8) -> Result<Vec<IndustryInfo>, DataError> {
        Ok(self.classification.clone())
    }

    fn industry_members(&self, industry: &IndustryInfo) -> Result<Vec<MembershipRow>, DataError> {
        Ok(self
            .members
            .get(&industry.industry_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<PriceRow> {
        (0..10)
            .map(|i| PriceRow {
                symbol: format!("{i:06}.SZ"),
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                close: 10.0,
                adj_factor: 1.0,
            })
            .collect()
    }

    #[test]
    fn response_cap_truncates_like_the_remote_source() {
        let provider = MockProvider::new(rows(), vec![]).with_response_cap(4);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let bars = provider.daily_bars(start, end).unwrap();
        assert_eq!(bars.len(), 4);
    }

    #[test]
    fn call_counter_tracks_daily_requests() {
        let provider = MockProvider::new(rows(), vec![]);
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(provider.daily_call_count(), 0);
        provider.daily_bars(day, day).unwrap();
        provider.daily_bars(day, day).unwrap();
        assert_eq!(provider.daily_call_count(), 2);
    }
}
