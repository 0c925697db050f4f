//! TuShare Pro data provider.
//!
//! Speaks the TuShare HTTP API: a POST of `{api_name, token, params, fields}`
//! answered by `{code, msg, data: {fields, items}}`. Column order in the
//! response is not guaranteed, so every value is read by field-name lookup.
//! Membership responses name the constituent symbol either `ts_code` or
//! `con_code` depending on API version; both normalize to one canonical
//! symbol via an explicit alias table.

use super::provider::{DataError, MarketDataProvider};
use crate::config::StrategyConfig;
use crate::domain::{IndustryInfo, MembershipRow, PriceRow};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const ENDPOINT: &str = "https://api.tushare.pro";

/// Field names a membership row may use for the constituent symbol.
const SYMBOL_FIELD_ALIASES: &[&str] = &["ts_code", "con_code"];

/// Field names a classification row may use for the industry code.
const INDUSTRY_CODE_ALIASES: &[&str] = &["index_code", "l2_code", "l1_code", "l3_code"];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

/// A decoded response table with field-name column lookup.
struct ApiTable {
    columns: HashMap<String, usize>,
    items: Vec<Vec<Value>>,
}

impl ApiTable {
    fn new(data: ApiData) -> Self {
        let columns = data
            .fields
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            columns,
            items: data.items,
        }
    }

    /// Column index for the first matching alias.
    fn column_any(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|name| self.columns.get(*name)).copied()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    fn str_at<'a>(&'a self, row: &'a [Value], idx: usize) -> Option<&'a str> {
        row.get(idx).and_then(Value::as_str)
    }

    fn f64_at(&self, row: &[Value], idx: usize) -> Option<f64> {
        row.get(idx).and_then(Value::as_f64)
    }

    fn date_at(&self, row: &[Value], idx: usize) -> Option<NaiveDate> {
        self.str_at(row, idx).and_then(parse_compact_date)
    }
}

/// Parse TuShare's compact `YYYYMMDD` date format.
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

fn compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// TuShare Pro provider over blocking reqwest.
pub struct TuShareProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
    calendar: String,
    classify_src: String,
}

impl TuShareProvider {
    pub fn new(config: &StrategyConfig) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: ENDPOINT.to_string(),
            token: config.token.clone(),
            calendar: config.calendar.clone(),
            classify_src: config.classify_src.clone(),
        })
    }

    /// Issue one API call and decode the response table.
    fn call(&self, api_name: &str, params: Value, fields: &str) -> Result<ApiTable, DataError> {
        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    DataError::NetworkUnreachable(e.to_string())
                } else {
                    DataError::Other(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited { retry_after_secs: 60 });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {api_name}")));
        }

        let parsed: ApiResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("{api_name}: failed to parse response: {e}"))
        })?;
        if parsed.code != 0 {
            let message = parsed.msg.unwrap_or_else(|| "unknown error".into());
            // Per-minute quota messages are retryable; everything else is not.
            if message.contains("每分钟") || message.contains("频率") {
                return Err(DataError::RateLimited { retry_after_secs: 60 });
            }
            return Err(DataError::ProviderRejected {
                code: parsed.code,
                message,
            });
        }
        let data = parsed.data.ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("{api_name}: code 0 but no data"))
        })?;
        Ok(ApiTable::new(data))
    }

    fn range_params(start: NaiveDate, end: NaiveDate) -> Value {
        if start == end {
            json!({ "trade_date": compact(start) })
        } else {
            json!({ "start_date": compact(start), "end_date": compact(end) })
        }
    }

    /// Adjustment factors keyed by (symbol, date).
    fn adj_factors(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<(String, NaiveDate), f64>, DataError> {
        let table = self.call(
            "adj_factor",
            Self::range_params(start, end),
            "ts_code,trade_date,adj_factor",
        )?;
        let symbol_idx = table.column("ts_code").ok_or_else(|| {
            DataError::ResponseFormatChanged("adj_factor: missing ts_code".into())
        })?;
        let date_idx = table.column("trade_date").ok_or_else(|| {
            DataError::ResponseFormatChanged("adj_factor: missing trade_date".into())
        })?;
        let factor_idx = table.column("adj_factor").ok_or_else(|| {
            DataError::ResponseFormatChanged("adj_factor: missing adj_factor".into())
        })?;

        let mut factors = HashMap::with_capacity(table.items.len());
        for row in &table.items {
            let (Some(symbol), Some(date), Some(factor)) = (
                table.str_at(row, symbol_idx),
                table.date_at(row, date_idx),
                table.f64_at(row, factor_idx),
            ) else {
                continue;
            };
            factors.insert((symbol.to_string(), date), factor);
        }
        Ok(factors)
    }
}

impl MarketDataProvider for TuShareProvider {
    fn name(&self) -> &str {
        "tushare"
    }

    fn daily_bars(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceRow>, DataError> {
        let table = self.call(
            "daily",
            Self::range_params(start, end),
            "ts_code,trade_date,close",
        )?;
        let symbol_idx = table
            .column("ts_code")
            .ok_or_else(|| DataError::ResponseFormatChanged("daily: missing ts_code".into()))?;
        let date_idx = table
            .column("trade_date")
            .ok_or_else(|| DataError::ResponseFormatChanged("daily: missing trade_date".into()))?;
        let close_idx = table
            .column("close")
            .ok_or_else(|| DataError::ResponseFormatChanged("daily: missing close".into()))?;

        if table.items.is_empty() {
            return Ok(Vec::new());
        }
        let factors = self.adj_factors(start, end)?;

        let mut rows = Vec::with_capacity(table.items.len());
        for row in &table.items {
            let (Some(symbol), Some(date), Some(close)) = (
                table.str_at(row, symbol_idx),
                table.date_at(row, date_idx),
                table.f64_at(row, close_idx),
            ) else {
                continue;
            };
            let adj_factor = factors
                .get(&(symbol.to_string(), date))
                .copied()
                .unwrap_or(1.0);
            rows.push(PriceRow {
                symbol: symbol.to_string(),
                date,
                close,
                adj_factor,
            });
        }
        Ok(rows)
    }

    fn trading_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, DataError> {
        let table = self.call(
            "trade_cal",
            json!({
                "exchange": self.calendar,
                "start_date": compact(start),
                "end_date": compact(end),
            }),
            "cal_date,is_open",
        )?;
        let date_idx = table
            .column("cal_date")
            .ok_or_else(|| DataError::ResponseFormatChanged("trade_cal: missing cal_date".into()))?;
        let open_idx = table
            .column("is_open")
            .ok_or_else(|| DataError::ResponseFormatChanged("trade_cal: missing is_open".into()))?;

        let mut days: Vec<NaiveDate> = table
            .items
            .iter()
            .filter(|row| {
                row.get(open_idx)
                    .map(|v| v.as_i64() == Some(1) || v.as_str() == Some("1"))
                    .unwrap_or(false)
            })
            .filter_map(|row| table.date_at(row, date_idx))
            .collect();
        days.sort();
        Ok(days)
    }

    fn industry_classification(&self, level: u8) -> Result<Vec<IndustryInfo>, DataError> {
        let table = self.call(
            "index_classify",
            json!({ "level": format!("L{level}"), "src": self.classify_src }),
            "index_code,industry_name",
        )?;
        let code_idx = table.column_any(INDUSTRY_CODE_ALIASES).ok_or_else(|| {
            DataError::ResponseFormatChanged("index_classify: no industry code field".into())
        })?;
        let name_idx = table.column("industry_name").ok_or_else(|| {
            DataError::ResponseFormatChanged("index_classify: missing industry_name".into())
        })?;

        Ok(table
            .items
            .iter()
            .filter_map(|row| {
                Some(IndustryInfo {
                    industry_id: table.str_at(row, code_idx)?.to_string(),
                    name: table.str_at(row, name_idx)?.to_string(),
                })
            })
            .collect())
    }

    fn industry_members(&self, industry: &IndustryInfo) -> Result<Vec<MembershipRow>, DataError> {
        let table = self.call(
            "index_member_all",
            json!({ "l2_code": industry.industry_id }),
            "ts_code,con_code,in_date,out_date,is_new",
        )?;
        let symbol_idx = table.column_any(SYMBOL_FIELD_ALIASES).ok_or_else(|| {
            DataError::ResponseFormatChanged("index_member_all: no symbol field".into())
        })?;
        let in_idx = table.column("in_date");
        let out_idx = table.column("out_date");
        let new_idx = table.column("is_new");

        Ok(table
            .items
            .iter()
            .filter_map(|row| {
                let symbol = table.str_at(row, symbol_idx)?.to_string();
                // Missing is_new means currently active.
                let active = new_idx
                    .and_then(|i| table.str_at(row, i))
                    .map(|v| v == "Y")
                    .unwrap_or(true);
                Some(MembershipRow {
                    symbol,
                    industry_id: industry.industry_id.clone(),
                    industry_name: industry.name.clone(),
                    valid_from: in_idx.and_then(|i| table.date_at(row, i)),
                    valid_to: out_idx.and_then(|i| table.date_at(row, i)),
                    active,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from(fields: &[&str], items: Value) -> ApiTable {
        ApiTable::new(ApiData {
            fields: fields.iter().map(|s| s.to_string()).collect(),
            items: serde_json::from_value(items).unwrap(),
        })
    }

    #[test]
    fn column_lookup_is_order_independent() {
        let table = table_from(
            &["close", "ts_code", "trade_date"],
            json!([[10.5, "000001.SZ", "20240102"]]),
        );
        let row = &table.items[0];
        assert_eq!(table.str_at(row, table.column("ts_code").unwrap()), Some("000001.SZ"));
        assert_eq!(table.f64_at(row, table.column("close").unwrap()), Some(10.5));
        assert_eq!(
            table.date_at(row, table.column("trade_date").unwrap()),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
    }

    #[test]
    fn symbol_alias_normalization() {
        // Older API versions call the symbol column con_code.
        let table = table_from(&["con_code", "in_date"], json!([["600000.SH", "20200101"]]));
        let idx = table.column_any(SYMBOL_FIELD_ALIASES).unwrap();
        assert_eq!(table.str_at(&table.items[0], idx), Some("600000.SH"));
    }

    #[test]
    fn compact_date_parsing() {
        assert_eq!(
            parse_compact_date("20240830"),
            NaiveDate::from_ymd_opt(2024, 8, 30)
        );
        assert_eq!(parse_compact_date("not-a-date"), None);
    }

    #[test]
    fn error_response_decodes_to_rejection() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{"code": 2002, "msg": "token无效", "data": null}"#,
        )
        .unwrap();
        assert_eq!(resp.code, 2002);
        assert_eq!(resp.msg.as_deref(), Some("token无效"));
    }
}
