//! Parquet cache layer keyed by (dataset, covered range).
//!
//! Layout: `{cache_dir}/dataset={NAME}/{KEY}.parquet` where KEY is
//! `{start}_{end}` for price segments and `current` for the membership
//! table, plus a `meta.json` sidecar per dataset listing its segments.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Idempotent upsert-by-range (re-writing a key replaces the segment)
//! - Range-coverage queries ("is [a,b] fully covered?")
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)

use super::provider::DataError;
use crate::domain::{MembershipRow, PriceRow};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Dataset name for the daily price panel.
pub const DAILY_DATASET: &str = "daily";

/// Dataset name for a membership table at a classification level.
pub fn industry_dataset(level: u8) -> String {
    format!("industry_l{level}")
}

/// One cached segment of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// File stem of the segment ("{start}_{end}" or "current").
    pub key: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub rows: usize,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Metadata sidecar for a dataset directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub dataset: String,
    pub segments: Vec<SegmentMeta>,
}

/// The Parquet cache.
pub struct PanelCache {
    cache_dir: PathBuf,
}

impl PanelCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.cache_dir.join(format!("dataset={dataset}"))
    }

    fn segment_path(&self, dataset: &str, key: &str) -> PathBuf {
        self.dataset_dir(dataset).join(format!("{key}.parquet"))
    }

    fn meta_path(&self, dataset: &str) -> PathBuf {
        self.dataset_dir(dataset).join("meta.json")
    }

    fn range_key(start: NaiveDate, end: NaiveDate) -> String {
        format!("{start}_{end}")
    }

    /// Metadata for every dataset present in the cache, sorted by name.
    pub fn status(&self) -> Vec<DatasetMeta> {
        let mut metas = Vec::new();
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return metas;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if let Some(dataset) = name.to_string_lossy().strip_prefix("dataset=") {
                if let Some(meta) = self.get_meta(dataset) {
                    metas.push(meta);
                }
            }
        }
        metas.sort_by(|a, b| a.dataset.cmp(&b.dataset));
        metas
    }

    /// Metadata for a dataset, if cached.
    pub fn get_meta(&self, dataset: &str) -> Option<DatasetMeta> {
        let content = fs::read_to_string(self.meta_path(dataset)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// True when some cached segment fully covers `[start, end]`.
    pub fn covers(&self, dataset: &str, start: NaiveDate, end: NaiveDate) -> bool {
        self.covering_segment(dataset, start, end).is_some()
    }

    fn covering_segment(
        &self,
        dataset: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<SegmentMeta> {
        let meta = self.get_meta(dataset)?;
        meta.segments
            .into_iter()
            .find(|s| matches!((s.start, s.end), (Some(a), Some(b)) if a <= start && b >= end))
    }

    /// Write a price segment covering `[start, end]`.
    ///
    /// Idempotent: re-writing the same range replaces the segment. The write
    /// is atomic; a reader never observes a partial segment.
    pub fn write_prices(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        rows: &[PriceRow],
    ) -> Result<(), DataError> {
        if rows.is_empty() {
            return Err(DataError::CacheError("no price rows to cache".into()));
        }
        let key = Self::range_key(start, end);
        let df = prices_to_dataframe(rows)?;
        self.write_segment(DAILY_DATASET, &key, Some((start, end)), rows.len(), &df, rows)
    }

    /// Load price rows for `[start, end]` from a covering segment.
    pub fn load_prices(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRow>, DataError> {
        let segment = self
            .covering_segment(DAILY_DATASET, start, end)
            .ok_or(DataError::CoverageGap {
                dataset: DAILY_DATASET.to_string(),
                start,
                end,
            })?;
        let path = self.segment_path(DAILY_DATASET, &segment.key);
        let df = self.read_segment(DAILY_DATASET, &path)?;
        let rows = dataframe_to_prices(&df)?;
        Ok(rows
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect())
    }

    /// Write the membership table for a classification level.
    pub fn write_membership(&self, level: u8, rows: &[MembershipRow]) -> Result<(), DataError> {
        if rows.is_empty() {
            return Err(DataError::CacheError("no membership rows to cache".into()));
        }
        let dataset = industry_dataset(level);
        let df = membership_to_dataframe(rows)?;
        self.write_segment(&dataset, "current", None, rows.len(), &df, rows)
    }

    /// True when a membership table is cached for the level.
    pub fn has_membership(&self, level: u8) -> bool {
        self.get_meta(&industry_dataset(level))
            .map(|m| m.segments.iter().any(|s| s.key == "current"))
            .unwrap_or(false)
    }

    /// Load the cached membership table for a classification level.
    pub fn load_membership(&self, level: u8) -> Result<Vec<MembershipRow>, DataError> {
        let dataset = industry_dataset(level);
        if !self.has_membership(level) {
            return Err(DataError::NoCachedData { dataset });
        }
        let path = self.segment_path(&dataset, "current");
        let df = self.read_segment(&dataset, &path)?;
        dataframe_to_membership(&df)
    }

    // ── Segment plumbing ────────────────────────────────────────────

    fn write_segment<T: Serialize>(
        &self,
        dataset: &str,
        key: &str,
        range: Option<(NaiveDate, NaiveDate)>,
        rows: usize,
        df: &DataFrame,
        raw: &[T],
    ) -> Result<(), DataError> {
        let dir = self.dataset_dir(dataset);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let path = self.segment_path(dataset, key);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let segment = SegmentMeta {
            key: key.to_string(),
            start: range.map(|(a, _)| a),
            end: range.map(|(_, b)| b),
            rows,
            data_hash: blake3::hash(
                &serde_json::to_vec(raw)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };

        let mut meta = self.get_meta(dataset).unwrap_or(DatasetMeta {
            dataset: dataset.to_string(),
            segments: Vec::new(),
        });
        meta.segments.retain(|s| s.key != key);
        meta.segments.push(segment);

        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(dataset), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        Ok(())
    }

    /// Read a segment; quarantine it and report missing data when corrupt.
    fn read_segment(&self, dataset: &str, path: &Path) -> Result<DataFrame, DataError> {
        match load_and_validate_parquet(path) {
            Ok(df) => Ok(df),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                eprintln!(
                    "WARNING: quarantining corrupt cache file {}: {e}",
                    path.display()
                );
                let _ = fs::rename(path, &quarantine);
                Err(DataError::NoCachedData {
                    dataset: dataset.to_string(),
                })
            }
        }
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

const EPOCH: fn() -> NaiveDate = || NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();

fn date_to_days(date: NaiveDate) -> i32 {
    (date - EPOCH()).num_days() as i32
}

fn days_to_date(days: i32) -> NaiveDate {
    EPOCH() + chrono::Duration::days(days as i64)
}

fn prices_to_dataframe(rows: &[PriceRow]) -> Result<DataFrame, DataError> {
    let symbols: Vec<String> = rows.iter().map(|r| r.symbol.clone()).collect();
    let dates: Vec<i32> = rows.iter().map(|r| date_to_days(r.date)).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
    let factors: Vec<f64> = rows.iter().map(|r| r.adj_factor).collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("close".into(), closes),
        Column::new("adj_factor".into(), factors),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn dataframe_to_prices(df: &DataFrame) -> Result<Vec<PriceRow>, DataError> {
    let col_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));
    let type_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let symbol_ca = df
        .column("symbol")
        .map_err(col_err)?
        .str()
        .map_err(|e| type_err("symbol", e))?;
    let date_ca = df
        .column("date")
        .map_err(col_err)?
        .date()
        .map_err(|e| type_err("date", e))?;
    let close_ca = df
        .column("close")
        .map_err(col_err)?
        .f64()
        .map_err(|e| type_err("close", e))?;
    let factor_ca = df
        .column("adj_factor")
        .map_err(col_err)?
        .f64()
        .map_err(|e| type_err("adj_factor", e))?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let symbol = symbol_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null symbol at row {i}")))?;
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        rows.push(PriceRow {
            symbol: symbol.to_string(),
            date: days_to_date(days),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            adj_factor: factor_ca.get(i).unwrap_or(1.0),
        });
    }
    Ok(rows)
}

fn membership_to_dataframe(rows: &[MembershipRow]) -> Result<DataFrame, DataError> {
    let symbols: Vec<String> = rows.iter().map(|r| r.symbol.clone()).collect();
    let ids: Vec<String> = rows.iter().map(|r| r.industry_id.clone()).collect();
    let names: Vec<String> = rows.iter().map(|r| r.industry_name.clone()).collect();
    let from: Vec<Option<i32>> = rows
        .iter()
        .map(|r| r.valid_from.map(date_to_days))
        .collect();
    let to: Vec<Option<i32>> = rows.iter().map(|r| r.valid_to.map(date_to_days)).collect();
    let active: Vec<bool> = rows.iter().map(|r| r.active).collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("industry_id".into(), ids),
        Column::new("industry_name".into(), names),
        Column::new("valid_from".into(), from)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("valid_from cast: {e}")))?,
        Column::new("valid_to".into(), to)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("valid_to cast: {e}")))?,
        Column::new("active".into(), active),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn dataframe_to_membership(df: &DataFrame) -> Result<Vec<MembershipRow>, DataError> {
    let col_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));
    let type_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let symbol_ca = df
        .column("symbol")
        .map_err(col_err)?
        .str()
        .map_err(|e| type_err("symbol", e))?;
    let id_ca = df
        .column("industry_id")
        .map_err(col_err)?
        .str()
        .map_err(|e| type_err("industry_id", e))?;
    let name_ca = df
        .column("industry_name")
        .map_err(col_err)?
        .str()
        .map_err(|e| type_err("industry_name", e))?;
    let from_ca = df
        .column("valid_from")
        .map_err(col_err)?
        .date()
        .map_err(|e| type_err("valid_from", e))?;
    let to_ca = df
        .column("valid_to")
        .map_err(col_err)?
        .date()
        .map_err(|e| type_err("valid_to", e))?;
    let active_ca = df
        .column("active")
        .map_err(col_err)?
        .bool()
        .map_err(|e| type_err("active", e))?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let field = |name: &str, value: Option<&str>| {
            value
                .map(str::to_string)
                .ok_or_else(|| DataError::ParquetError(format!("null {name} at row {i}")))
        };
        rows.push(MembershipRow {
            symbol: field("symbol", symbol_ca.get(i))?,
            industry_id: field("industry_id", id_ca.get(i))?,
            industry_name: field("industry_name", name_ca.get(i))?,
            valid_from: from_ca.get(i).map(days_to_date),
            valid_to: to_ca.get(i).map(days_to_date),
            active: active_ca.get(i).unwrap_or(false),
        });
    }
    Ok(rows)
}

/// Write a DataFrame to a Parquet file.
fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load a Parquet file and validate its integrity.
fn load_and_validate_parquet(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;
    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    Ok(df)
}
