//! Parquet cache for unadjusted daily bars, Hive-style partitioned.
//!
//! Layout: `{cache_dir}/symbol={TICKER}/{year}.parquet` plus a `meta.json`
//! sidecar carrying the covered range and a blake3 hash of the bars.
//!
//! Writes go to `.tmp` and are renamed into place. Files that fail to load
//! are renamed to `{file}.quarantined` and treated as missing.

use super::provider::DataError;
use crate::domain::PricePoint;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

const COLUMNS: [&str; 5] = ["date", "open", "high", "low", "close"];

/// Metadata sidecar for a cached ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarCacheMeta {
    pub ticker: String,
    /// First day of the range the bars were requested for.
    pub start_date: NaiveDate,
    /// Last day of the requested range.
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// How well the cache covers a requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// The bar cache.
#[derive(Debug, Clone)]
pub struct BarCache {
    cache_dir: PathBuf,
}

impl BarCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/symbol={TICKER}/`, with `:` in option tickers replaced.
    fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.cache_dir
            .join(format!("symbol={}", ticker.replace(':', "_")))
    }

    fn year_path(&self, ticker: &str, year: i32) -> PathBuf {
        self.ticker_dir(ticker).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, ticker: &str) -> PathBuf {
        self.ticker_dir(ticker).join("meta.json")
    }

    /// Replace the cached bars for `ticker` with `bars`, recorded as covering
    /// `[start, end]`.
    ///
    /// An empty `bars` is valid: it records that the ticker did not trade in
    /// the range.
    pub fn write(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        bars: &[PricePoint],
        source: &str,
    ) -> Result<(), DataError> {
        let dir = self.ticker_dir(ticker);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_year: BTreeMap<i32, Vec<&PricePoint>> = BTreeMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        // Partitions from an earlier, wider write would outlive the new meta.
        for path in parquet_files(&dir)? {
            let stale = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i32>().ok())
                .map_or(true, |year| !by_year.contains_key(&year));
            if stale {
                let _ = fs::remove_file(&path);
            }
        }

        for (year, year_bars) in &by_year {
            let df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(ticker, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;

            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let meta = BarCacheMeta {
            ticker: ticker.to_string(),
            start_date: start,
            end_date: end,
            bar_count: bars.len(),
            data_hash: hash_bars(bars)?,
            source: source.to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(ticker);
        let tmp_meta = meta_path.with_extension("json.tmp");
        fs::write(&tmp_meta, meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        fs::rename(&tmp_meta, &meta_path)
            .map_err(|e| DataError::CacheError(format!("meta rename: {e}")))?;

        tracing::debug!(ticker, bars = bars.len(), %start, %end, "cached bars");
        Ok(())
    }

    /// Load every cached bar for `ticker`, sorted by date.
    ///
    /// Returns `None` when nothing usable is cached: no meta, a quarantined
    /// partition, or bars that no longer match the recorded hash.
    pub fn load(&self, ticker: &str) -> Result<Option<Vec<PricePoint>>, DataError> {
        let Some(meta) = self.meta(ticker) else {
            return Ok(None);
        };

        let mut bars = Vec::with_capacity(meta.bar_count);
        for path in parquet_files(&self.ticker_dir(ticker))? {
            match load_and_validate_parquet(&path) {
                Ok(year_bars) => bars.extend(year_bars),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                    return Ok(None);
                }
            }
        }
        bars.sort_by_key(|b| b.date);

        if hash_bars(&bars)? != meta.data_hash {
            tracing::warn!(ticker, "cached bars do not match their hash, ignoring");
            return Ok(None);
        }
        Ok(Some(bars))
    }

    /// Cached bars within `[start, end]`, if the cache covers that range.
    pub fn load_range(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<PricePoint>>, DataError> {
        if self.covers_range(ticker, start, end) != Coverage::FullyCovered {
            return Ok(None);
        }
        Ok(self.load(ticker)?.map(|bars| {
            bars.into_iter()
                .filter(|b| b.date >= start && b.date <= end)
                .collect()
        }))
    }

    pub fn meta(&self, ticker: &str) -> Option<BarCacheMeta> {
        let content = fs::read_to_string(self.meta_path(ticker)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn covers_range(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Coverage {
        match self.meta(ticker) {
            None => Coverage::NotCached,
            Some(meta) if meta.start_date <= start && meta.end_date >= end => {
                Coverage::FullyCovered
            }
            Some(meta) => Coverage::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }
}

fn hash_bars(bars: &[PricePoint]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(bars)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries =
        fs::read_dir(dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?
            .path();
        if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn bars_to_dataframe(bars: &[&PricePoint]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| b.date.num_days_from_ce() - UNIX_EPOCH_FROM_CE)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<PricePoint>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for col_name in COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<PricePoint>, DataError> {
    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));
    let float_col = |name: &str| -> Result<Vec<Option<f64>>, DataError> {
        let col = df.column(name).map_err(map_err)?;
        let ca = col
            .f64()
            .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?;
        Ok(ca.into_iter().collect())
    };

    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let opens = float_col("open")?;
    let highs = float_col("high")?;
    let lows = float_col("low")?;
    let closes = float_col("close")?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let date = NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_FROM_CE)
            .ok_or_else(|| DataError::ParquetError(format!("date out of range at row {i}")))?;

        bars.push(PricePoint {
            date,
            open: opens[i].unwrap_or(f64::NAN),
            high: highs[i].unwrap_or(f64::NAN),
            low: lows[i].unwrap_or(f64::NAN),
            close: closes[i].unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}
