//! Resolving histories for the analysis commands.
//!
//! `fetch_history` runs the ingestion pipeline against a provider (through the
//! parquet bar cache when enabled) and persists the result as a snapshot.
//! `load_history` reads that snapshot back; analysis never touches the
//! network.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;
use weeklab_core::data::{BarCache, DataError, HistoryStore, MarketDataProvider};
use weeklab_core::domain::History;
use weeklab_core::error::PipelineError;
use weeklab_core::ingest::{lookback_window, IngestStats, Ingestor};

use crate::config::LabConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid window: {from} is after {to}")]
    InvalidWindow { from: NaiveDate, to: NaiveDate },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Outcome of a fetch.
#[derive(Debug)]
pub struct Fetched {
    pub history: History,
    pub stats: IngestStats,
    pub snapshot: PathBuf,
}

pub fn history_store(config: &LabConfig) -> HistoryStore {
    HistoryStore::new(&config.data.data_dir)
}

/// Ingest `symbol` over `[from, to]` and save the snapshot.
///
/// Without `from`, the window reaches back `ingest.lookback_years` from `to`.
pub fn fetch_history(
    provider: &dyn MarketDataProvider,
    config: &LabConfig,
    symbol: &str,
    from: Option<NaiveDate>,
    to: NaiveDate,
) -> Result<Fetched, LoadError> {
    let from = from.unwrap_or_else(|| lookback_window(to, config.ingest.lookback_years));
    if from > to {
        return Err(LoadError::InvalidWindow { from, to });
    }

    let mut ingestor = Ingestor::new(provider, config.ingest_policy());
    if let Some(dir) = config.bar_cache_dir() {
        ingestor = ingestor.with_cache(BarCache::new(dir));
    }

    tracing::info!(symbol, %from, %to, "fetching history");
    let (history, stats) = ingestor.run_with_stats(symbol, from, to)?;
    let snapshot = history_store(config).save(&history)?;

    Ok(Fetched {
        history,
        stats,
        snapshot,
    })
}

/// Load the stored snapshot of `symbol`.
pub fn load_history(config: &LabConfig, symbol: &str) -> Result<History, LoadError> {
    let history = history_store(config).load(symbol)?;
    tracing::debug!(summary = %history.summary(), "loaded history");
    Ok(history)
}

/// Symbols with a stored snapshot.
pub fn stored_symbols(config: &LabConfig) -> Result<Vec<String>, LoadError> {
    Ok(history_store(config).list()?)
}
