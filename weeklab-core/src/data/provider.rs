//! Market-data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over data sources (Polygon REST,
//! in-memory fixtures) so the ingestion pipeline can be driven offline and
//! mocked in tests. A provider is constructed once at process start and
//! passed by reference into the pipeline.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{OptionContract, PricePoint, StockSplit, TickerDetails};

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and structured logs.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no stored history for '{symbol}' - run `weeklab fetch {symbol}` first")]
    NoStoredHistory { symbol: String },

    #[error("snapshot error: {0}")]
    SnapshotError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Filter for a call-contract listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractQuery {
    pub underlying: String,
    /// Contracts as they were listed on this date.
    pub as_of: NaiveDate,
    pub expiration: Option<NaiveDate>,
    /// Inclusive lower strike bound.
    pub strike_gte: Option<f64>,
    /// Inclusive upper strike bound.
    pub strike_lte: Option<f64>,
}

impl ContractQuery {
    /// Whether a contract satisfies every bound of this query.
    pub fn admits(&self, contract: &OptionContract) -> bool {
        self.expiration.map_or(true, |e| contract.expiration_date == e)
            && self.strike_gte.map_or(true, |k| contract.strike_price >= k)
            && self.strike_lte.map_or(true, |k| contract.strike_price <= k)
    }
}

/// Trait for market-data providers.
///
/// Implementations return data in the provider's own order; callers verify
/// ordering before trusting it. The cache layer sits above this trait.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Reference data for a symbol.
    fn ticker_details(&self, symbol: &str) -> Result<TickerDetails, DataError>;

    /// Splits executed in `[from, to]`, ordered by execution date.
    fn list_splits(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StockSplit>, DataError>;

    /// Unadjusted daily bars for a stock or option ticker over `[from, to]`.
    ///
    /// An unknown ticker or a ticker that never traded in the range yields
    /// an empty vector, not an error.
    fn list_aggs(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError>;

    /// Call contracts matching `query`, ordered by ascending strike.
    fn list_call_contracts(&self, query: &ContractQuery) -> Result<Vec<OptionContract>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
