//! WeekLab Core: domain types, market data, ingestion and option selection.
//!
//! This crate contains everything needed to build and query a weekly option
//! history:
//! - Domain types (price points, weekly anchors, option records, histories)
//! - Market-data provider trait with Polygon and in-memory implementations
//! - Parquet bar cache and JSON history snapshots
//! - Ingestion pipeline: week alignment, split normalization, contract
//!   matching, series validation, history assembly
//! - Nearest-strike and nearest-leverage selection
//! - Order statistics for sweep bounds

pub mod data;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod selection;
pub mod stats;

pub use error::{
    DataOrderError, EmptyHistoryError, EmptyWeekError, IntegrityError, MalformedContractError,
    PipelineError, RejectReason,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the history and provider types can cross threads.
    ///
    /// Sweeps share `&History` across rayon workers.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::PricePoint>();
        require_sync::<domain::PricePoint>();
        require_send::<domain::OptionRecord>();
        require_sync::<domain::OptionRecord>();
        require_send::<domain::WeekRecord>();
        require_sync::<domain::WeekRecord>();
        require_send::<domain::History>();
        require_sync::<domain::History>();

        // Data layer
        require_send::<data::PolygonProvider>();
        require_sync::<data::PolygonProvider>();
        require_send::<data::InMemoryProvider>();
        require_sync::<data::InMemoryProvider>();
        require_send::<data::BarCache>();
        require_sync::<data::BarCache>();
        require_send::<data::HistoryStore>();
        require_sync::<data::HistoryStore>();

        // Errors
        require_send::<PipelineError>();
        require_sync::<PipelineError>();
    }
}
