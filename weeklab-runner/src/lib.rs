//! WeekLab Runner: sweeps, slice backtests, inspection, exports.
//!
//! This crate builds on `weeklab-core` to provide:
//! - TOML lab configuration
//! - History fetch (ingest + snapshot) and load
//! - Strike-gap and leverage sweeps, parallel over scan points
//! - Single-gap slice backtest
//! - Week, sell-price and leverage-step views of a history
//! - Report line formatting and CSV/JSON export

pub mod config;
pub mod export;
pub mod inspect;
pub mod loader;
pub mod report;
pub mod slice;
pub mod sweep;

pub use config::{ConfigError, LabConfig};
pub use inspect::{inspect_week, leverage_steps, sell_prices, LeverageSteps, SellPrices, WeekView};
pub use loader::{fetch_history, load_history, stored_symbols, Fetched, LoadError};
pub use slice::{run_slice, SliceReport, SliceRow};
pub use sweep::{run_sweep, ScanPolicy, ScanResult, SweepError, SweepReport, Sweeper};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn sweep_types_are_send_sync() {
        assert_send::<ScanPolicy>();
        assert_sync::<ScanPolicy>();
        assert_send::<ScanResult>();
        assert_sync::<ScanResult>();
        assert_send::<SweepReport>();
        assert_sync::<SweepReport>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<LabConfig>();
        assert_sync::<LabConfig>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<SweepError>();
        assert_sync::<SweepError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }
}
