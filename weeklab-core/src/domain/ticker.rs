//! Ticker metadata and corporate actions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reference data for the underlying, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    pub name: String,
    pub locale: String,
    pub market: String,
    /// Security type code, e.g. `CS` for common stock or `ETF`.
    pub kind: String,
    pub currency: Option<String>,
}

impl TickerDetails {
    /// Minimal details when the provider has nothing beyond the symbol.
    pub fn bare(symbol: &str) -> Self {
        Self {
            ticker: symbol.to_string(),
            name: symbol.to_string(),
            locale: String::new(),
            market: String::new(),
            kind: String::new(),
            currency: None,
        }
    }
}

impl std::fmt::Display for TickerDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({}, {})", self.ticker, self.name, self.locale, self.kind)
    }
}

/// A stock split: `split_from` old shares became `split_to` new shares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockSplit {
    pub execution_date: NaiveDate,
    pub split_from: f64,
    pub split_to: f64,
}

impl StockSplit {
    /// Factor that converts a post-split price back to the pre-split basis.
    pub fn ratio(&self) -> f64 {
        self.split_to / self.split_from
    }
}
