//! In-memory provider for tests and offline replay.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::provider::{ContractQuery, DataError, MarketDataProvider};
use crate::domain::{OptionContract, PricePoint, StockSplit, TickerDetails};

/// A provider backed by fixed tables.
///
/// Bars are stored per ticker and filtered to the requested range; contracts
/// are filtered through [`ContractQuery::admits`] and returned by ascending
/// strike. Symbols without details get [`TickerDetails::bare`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    details: HashMap<String, TickerDetails>,
    splits: HashMap<String, Vec<StockSplit>>,
    aggs: HashMap<String, Vec<PricePoint>>,
    contracts: HashMap<String, Vec<OptionContract>>,
    unknown: Vec<String>,
    blocked: bool,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_details(mut self, details: TickerDetails) -> Self {
        self.details.insert(details.ticker.clone(), details);
        self
    }

    pub fn with_split(mut self, symbol: &str, split: StockSplit) -> Self {
        self.splits.entry(symbol.to_string()).or_default().push(split);
        self
    }

    /// Daily bars for a stock or option ticker, in any order.
    pub fn with_aggs(mut self, ticker: &str, bars: Vec<PricePoint>) -> Self {
        self.aggs.entry(ticker.to_string()).or_default().extend(bars);
        self
    }

    /// A call contract listed on `underlying`.
    pub fn with_contract(mut self, underlying: &str, contract: OptionContract) -> Self {
        self.contracts
            .entry(underlying.to_string())
            .or_default()
            .push(contract);
        self
    }

    /// Make `ticker_details` fail for `symbol`.
    pub fn with_unknown_symbol(mut self, symbol: &str) -> Self {
        self.unknown.push(symbol.to_string());
        self
    }

    /// Report the provider as unavailable, as a tripped breaker would.
    pub fn blocked(mut self) -> Self {
        self.blocked = true;
        self
    }
}

impl MarketDataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn ticker_details(&self, symbol: &str) -> Result<TickerDetails, DataError> {
        if self.unknown.iter().any(|s| s == symbol) {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(self
            .details
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| TickerDetails::bare(symbol)))
    }

    fn list_splits(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StockSplit>, DataError> {
        let mut splits: Vec<StockSplit> = self
            .splits
            .get(symbol)
            .map(|s| {
                s.iter()
                    .filter(|x| x.execution_date >= from && x.execution_date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        splits.sort_by_key(|s| s.execution_date);
        Ok(splits)
    }

    fn list_aggs(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let mut bars: Vec<PricePoint> = self
            .aggs
            .get(ticker)
            .map(|b| {
                b.iter()
                    .filter(|p| p.date >= from && p.date <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_call_contracts(&self, query: &ContractQuery) -> Result<Vec<OptionContract>, DataError> {
        let mut contracts: Vec<OptionContract> = self
            .contracts
            .get(&query.underlying)
            .map(|c| c.iter().filter(|x| query.admits(x)).cloned().collect())
            .unwrap_or_default();
        contracts.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));
        Ok(contracts)
    }

    fn is_available(&self) -> bool {
        !self.blocked
    }
}
