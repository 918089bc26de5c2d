//! Option contract matching: the eligible call universe of one week.

use crate::data::provider::{ContractQuery, DataError, MarketDataProvider};
use crate::domain::{OptionContract, PricePoint};

/// Calls on `symbol` listed as of `start`, expiring on `end`, struck at or
/// above the `start` close and at or below `max_strike` when given.
pub fn contract_query(
    symbol: &str,
    start: &PricePoint,
    end: &PricePoint,
    max_strike: Option<f64>,
) -> ContractQuery {
    ContractQuery {
        underlying: symbol.to_string(),
        as_of: start.date,
        expiration: Some(end.date),
        strike_gte: Some(start.close),
        strike_lte: max_strike,
    }
}

/// Fetch the week's eligible contracts, ascending by strike.
///
/// The provider's answer is re-checked against the query and reduced to one
/// contract per strike (the first listed wins). An empty result is not an
/// error; the caller skips the week.
pub fn match_contracts(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    start: &PricePoint,
    end: &PricePoint,
    max_strike: Option<f64>,
) -> Result<Vec<OptionContract>, DataError> {
    let query = contract_query(symbol, start, end, max_strike);
    let listed = provider.list_call_contracts(&query)?;
    let total = listed.len();

    let mut contracts: Vec<OptionContract> = listed
        .into_iter()
        .filter(|c| c.strike_price.is_finite() && query.admits(c))
        .collect();
    contracts.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));
    contracts.dedup_by(|later, earlier| later.strike_price == earlier.strike_price);

    if contracts.len() != total {
        tracing::debug!(
            symbol,
            week = %end.date,
            listed = total,
            kept = contracts.len(),
            "dropped ineligible or duplicate contracts"
        );
    }
    Ok(contracts)
}
