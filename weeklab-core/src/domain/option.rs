//! Call option contracts and their weekly price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::price::PricePoint;
use crate::error::{DataOrderError, IntegrityError};

/// A listed call contract as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Provider ticker, e.g. `O:SPY240112C00475000`.
    pub ticker: String,
    pub strike_price: f64,
    pub expiration_date: NaiveDate,
}

/// A contract together with its daily closes over one holding week.
///
/// Built only through [`OptionRecord::new`], which guarantees a non-empty,
/// strictly date-ordered series and a positive buy price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOptionRecord")]
pub struct OptionRecord {
    contract: OptionContract,
    series: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct RawOptionRecord {
    contract: OptionContract,
    series: Vec<PricePoint>,
}

impl TryFrom<RawOptionRecord> for OptionRecord {
    type Error = IntegrityError;

    fn try_from(raw: RawOptionRecord) -> Result<Self, Self::Error> {
        Self::new(raw.contract, raw.series)
    }
}

impl OptionRecord {
    pub fn new(contract: OptionContract, series: Vec<PricePoint>) -> Result<Self, IntegrityError> {
        let first = series.first().ok_or_else(|| IntegrityError::EmptySeries {
            ticker: contract.ticker.clone(),
        })?;

        for pair in series.windows(2) {
            if pair[0].date >= pair[1].date {
                return Err(DataOrderError::NonIncreasing {
                    series: contract.ticker.clone(),
                    previous: pair[0].date,
                    next: pair[1].date,
                }
                .into());
            }
        }

        let buy_price = first.close;
        if !(buy_price.is_finite() && buy_price > 0.0 && contract.strike_price > 0.0) {
            return Err(IntegrityError::NonPositiveLeverage {
                ticker: contract.ticker,
                buy_price,
            });
        }

        Ok(Self { contract, series })
    }

    pub fn contract(&self) -> &OptionContract {
        &self.contract
    }

    pub fn series(&self) -> &[PricePoint] {
        &self.series
    }

    pub fn ticker(&self) -> &str {
        &self.contract.ticker
    }

    pub fn strike_price(&self) -> f64 {
        self.contract.strike_price
    }

    pub fn expiration_date(&self) -> NaiveDate {
        self.contract.expiration_date
    }

    fn first(&self) -> &PricePoint {
        &self.series[0]
    }

    fn last(&self) -> &PricePoint {
        &self.series[self.series.len() - 1]
    }

    /// Date the position is opened (first traded bar).
    pub fn buy_date(&self) -> NaiveDate {
        self.first().date
    }

    /// Date the position is closed (last traded bar).
    pub fn sell_date(&self) -> NaiveDate {
        self.last().date
    }

    pub fn buy_price(&self) -> f64 {
        self.first().close
    }

    pub fn sell_price(&self) -> f64 {
        self.last().close
    }

    /// Return over the holding week: `sell / buy - 1`.
    pub fn profit_ratio(&self) -> f64 {
        self.sell_price() / self.buy_price() - 1.0
    }

    /// Amplification factor: `strike / buy`.
    pub fn leverage(&self) -> f64 {
        self.strike_price() / self.buy_price()
    }
}
