//! Read-only views of a stored history: one week in detail, per-week sell
//! prices, and leverage steps between adjacent strikes.

use chrono::NaiveDate;
use serde::Serialize;

use weeklab_core::domain::{History, OptionRecord, PricePoint};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionView {
    pub ticker: String,
    pub strike: f64,
    pub buy_price: f64,
    pub leverage: f64,
    pub sell_price: f64,
    pub profit: f64,
}

impl From<&OptionRecord> for OptionView {
    fn from(o: &OptionRecord) -> Self {
        Self {
            ticker: o.ticker().to_string(),
            strike: o.strike_price(),
            buy_price: o.buy_price(),
            leverage: o.leverage(),
            sell_price: o.sell_price(),
            profit: o.profit_ratio(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekView {
    pub prev: PricePoint,
    pub stock: PricePoint,
    pub options: Vec<OptionView>,
}

/// The week settling on `date`, or `None` when the history has no such week.
pub fn inspect_week(history: &History, date: NaiveDate) -> Option<WeekView> {
    let week = history.find_week(date)?;
    Some(WeekView {
        prev: *week.prev(),
        stock: *week.stock(),
        options: week.call_options().iter().map(OptionView::from).collect(),
    })
}

/// Sell prices of every option of one week, ascending by strike.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellPrices {
    pub date: NaiveDate,
    pub close: f64,
    pub prices: Vec<f64>,
}

pub fn sell_prices(history: &History) -> Vec<SellPrices> {
    history
        .weeks()
        .iter()
        .map(|w| SellPrices {
            date: w.date(),
            close: w.stock().close,
            prices: w.call_options().iter().map(|o| o.sell_price()).collect(),
        })
        .collect()
}

/// Leverage ratios between adjacent strikes of one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeverageSteps {
    pub date: NaiveDate,
    pub ratios: Vec<f64>,
}

pub fn leverage_steps(history: &History) -> Vec<LeverageSteps> {
    history
        .weeks()
        .iter()
        .map(|w| LeverageSteps {
            date: w.date(),
            ratios: w.leverage_ratios().collect(),
        })
        .collect()
}
