//! Week-by-week backtest at one fixed strike gap.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use weeklab_core::domain::History;
use weeklab_core::error::EmptyHistoryError;

/// One traded week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceRow {
    pub date: NaiveDate,
    pub close: f64,
    /// `close / prev_close - 1`.
    pub weekly_change: f64,
    /// Close relative to the first week's previous close.
    pub cumulative_stock: f64,
    pub strike: f64,
    /// Realized gap of the chosen strike: `strike / prev_close - 1`.
    pub strike_gap: f64,
    pub leverage: f64,
    pub profit: f64,
    /// Running sum of `profit`.
    pub cumulative_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceReport {
    pub symbol: String,
    /// Requested strike gap.
    pub gap: f64,
    pub rows: Vec<SliceRow>,
    pub average_profit: f64,
    pub positive_rate: f64,
}

/// Trade the strike nearest `prev_close * (1 + gap)` every week.
pub fn run_slice(history: &History, gap: f64) -> Result<SliceReport, EmptyHistoryError> {
    history.ensure_not_empty()?;
    let base = history.weeks()[0].prev_close();

    let mut cumulative_profit = 0.0;
    let mut positive = 0usize;
    let rows: Vec<SliceRow> = history
        .weeks()
        .iter()
        .map(|week| {
            let call = week.find_strike_gap(gap);
            let profit = call.profit_ratio();
            cumulative_profit += profit;
            if profit > 0.0 {
                positive += 1;
            }
            SliceRow {
                date: week.date(),
                close: week.stock().close,
                weekly_change: week.stock_return(),
                cumulative_stock: week.stock().close / base - 1.0,
                strike: call.strike_price(),
                strike_gap: call.strike_price() / week.prev_close() - 1.0,
                leverage: call.leverage(),
                profit,
                cumulative_profit,
            }
        })
        .collect();

    let weeks = rows.len() as f64;
    Ok(SliceReport {
        symbol: history.symbol().to_string(),
        gap,
        average_profit: cumulative_profit / weeks,
        positive_rate: positive as f64 / weeks,
        rows,
    })
}
