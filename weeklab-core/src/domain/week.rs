//! Weekly anchors and per-week option universes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::option::OptionRecord;
use super::price::PricePoint;
use crate::error::{DataOrderError, EmptyWeekError, IntegrityError};

/// The last trading bar of a calendar week.
///
/// `prev` is a copy of the preceding anchor, not a link into another
/// structure; the first anchor of a sequence has none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAnchor {
    pub bar: PricePoint,
    pub prev: Option<PricePoint>,
}

impl WeeklyAnchor {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }
}

/// One holding week: bought at `prev`, settled at `stock`.
///
/// Invariants (checked by [`WeekRecord::new`] and on deserialization):
/// - at least one call option;
/// - strikes strictly ascending, every strike at or above `prev.close`;
/// - every option series lies inside `[prev.date, stock.date]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeekRecord")]
pub struct WeekRecord {
    prev: PricePoint,
    stock: PricePoint,
    call_options: Vec<OptionRecord>,
}

#[derive(Deserialize)]
struct RawWeekRecord {
    prev: PricePoint,
    stock: PricePoint,
    call_options: Vec<OptionRecord>,
}

impl TryFrom<RawWeekRecord> for WeekRecord {
    type Error = IntegrityError;

    fn try_from(raw: RawWeekRecord) -> Result<Self, Self::Error> {
        Self::new(raw.prev, raw.stock, raw.call_options)
    }
}

impl WeekRecord {
    pub fn new(
        prev: PricePoint,
        stock: PricePoint,
        call_options: Vec<OptionRecord>,
    ) -> Result<Self, IntegrityError> {
        if call_options.is_empty() {
            return Err(EmptyWeekError { date: stock.date }.into());
        }
        if prev.date >= stock.date {
            return Err(IntegrityError::AnchorOrder {
                date: stock.date,
                prev: prev.date,
            });
        }

        for pair in call_options.windows(2) {
            if pair[0].strike_price() >= pair[1].strike_price() {
                return Err(IntegrityError::StrikesOutOfOrder {
                    date: stock.date,
                    previous: pair[0].strike_price(),
                    next: pair[1].strike_price(),
                });
            }
        }

        for option in &call_options {
            if option.strike_price() < prev.close {
                return Err(IntegrityError::StrikeBelowSpot {
                    date: stock.date,
                    strike: option.strike_price(),
                    prev_close: prev.close,
                });
            }
            if option.buy_date() < prev.date {
                return Err(DataOrderError::StartsBeforeWindow {
                    series: option.ticker().to_string(),
                    first: option.buy_date(),
                    window_start: prev.date,
                }
                .into());
            }
            if option.sell_date() > stock.date {
                return Err(DataOrderError::EndsAfterWindow {
                    series: option.ticker().to_string(),
                    last: option.sell_date(),
                    window_end: stock.date,
                }
                .into());
            }
        }

        Ok(Self {
            prev,
            stock,
            call_options,
        })
    }

    /// Settlement date of the week.
    pub fn date(&self) -> NaiveDate {
        self.stock.date
    }

    pub fn prev(&self) -> &PricePoint {
        &self.prev
    }

    /// Split-normalized closing anchor.
    pub fn stock(&self) -> &PricePoint {
        &self.stock
    }

    pub fn prev_close(&self) -> f64 {
        self.prev.close
    }

    /// Stock return over the week: `close / prev_close - 1`.
    pub fn stock_return(&self) -> f64 {
        self.stock.close / self.prev.close - 1.0
    }

    /// Non-empty, ascending by strike.
    pub fn call_options(&self) -> &[OptionRecord] {
        &self.call_options
    }

    /// Distances between adjacent strikes as a fraction of the previous close.
    pub fn strike_gaps(&self) -> impl Iterator<Item = f64> + '_ {
        self.call_options
            .windows(2)
            .map(|pair| (pair[1].strike_price() - pair[0].strike_price()) / self.prev.close)
    }

    /// Leverage of each option divided by the leverage of the next lower strike.
    pub fn leverage_ratios(&self) -> impl Iterator<Item = f64> + '_ {
        self.call_options
            .windows(2)
            .map(|pair| pair[1].leverage() / pair[0].leverage())
    }
}
