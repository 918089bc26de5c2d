//! History: the immutable per-symbol aggregate of weekly option data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::option::OptionRecord;
use super::ticker::{StockSplit, TickerDetails};
use super::week::WeekRecord;
use crate::error::{EmptyHistoryError, IntegrityError};

/// Chronological weeks for one symbol plus the reference data they were built from.
///
/// Assembled once during ingestion and only read afterwards. All analysis
/// takes `&History`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistory")]
pub struct History {
    symbol: String,
    weeks: Vec<WeekRecord>,
    ticker: TickerDetails,
    splits: Vec<StockSplit>,
}

#[derive(Deserialize)]
struct RawHistory {
    symbol: String,
    weeks: Vec<WeekRecord>,
    ticker: TickerDetails,
    splits: Vec<StockSplit>,
}

impl TryFrom<RawHistory> for History {
    type Error = IntegrityError;

    fn try_from(raw: RawHistory) -> Result<Self, Self::Error> {
        Self::new(raw.symbol, raw.weeks, raw.ticker, raw.splits)
    }
}

impl History {
    /// Build a history; week dates must be strictly increasing.
    ///
    /// Splits are kept ordered by execution date.
    pub fn new(
        symbol: impl Into<String>,
        weeks: Vec<WeekRecord>,
        ticker: TickerDetails,
        mut splits: Vec<StockSplit>,
    ) -> Result<Self, IntegrityError> {
        for pair in weeks.windows(2) {
            if pair[0].date() >= pair[1].date() {
                return Err(IntegrityError::WeeksOutOfOrder {
                    previous: pair[0].date(),
                    next: pair[1].date(),
                });
            }
        }
        splits.sort_by_key(|s| s.execution_date);

        Ok(Self {
            symbol: symbol.into(),
            weeks,
            ticker,
            splits,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn weeks(&self) -> &[WeekRecord] {
        &self.weeks
    }

    pub fn ticker(&self) -> &TickerDetails {
        &self.ticker
    }

    pub fn splits(&self) -> &[StockSplit] {
        &self.splits
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    /// Fails when there is nothing to analyze.
    pub fn ensure_not_empty(&self) -> Result<(), EmptyHistoryError> {
        if self.weeks.is_empty() {
            return Err(EmptyHistoryError {
                symbol: self.symbol.clone(),
            });
        }
        Ok(())
    }

    /// Week settling on `date`, if any.
    pub fn find_week(&self, date: NaiveDate) -> Option<&WeekRecord> {
        self.weeks
            .binary_search_by_key(&date, |w| w.date())
            .ok()
            .map(|i| &self.weeks[i])
    }

    /// Every option of every week, in chronological then strike order.
    pub fn all_calls(&self) -> impl Iterator<Item = &OptionRecord> + '_ {
        self.weeks.iter().flat_map(|w| w.call_options().iter())
    }

    /// Weekly stock returns (`close / prev_close - 1`), one per week.
    pub fn weekly_returns(&self) -> Vec<f64> {
        self.weeks.iter().map(|w| w.stock_return()).collect()
    }

    /// Leverage of every option in the history.
    pub fn leverages(&self) -> Vec<f64> {
        self.all_calls().map(|c| c.leverage()).collect()
    }

    /// Leverage ratios between adjacent strikes, across all weeks.
    pub fn leverage_ratios(&self) -> Vec<f64> {
        self.weeks.iter().flat_map(|w| w.leverage_ratios()).collect()
    }

    /// Smallest and largest adjacent-strike gap as a fraction of the previous close.
    ///
    /// `None` when no week lists more than one strike.
    pub fn strike_gap_bounds(&self) -> Option<(f64, f64)> {
        self.weeks
            .iter()
            .flat_map(|w| w.strike_gaps())
            .fold(None, |acc, gap| match acc {
                None => Some((gap, gap)),
                Some((lo, hi)) => Some((lo.min(gap), hi.max(gap))),
            })
    }

    pub fn summary(&self) -> HistorySummary {
        let (min_strike_gap, max_strike_gap) = match self.strike_gap_bounds() {
            Some((lo, hi)) => (Some(lo), Some(hi)),
            None => (None, None),
        };
        HistorySummary {
            symbol: self.symbol.clone(),
            weeks: self.weeks.len(),
            options: self.all_calls().count(),
            first_week: self.weeks.first().map(|w| w.date()),
            last_week: self.weeks.last().map(|w| w.date()),
            min_strike_gap,
            max_strike_gap,
            splits: self.splits.len(),
        }
    }
}

/// Headline numbers of a history, for logs and the CLI header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub symbol: String,
    pub weeks: usize,
    pub options: usize,
    pub first_week: Option<NaiveDate>,
    pub last_week: Option<NaiveDate>,
    pub min_strike_gap: Option<f64>,
    pub max_strike_gap: Option<f64>,
    pub splits: usize,
}

impl std::fmt::Display for HistorySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} weeks, {} options", self.symbol, self.weeks, self.options)?;
        if let (Some(first), Some(last)) = (self.first_week, self.last_week) {
            write!(f, " from {first} to {last}")?;
        }
        if let (Some(lo), Some(hi)) = (self.min_strike_gap, self.max_strike_gap) {
            write!(f, ", strike gap {:.2}%..{:.2}%", lo * 100.0, hi * 100.0)?;
        }
        if self.splits > 0 {
            write!(f, ", {} splits", self.splits)?;
        }
        Ok(())
    }
}
