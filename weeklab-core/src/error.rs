//! Error taxonomy for ingestion and history integrity.
//!
//! Fatal conditions (`DataOrderError`, `IntegrityError`) abort a run because
//! the input itself cannot be trusted. Recoverable ones
//! (`MalformedContractError`, `EmptyWeekError`) are handled at their own
//! boundary: the contract or week is skipped and siblings continue.

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::provider::DataError;

/// Non-monotonic or out-of-window dates in a fetched series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataOrderError {
    #[error("{series}: dates out of order: {previous} followed by {next}")]
    NonIncreasing {
        series: String,
        previous: NaiveDate,
        next: NaiveDate,
    },

    #[error("{series}: first bar {first} predates window start {window_start}")]
    StartsBeforeWindow {
        series: String,
        first: NaiveDate,
        window_start: NaiveDate,
    },

    #[error("{series}: last bar {last} extends past window end {window_end}")]
    EndsAfterWindow {
        series: String,
        last: NaiveDate,
        window_end: NaiveDate,
    },
}

/// Why a single option contract was excluded from its week.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("history too short: {len} bars, need {min}")]
    TooShort { len: usize, min: usize },

    #[error("history starts on {first}, {gap_days} days after {expected}")]
    LateListing {
        first: NaiveDate,
        expected: NaiveDate,
        gap_days: i64,
    },

    #[error("bar of {date} has a NaN price")]
    VoidBar { date: NaiveDate },

    #[error("unusable buy price {price}")]
    NonPositivePrice { price: f64 },

    #[error("unusable strike {strike}")]
    NonPositiveStrike { strike: f64 },
}

/// A contract rejected by the consistency validator. Recoverable.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{ticker}: {reason}")]
pub struct MalformedContractError {
    pub ticker: String,
    pub reason: RejectReason,
}

/// A week with no surviving call options.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no call options for the week ending {date}")]
pub struct EmptyWeekError {
    pub date: NaiveDate,
}

/// Nothing left to analyze.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no usable weeks in the history of '{symbol}'")]
pub struct EmptyHistoryError {
    pub symbol: String,
}

/// A `History` or `WeekRecord` that violates the ordering invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("week dates out of order: {previous} followed by {next}")]
    WeeksOutOfOrder { previous: NaiveDate, next: NaiveDate },

    #[error("week ending {date}: previous anchor {prev} is not before it")]
    AnchorOrder { date: NaiveDate, prev: NaiveDate },

    #[error(transparent)]
    EmptyWeek(#[from] EmptyWeekError),

    #[error("week ending {date}: strike {next} does not follow {previous}")]
    StrikesOutOfOrder {
        date: NaiveDate,
        previous: f64,
        next: f64,
    },

    #[error("week ending {date}: strike {strike} below previous close {prev_close}")]
    StrikeBelowSpot {
        date: NaiveDate,
        strike: f64,
        prev_close: f64,
    },

    #[error("{ticker}: empty price series")]
    EmptySeries { ticker: String },

    #[error("{ticker}: buy price {buy_price} gives no positive leverage")]
    NonPositiveLeverage { ticker: String, buy_price: f64 },

    #[error(transparent)]
    SeriesOrder(#[from] DataOrderError),
}

/// Fatal ingestion failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    DataOrder(#[from] DataOrderError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    EmptyHistory(#[from] EmptyHistoryError),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}
