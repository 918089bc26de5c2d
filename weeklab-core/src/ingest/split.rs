//! Stock-split normalization of weekly anchors.

use chrono::NaiveDate;

use crate::domain::{PricePoint, StockSplit};

/// Combined price factor of the splits executed in `(after, until]`.
///
/// Factors compose in execution order; 1.0 when none apply.
pub fn split_factor(splits: &[StockSplit], after: NaiveDate, until: NaiveDate) -> f64 {
    let mut applicable: Vec<&StockSplit> = splits
        .iter()
        .filter(|s| s.execution_date > after && s.execution_date <= until)
        .collect();
    applicable.sort_by_key(|s| s.execution_date);
    applicable.iter().fold(1.0, |factor, s| factor * s.ratio())
}

/// `end` with its prices restated on the share basis of `start`.
///
/// `start` is the as-of date for contract selection and is never adjusted.
pub fn normalize_anchor(splits: &[StockSplit], start: &PricePoint, end: &PricePoint) -> PricePoint {
    let factor = split_factor(splits, start.date, end.date);
    if factor == 1.0 {
        return *end;
    }
    tracing::debug!(date = %end.date, factor, "split-adjusting week end");
    end.scaled(factor)
}
