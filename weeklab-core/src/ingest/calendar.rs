//! Calendar week alignment: daily bars to weekly anchors.

use chrono::{Datelike, Weekday};

use crate::domain::{PricePoint, WeeklyAnchor};
use crate::error::DataOrderError;

/// Weekday on which weekly options settle.
pub const WEEK_END: Weekday = Weekday::Fri;

/// Fail unless `points` is strictly increasing by date.
pub fn check_order(series: &str, points: &[PricePoint]) -> Result<(), DataOrderError> {
    for pair in points.windows(2) {
        if pair[0].date >= pair[1].date {
            return Err(DataOrderError::NonIncreasing {
                series: series.to_string(),
                previous: pair[0].date,
                next: pair[1].date,
            });
        }
    }
    Ok(())
}

/// Whether `next` falls in a later calendar week than `current`.
fn starts_new_week(current: &PricePoint, next: &PricePoint) -> bool {
    next.date.weekday().num_days_from_monday() <= current.date.weekday().num_days_from_monday()
        || (next.date - current.date).num_days() >= 7
}

/// Reduce strictly ordered daily bars of `series` to the last bar of each week.
///
/// A bar is an anchor when the following bar belongs to a later week: its
/// weekday is not later, or it lies 7 or more days ahead. The second test
/// goes beyond a plain weekday comparison, which would merge two weeks when
/// a whole week of bars is missing (Tuesday followed by the next Thursday).
/// The final bar is an anchor only if it falls on [`WEEK_END`], so an
/// unfinished trailing week is dropped. Each anchor carries a copy of the
/// one before it.
pub fn align_weeks(series: &str, bars: &[PricePoint]) -> Result<Vec<WeeklyAnchor>, DataOrderError> {
    check_order(series, bars)?;

    let mut ends: Vec<PricePoint> = bars
        .windows(2)
        .filter(|pair| starts_new_week(&pair[0], &pair[1]))
        .map(|pair| pair[0])
        .collect();
    if let Some(last) = bars.last() {
        if last.date.weekday() == WEEK_END {
            ends.push(*last);
        }
    }

    let mut anchors = Vec::with_capacity(ends.len());
    let mut prev = None;
    for bar in ends {
        anchors.push(WeeklyAnchor { bar, prev });
        prev = Some(bar);
    }
    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(date: &str, close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    fn days(dates: &[&str]) -> Vec<PricePoint> {
        dates
            .iter()
            .enumerate()
            .map(|(i, d)| bar(d, 100.0 + i as f64))
            .collect()
    }

    fn anchor_dates(anchors: &[WeeklyAnchor]) -> Vec<String> {
        anchors.iter().map(|a| a.date().to_string()).collect()
    }

    #[test]
    fn two_full_weeks() {
        let bars = days(&[
            "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05",
            "2024-01-08", "2024-01-09", "2024-01-10", "2024-01-11", "2024-01-12",
        ]);
        let anchors = align_weeks("XYZ", &bars).unwrap();
        assert_eq!(anchor_dates(&anchors), ["2024-01-05", "2024-01-12"]);
        assert!(anchors[0].prev.is_none());
        assert_eq!(anchors[1].prev, Some(anchors[0].bar));
    }

    #[test]
    fn holiday_friday_anchors_on_thursday() {
        // Good Friday 2024-03-29
        let bars = days(&["2024-03-27", "2024-03-28", "2024-04-01", "2024-04-05"]);
        let anchors = align_weeks("XYZ", &bars).unwrap();
        assert_eq!(anchor_dates(&anchors), ["2024-03-28", "2024-04-05"]);
    }

    #[test]
    fn unfinished_last_week_is_dropped() {
        let bars = days(&["2024-01-04", "2024-01-05", "2024-01-08", "2024-01-09"]);
        let anchors = align_weeks("XYZ", &bars).unwrap();
        assert_eq!(anchor_dates(&anchors), ["2024-01-05"]);
    }

    #[test]
    fn long_gap_starts_a_new_week() {
        // Tuesday then the Wednesday eight days later
        let bars = days(&["2024-01-02", "2024-01-10", "2024-01-12"]);
        let anchors = align_weeks("XYZ", &bars).unwrap();
        assert_eq!(anchor_dates(&anchors), ["2024-01-02", "2024-01-12"]);
    }

    #[test]
    fn out_of_order_bars_are_fatal() {
        let bars = days(&["2024-01-03", "2024-01-02"]);
        match align_weeks("XYZ", &bars) {
            Err(DataOrderError::NonIncreasing { series, .. }) => assert_eq!(series, "XYZ"),
            other => panic!("unexpected {other:?}"),
        }
        let dup = days(&["2024-01-03", "2024-01-03"]);
        assert!(align_weeks("XYZ", &dup).is_err());
    }

    #[test]
    fn empty_and_single_bar() {
        assert!(align_weeks("XYZ", &[]).unwrap().is_empty());
        assert_eq!(align_weeks("XYZ", &days(&["2024-01-05"])).unwrap().len(), 1);
        assert!(align_weeks("XYZ", &days(&["2024-01-04"])).unwrap().is_empty());
    }
}
