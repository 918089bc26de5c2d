//! PricePoint: the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLC bar for a stock or an option contract.
///
/// Prices are unadjusted as delivered by the provider; split normalization
/// produces new points instead of mutating fetched ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PricePoint {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
    }

    /// Same date, every OHLC field multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            date: self.date,
            open: self.open * factor,
            high: self.high * factor,
            low: self.low * factor,
            close: self.close * factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point() -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
        }
    }

    #[test]
    fn point_is_sane() {
        assert!(sample_point().is_sane());
    }

    #[test]
    fn point_detects_void() {
        let mut p = sample_point();
        p.close = f64::NAN;
        assert!(p.is_void());
        assert!(!p.is_sane());
    }

    #[test]
    fn point_detects_insane_high_low() {
        let mut p = sample_point();
        p.high = 97.0; // below low
        assert!(!p.is_sane());
    }

    #[test]
    fn scaled_keeps_date() {
        let p = sample_point().scaled(2.0);
        assert_eq!(p.date, sample_point().date);
        assert_eq!(p.open, 200.0);
        assert_eq!(p.high, 210.0);
        assert_eq!(p.low, 196.0);
        assert_eq!(p.close, 206.0);
    }

    #[test]
    fn point_serialization_roundtrip() {
        let p = sample_point();
        let json = serde_json::to_string(&p).unwrap();
        let back: PricePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
