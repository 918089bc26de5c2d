//! Consistency validation of one contract's price series.
//!
//! Each series ends in one of three outcomes:
//! - `Ok(Verdict::Accept)`: the contract joins its week;
//! - `Ok(Verdict::Reject)`: the contract is skipped, the week continues;
//! - `Err(DataOrderError)`: the input cannot be trusted, ingestion aborts.

use serde::{Deserialize, Serialize};

use crate::domain::{OptionContract, OptionRecord, PricePoint};
use crate::error::{DataOrderError, IntegrityError, MalformedContractError, RejectReason};

/// Thresholds applied by [`validate_series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Series shorter than this are rejected. Values below 1 act as 1.
    pub min_series_len: usize,
    /// Calendar days a series may start after the week start.
    pub grace_days: i64,
    /// Payoff cross-check: absolute divergence allowed.
    pub payoff_abs_tolerance: f64,
    /// Payoff cross-check: relative divergence allowed.
    pub payoff_rel_tolerance: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_series_len: 2,
            grace_days: 3,
            payoff_abs_tolerance: 2.0,
            payoff_rel_tolerance: 0.20,
        }
    }
}

/// Outcome of the informational payoff cross-check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayoffCheck {
    Consistent,
    /// The option's last close is far from its intrinsic value at expiry.
    Diverged { intrinsic: f64, last_close: f64 },
}

/// Recoverable outcome of validating one contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept(OptionRecord, PayoffCheck),
    Reject(MalformedContractError),
}

/// Compare `last_close` with `max(0, end_close - strike)`.
///
/// Diverged only when both the absolute and the relative tolerance are
/// exceeded. Relative divergence against a zero intrinsic value is infinite.
pub fn payoff_check(
    strike: f64,
    end_close: f64,
    last_close: f64,
    policy: &ValidationPolicy,
) -> PayoffCheck {
    let intrinsic = (end_close - strike).max(0.0);
    let diff = (intrinsic - last_close).abs();
    let relative = if intrinsic == 0.0 {
        if diff == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        diff / intrinsic
    };

    if diff > policy.payoff_abs_tolerance && relative > policy.payoff_rel_tolerance {
        PayoffCheck::Diverged {
            intrinsic,
            last_close,
        }
    } else {
        PayoffCheck::Consistent
    }
}

fn reject(contract: &OptionContract, reason: RejectReason) -> Verdict {
    Verdict::Reject(MalformedContractError {
        ticker: contract.ticker.clone(),
        reason,
    })
}

/// Validate `series` for `contract` against the week `[start, end]`.
///
/// `end` is the split-normalized settlement anchor. Checks run in a fixed
/// order so the first failing rule decides the outcome.
pub fn validate_series(
    contract: &OptionContract,
    series: Vec<PricePoint>,
    start: &PricePoint,
    end: &PricePoint,
    policy: &ValidationPolicy,
) -> Result<Verdict, DataOrderError> {
    let min = policy.min_series_len.max(1);
    if series.len() < min {
        return Ok(reject(
            contract,
            RejectReason::TooShort {
                len: series.len(),
                min,
            },
        ));
    }

    for pair in series.windows(2) {
        if pair[0].date >= pair[1].date {
            return Err(DataOrderError::NonIncreasing {
                series: contract.ticker.clone(),
                previous: pair[0].date,
                next: pair[1].date,
            });
        }
    }

    if let Some(void) = series.iter().find(|p| p.is_void()) {
        return Ok(reject(contract, RejectReason::VoidBar { date: void.date }));
    }

    let first = series[0];
    let last = series[series.len() - 1];

    if first.date < start.date {
        return Err(DataOrderError::StartsBeforeWindow {
            series: contract.ticker.clone(),
            first: first.date,
            window_start: start.date,
        });
    }

    let gap_days = (first.date - start.date).num_days();
    if gap_days > policy.grace_days {
        return Ok(reject(
            contract,
            RejectReason::LateListing {
                first: first.date,
                expected: start.date,
                gap_days,
            },
        ));
    }

    if last.date > end.date {
        return Err(DataOrderError::EndsAfterWindow {
            series: contract.ticker.clone(),
            last: last.date,
            window_end: end.date,
        });
    }

    if !(first.close.is_finite() && first.close > 0.0) {
        return Ok(reject(
            contract,
            RejectReason::NonPositivePrice { price: first.close },
        ));
    }
    if !(contract.strike_price.is_finite() && contract.strike_price > 0.0) {
        return Ok(reject(
            contract,
            RejectReason::NonPositiveStrike {
                strike: contract.strike_price,
            },
        ));
    }

    let check = payoff_check(contract.strike_price, end.close, last.close, policy);

    match OptionRecord::new(contract.clone(), series) {
        Ok(record) => Ok(Verdict::Accept(record, check)),
        Err(IntegrityError::SeriesOrder(e)) => Err(e),
        Err(_) => Ok(reject(
            contract,
            RejectReason::NonPositivePrice { price: first.close },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn point(date: &str, close: f64) -> PricePoint {
        PricePoint {
            date: d(date),
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    fn contract(strike: f64) -> OptionContract {
        OptionContract {
            ticker: "O:XYZ240112C00105000".into(),
            strike_price: strike,
            expiration_date: d("2024-01-12"),
        }
    }

    fn week() -> (PricePoint, PricePoint) {
        (point("2024-01-05", 100.0), point("2024-01-12", 104.0))
    }

    fn reason(v: Verdict) -> RejectReason {
        match v {
            Verdict::Reject(e) => e.reason,
            Verdict::Accept(..) => panic!("expected reject"),
        }
    }

    #[test]
    fn accepts_full_week() {
        let (start, end) = week();
        let series = vec![point("2024-01-05", 1.5), point("2024-01-12", 0.0)];
        let v = validate_series(&contract(105.0), series, &start, &end, &ValidationPolicy::default())
            .unwrap();
        match v {
            Verdict::Accept(record, check) => {
                assert_eq!(record.buy_price(), 1.5);
                assert_eq!(check, PayoffCheck::Consistent);
            }
            Verdict::Reject(e) => panic!("rejected: {e}"),
        }
    }

    #[test]
    fn two_days_late_is_accepted_five_is_rejected() {
        let (start, end) = week();
        let policy = ValidationPolicy::default();

        let late2 = vec![point("2024-01-07", 2.0), point("2024-01-12", 0.5)];
        match validate_series(&contract(105.0), late2, &start, &end, &policy).unwrap() {
            Verdict::Accept(record, _) => assert_eq!(record.buy_date(), d("2024-01-07")),
            Verdict::Reject(e) => panic!("rejected: {e}"),
        }

        let late5 = vec![point("2024-01-10", 2.0), point("2024-01-12", 0.5)];
        let v = validate_series(&contract(105.0), late5, &start, &end, &policy).unwrap();
        assert_eq!(
            reason(v),
            RejectReason::LateListing {
                first: d("2024-01-10"),
                expected: d("2024-01-05"),
                gap_days: 5,
            }
        );
    }

    #[test]
    fn short_series_is_rejected() {
        let (start, end) = week();
        let v = validate_series(
            &contract(105.0),
            vec![point("2024-01-05", 1.0)],
            &start,
            &end,
            &ValidationPolicy::default(),
        )
        .unwrap();
        assert_eq!(reason(v), RejectReason::TooShort { len: 1, min: 2 });

        let lenient = ValidationPolicy {
            min_series_len: 0,
            ..ValidationPolicy::default()
        };
        let v = validate_series(&contract(105.0), vec![], &start, &end, &lenient).unwrap();
        assert_eq!(reason(v), RejectReason::TooShort { len: 0, min: 1 });
    }

    #[test]
    fn ordering_violations_are_fatal() {
        let (start, end) = week();
        let policy = ValidationPolicy::default();

        let backwards = vec![point("2024-01-09", 1.0), point("2024-01-08", 1.0)];
        assert!(matches!(
            validate_series(&contract(105.0), backwards, &start, &end, &policy),
            Err(DataOrderError::NonIncreasing { .. })
        ));

        let early = vec![point("2024-01-04", 1.0), point("2024-01-08", 1.0)];
        assert!(matches!(
            validate_series(&contract(105.0), early, &start, &end, &policy),
            Err(DataOrderError::StartsBeforeWindow { .. })
        ));

        let past = vec![point("2024-01-05", 1.0), point("2024-01-15", 1.0)];
        assert!(matches!(
            validate_series(&contract(105.0), past, &start, &end, &policy),
            Err(DataOrderError::EndsAfterWindow { .. })
        ));
    }

    #[test]
    fn nan_bar_is_rejected() {
        let (start, end) = week();
        let mut series = vec![point("2024-01-05", 1.0), point("2024-01-09", 1.0), point("2024-01-12", 0.5)];
        series[1].high = f64::NAN;
        let v = validate_series(&contract(105.0), series, &start, &end, &ValidationPolicy::default())
            .unwrap();
        assert_eq!(reason(v), RejectReason::VoidBar { date: d("2024-01-09") });
    }

    #[test]
    fn worthless_buy_price_is_rejected() {
        let (start, end) = week();
        let series = vec![point("2024-01-05", 0.0), point("2024-01-12", 0.0)];
        let v = validate_series(&contract(105.0), series, &start, &end, &ValidationPolicy::default())
            .unwrap();
        assert_eq!(reason(v), RejectReason::NonPositivePrice { price: 0.0 });
    }

    #[test]
    fn payoff_divergence_needs_both_tolerances() {
        let policy = ValidationPolicy::default();
        // intrinsic 20, off by 3 (15%): within relative tolerance
        assert_eq!(payoff_check(100.0, 120.0, 17.0, &policy), PayoffCheck::Consistent);
        // intrinsic 5, off by 3 (60%)
        assert!(matches!(
            payoff_check(100.0, 105.0, 8.0, &policy),
            PayoffCheck::Diverged { .. }
        ));
        // intrinsic 0, off by 1: within absolute tolerance
        assert_eq!(payoff_check(110.0, 104.0, 1.0, &policy), PayoffCheck::Consistent);
        // intrinsic 0, off by 2.5
        assert!(matches!(
            payoff_check(110.0, 104.0, 2.5, &policy),
            PayoffCheck::Diverged { .. }
        ));
    }

    #[test]
    fn divergence_never_rejects() {
        let (start, end) = week();
        let series = vec![point("2024-01-05", 1.0), point("2024-01-12", 9.0)];
        let v = validate_series(&contract(105.0), series, &start, &end, &ValidationPolicy::default())
            .unwrap();
        assert!(matches!(v, Verdict::Accept(_, PayoffCheck::Diverged { .. })));
    }
}
