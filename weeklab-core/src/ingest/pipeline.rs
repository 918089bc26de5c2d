//! History assembly: the full ingestion run for one symbol.
//!
//! Pipeline: ticker details + splits → daily bars (cache or provider) →
//! weekly anchors → per week: split-normalize, match contracts, fetch and
//! validate each series → `History`.
//!
//! Rejected contracts, malformed daily bars and empty weeks are logged and
//! skipped. Ordering violations abort the run, as does a provider that
//! reports itself unavailable between weeks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar::align_weeks;
use super::matcher::match_contracts;
use super::split::normalize_anchor;
use super::validate::{validate_series, PayoffCheck, ValidationPolicy, Verdict};
use crate::data::cache::BarCache;
use crate::data::provider::{DataError, MarketDataProvider};
use crate::domain::{History, PricePoint, WeekRecord, WeeklyAnchor};
use crate::error::{EmptyHistoryError, EmptyWeekError, PipelineError};
use crate::stats;

/// Knobs of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestPolicy {
    pub validation: ValidationPolicy,
    /// Cap contract requests at `start_close × (1 + q)`, with `q` this
    /// quantile of the weekly stock returns. No cap when `None`.
    pub max_strike_quantile: Option<f64>,
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub weeks_aligned: usize,
    pub weeks_kept: usize,
    pub weeks_skipped: usize,
    pub contracts_matched: usize,
    pub contracts_accepted: usize,
    pub contracts_rejected: usize,
    pub payoff_flags: usize,
}

/// Builds a [`History`] from a market-data provider.
pub struct Ingestor<'a> {
    provider: &'a dyn MarketDataProvider,
    policy: IngestPolicy,
    cache: Option<BarCache>,
}

impl<'a> Ingestor<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, policy: IngestPolicy) -> Self {
        Self {
            provider,
            policy,
            cache: None,
        }
    }

    /// Serve and store daily stock bars through `cache`.
    pub fn with_cache(mut self, cache: BarCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn policy(&self) -> &IngestPolicy {
        &self.policy
    }

    /// Ingest `symbol` over `[from, to]`.
    pub fn run(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<History, PipelineError> {
        self.run_with_stats(symbol, from, to).map(|(history, _)| history)
    }

    /// Like [`run`](Self::run), also returning the run's counters.
    pub fn run_with_stats(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(History, IngestStats), PipelineError> {
        tracing::info!(symbol, %from, %to, provider = self.provider.name(), "ingesting");

        let ticker = self.provider.ticker_details(symbol)?;
        let splits = self.provider.list_splits(symbol, from, to)?;
        if !splits.is_empty() {
            tracing::info!(symbol, splits = splits.len(), "splits in range");
        }

        let bars = sane_bars(symbol, self.stock_bars(symbol, from, to)?);
        let anchors = align_weeks(symbol, &bars)?;

        let pairs: Vec<(PricePoint, PricePoint)> = anchors
            .iter()
            .filter_map(|a: &WeeklyAnchor| {
                a.prev
                    .map(|prev| (prev, normalize_anchor(&splits, &prev, &a.bar)))
            })
            .collect();
        let max_strike_return = self.max_strike_return(&pairs);

        let mut counters = IngestStats {
            weeks_aligned: pairs.len(),
            ..IngestStats::default()
        };
        let mut weeks = Vec::with_capacity(pairs.len());

        for (i, (start, end)) in pairs.iter().enumerate() {
            let max_strike = max_strike_return.map(|q| start.close * (1.0 + q));
            match self.build_week(symbol, start, end, max_strike, &mut counters)? {
                Some(week) => {
                    tracing::debug!(
                        symbol,
                        week = %end.date,
                        n = i + 1,
                        of = pairs.len(),
                        options = week.call_options().len(),
                        "week assembled"
                    );
                    counters.weeks_kept += 1;
                    weeks.push(week);
                }
                None => {
                    let skipped = EmptyWeekError { date: end.date };
                    tracing::info!(symbol, "skipping week: {skipped}");
                    counters.weeks_skipped += 1;
                }
            }
        }

        if weeks.is_empty() {
            return Err(EmptyHistoryError {
                symbol: symbol.to_string(),
            }
            .into());
        }

        let history = History::new(symbol, weeks, ticker, splits)?;
        log_summary(&history, &counters);
        Ok((history, counters))
    }

    fn stock_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        if let Some(cache) = &self.cache {
            if let Some(bars) = cache.load_range(symbol, from, to)? {
                tracing::debug!(symbol, bars = bars.len(), "daily bars from cache");
                return Ok(bars);
            }
        }

        let bars = self.provider.list_aggs(symbol, from, to)?;
        tracing::debug!(symbol, bars = bars.len(), "daily bars from provider");

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.write(symbol, from, to, &bars, self.provider.name()) {
                tracing::warn!(symbol, error = %e, "failed to cache daily bars");
            }
        }
        Ok(bars)
    }

    fn max_strike_return(&self, pairs: &[(PricePoint, PricePoint)]) -> Option<f64> {
        let q = self.policy.max_strike_quantile?;
        let returns: Vec<f64> = pairs
            .iter()
            .map(|(start, end)| end.close / start.close - 1.0)
            .collect();
        let cap = stats::quantile(&returns, q);
        if let Some(cap) = cap {
            tracing::info!(quantile = q, cap, "capping strikes at weekly return quantile");
        }
        cap
    }

    /// Assemble one week, or `None` when no contract survives.
    fn build_week(
        &self,
        symbol: &str,
        start: &PricePoint,
        end: &PricePoint,
        max_strike: Option<f64>,
        counters: &mut IngestStats,
    ) -> Result<Option<WeekRecord>, PipelineError> {
        if !self.provider.is_available() {
            return Err(DataError::CircuitBreakerTripped.into());
        }
        let contracts = match_contracts(self.provider, symbol, start, end, max_strike)?;
        counters.contracts_matched += contracts.len();

        let mut options = Vec::with_capacity(contracts.len());
        for contract in &contracts {
            let series = self
                .provider
                .list_aggs(&contract.ticker, start.date, end.date)?;

            match validate_series(contract, series, start, end, &self.policy.validation)? {
                Verdict::Accept(record, check) => {
                    if let PayoffCheck::Diverged {
                        intrinsic,
                        last_close,
                    } = check
                    {
                        tracing::warn!(
                            ticker = %contract.ticker,
                            intrinsic,
                            last_close,
                            "last close diverges from intrinsic value"
                        );
                        counters.payoff_flags += 1;
                    }
                    counters.contracts_accepted += 1;
                    options.push(record);
                }
                Verdict::Reject(e) => {
                    tracing::debug!(week = %end.date, "skipping contract: {e}");
                    counters.contracts_rejected += 1;
                }
            }
        }

        if options.is_empty() {
            return Ok(None);
        }
        Ok(Some(WeekRecord::new(*start, *end, options)?))
    }
}

fn log_summary(history: &History, counters: &IngestStats) {
    let summary = history.summary();
    tracing::info!(
        symbol = %summary.symbol,
        weeks = summary.weeks,
        skipped = counters.weeks_skipped,
        options = summary.options,
        rejected = counters.contracts_rejected,
        payoff_flags = counters.payoff_flags,
        min_strike_gap = summary.min_strike_gap,
        max_strike_gap = summary.max_strike_gap,
        "history assembled"
    );
    let leverages = history.leverages();
    if let Some(deciles) = stats::quantiles(&leverages, 10) {
        tracing::debug!(symbol = %summary.symbol, ?deciles, "leverage deciles");
    }
}

/// Drop daily bars failing [`PricePoint::is_sane`], keeping the rest in order.
fn sane_bars(symbol: &str, bars: Vec<PricePoint>) -> Vec<PricePoint> {
    let (kept, dropped): (Vec<_>, Vec<_>) = bars.into_iter().partition(|b| b.is_sane());
    for bar in &dropped {
        tracing::warn!(symbol, date = %bar.date, close = bar.close, "dropping malformed daily bar");
    }
    kept
}

/// Default ingestion window: `years` back from `to`.
pub fn lookback_window(to: NaiveDate, years: u32) -> NaiveDate {
    to.checked_sub_months(chrono::Months::new(12 * years))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn malformed_daily_bars_are_dropped() {
        let bar = |day, close: f64, high: f64| PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high,
            low: close,
            close,
        };
        let bars = vec![bar(2, 100.0, 101.0), bar(3, f64::NAN, 101.0), bar(4, 100.0, 90.0), bar(5, 101.0, 102.0)];
        let kept: Vec<u32> = sane_bars("XYZ", bars).iter().map(|b| b.date.day()).collect();
        assert_eq!(kept, [2, 5]);
    }

    #[test]
    fn lookback_is_calendar_years() {
        let to = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            lookback_window(to, 2),
            NaiveDate::from_ymd_opt(2022, 2, 28).unwrap()
        );
    }
}
