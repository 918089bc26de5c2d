//! End-to-end ingestion against in-memory provider fixtures.

use chrono::{Datelike, NaiveDate, Weekday};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use weeklab_core::data::{
    BarCache, ContractQuery, DataError, HistoryStore, InMemoryProvider, MarketDataProvider,
};
use weeklab_core::domain::{OptionContract, PricePoint, StockSplit, TickerDetails};
use weeklab_core::error::{DataOrderError, PipelineError};
use weeklab_core::ingest::{IngestPolicy, Ingestor};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("weeklab_ingest_test_{}_{id}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn point(date: NaiveDate, close: f64) -> PricePoint {
    PricePoint {
        date,
        open: close,
        high: close,
        low: close,
        close,
    }
}

fn series(points: &[(&str, f64)]) -> Vec<PricePoint> {
    points.iter().map(|(date, close)| point(d(date), *close)).collect()
}

/// Weekdays of January 2024 minus the two market holidays.
fn trading_days() -> Vec<NaiveDate> {
    let holidays = [d("2024-01-01"), d("2024-01-15")];
    d("2024-01-01")
        .iter_days()
        .take_while(|day| *day <= d("2024-01-31"))
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|day| !holidays.contains(day))
        .collect()
}

/// Daily XYZ bars closing at 99 except on the given dates.
fn stock_bars(overrides: &[(&str, f64)]) -> Vec<PricePoint> {
    trading_days()
        .into_iter()
        .map(|day| {
            let close = overrides
                .iter()
                .find(|(date, _)| d(date) == day)
                .map_or(99.0, |(_, close)| *close);
            point(day, close)
        })
        .collect()
}

fn call(strike: f64, expiration: &str) -> OptionContract {
    let exp = d(expiration);
    OptionContract {
        ticker: format!("O:XYZ{}C{:08}", exp.format("%y%m%d"), (strike * 1000.0) as u64),
        strike_price: strike,
        expiration_date: exp,
    }
}

fn with_call(
    provider: InMemoryProvider,
    strike: f64,
    expiration: &str,
    bars: Vec<PricePoint>,
) -> InMemoryProvider {
    let contract = call(strike, expiration);
    provider
        .with_aggs(&contract.ticker, bars)
        .with_contract("XYZ", contract)
}

/// Anchors: Jan 5 (100), Jan 12 (104), Jan 19 (101), Jan 26 (102).
///
/// - week of Jan 12: strikes 102, 105, 110 valid; 98 in the money; 107
///   listed five days late; 108 listed two days late
/// - week of Jan 19: nothing listed
/// - week of Jan 26: strikes 101.5, 103
fn fixture() -> InMemoryProvider {
    let provider = InMemoryProvider::new()
        .with_details(TickerDetails {
            ticker: "XYZ".into(),
            name: "XYZ Corp".into(),
            locale: "us".into(),
            market: "stocks".into(),
            kind: "CS".into(),
            currency: Some("usd".into()),
        })
        .with_aggs(
            "XYZ",
            stock_bars(&[
                ("2024-01-05", 100.0),
                ("2024-01-12", 104.0),
                ("2024-01-19", 101.0),
                ("2024-01-26", 102.0),
            ]),
        );

    let provider = with_call(provider, 98.0, "2024-01-12", series(&[("2024-01-05", 3.0), ("2024-01-12", 6.0)]));
    let provider = with_call(provider, 102.0, "2024-01-12", series(&[("2024-01-05", 1.2), ("2024-01-09", 1.0), ("2024-01-12", 2.0)]));
    let provider = with_call(provider, 105.0, "2024-01-12", series(&[("2024-01-05", 0.5), ("2024-01-12", 0.01)]));
    let provider = with_call(provider, 107.0, "2024-01-12", series(&[("2024-01-10", 0.2), ("2024-01-12", 0.01)]));
    let provider = with_call(provider, 108.0, "2024-01-12", series(&[("2024-01-07", 0.2), ("2024-01-12", 0.01)]));
    let provider = with_call(provider, 110.0, "2024-01-12", series(&[("2024-01-05", 0.1), ("2024-01-12", 0.01)]));

    let provider = with_call(provider, 101.5, "2024-01-26", series(&[("2024-01-19", 1.0), ("2024-01-26", 0.6)]));
    with_call(provider, 103.0, "2024-01-26", series(&[("2024-01-19", 0.4), ("2024-01-26", 0.02)]))
}

fn ingest(provider: &dyn MarketDataProvider) -> Result<weeklab_core::domain::History, PipelineError> {
    Ingestor::new(provider, IngestPolicy::default()).run("XYZ", d("2024-01-01"), d("2024-01-31"))
}

#[test]
fn assembles_weeks_with_surviving_contracts() {
    let provider = fixture();
    let (history, stats) = Ingestor::new(&provider, IngestPolicy::default())
        .run_with_stats("XYZ", d("2024-01-01"), d("2024-01-31"))
        .unwrap();

    let dates: Vec<NaiveDate> = history.weeks().iter().map(|w| w.date()).collect();
    assert_eq!(dates, [d("2024-01-12"), d("2024-01-26")]);
    assert_eq!(history.ticker().name, "XYZ Corp");

    let first = &history.weeks()[0];
    assert_eq!(first.prev_close(), 100.0);
    assert_eq!(first.stock().close, 104.0);
    let strikes: Vec<f64> = first.call_options().iter().map(|o| o.strike_price()).collect();
    assert_eq!(strikes, [102.0, 105.0, 108.0, 110.0]);

    assert_eq!(stats.weeks_aligned, 3);
    assert_eq!(stats.weeks_kept, 2);
    assert_eq!(stats.weeks_skipped, 1);
    assert_eq!(stats.contracts_rejected, 1);
}

#[test]
fn grace_window_uses_first_available_bar() {
    let history = ingest(&fixture()).unwrap();
    let week = &history.weeks()[0];

    let late = week.call_options().iter().find(|o| o.strike_price() == 108.0).unwrap();
    assert_eq!(late.buy_date(), d("2024-01-07"));
    assert_eq!(late.buy_price(), 0.2);

    assert!(week.call_options().iter().all(|o| o.strike_price() != 107.0));
}

#[test]
fn strikes_are_strictly_ascending_and_above_spot() {
    let history = ingest(&fixture()).unwrap();
    for week in history.weeks() {
        for pair in week.call_options().windows(2) {
            assert!(pair[0].strike_price() < pair[1].strike_price());
        }
        for o in week.call_options() {
            assert!(o.strike_price() >= week.prev_close());
            assert!(o.leverage() > 0.0);
            assert!(o.buy_date() >= week.prev().date);
            assert!(o.sell_date() <= week.date());
        }
    }
}

#[test]
fn split_inside_week_normalizes_settlement() {
    let provider = InMemoryProvider::new()
        .with_aggs(
            "XYZ",
            stock_bars(&[("2024-01-05", 198.0), ("2024-01-08", 99.0), ("2024-01-12", 100.0)])
                .into_iter()
                .filter(|b| b.date <= d("2024-01-12"))
                .collect(),
        )
        .with_split(
            "XYZ",
            StockSplit {
                execution_date: d("2024-01-08"),
                split_from: 1.0,
                split_to: 2.0,
            },
        );
    let provider = with_call(provider, 200.0, "2024-01-12", series(&[("2024-01-05", 2.0), ("2024-01-12", 0.5)]));

    let history = ingest(&provider).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.weeks()[0].stock().close, 200.0);
    assert_eq!(history.weeks()[0].prev_close(), 198.0);
    assert_eq!(history.splits().len(), 1);
}

#[test]
fn no_contracts_at_all_is_an_empty_history() {
    let provider = InMemoryProvider::new().with_aggs("XYZ", stock_bars(&[]));
    assert!(matches!(ingest(&provider), Err(PipelineError::EmptyHistory(_))));
}

#[test]
fn unknown_symbol_surfaces_provider_error() {
    let provider = InMemoryProvider::new().with_unknown_symbol("XYZ");
    assert!(matches!(
        ingest(&provider),
        Err(PipelineError::Data(DataError::SymbolNotFound { .. }))
    ));
}

/// Returns one ticker's bars newest first.
struct ScrambledProvider {
    inner: InMemoryProvider,
    scrambled: String,
}

impl MarketDataProvider for ScrambledProvider {
    fn name(&self) -> &str {
        "scrambled"
    }

    fn ticker_details(&self, symbol: &str) -> Result<TickerDetails, DataError> {
        self.inner.ticker_details(symbol)
    }

    fn list_splits(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StockSplit>, DataError> {
        self.inner.list_splits(symbol, from, to)
    }

    fn list_aggs(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let mut bars = self.inner.list_aggs(ticker, from, to)?;
        if ticker == self.scrambled {
            bars.reverse();
        }
        Ok(bars)
    }

    fn list_call_contracts(&self, query: &ContractQuery) -> Result<Vec<OptionContract>, DataError> {
        self.inner.list_call_contracts(query)
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[test]
fn out_of_order_option_series_aborts_the_run() {
    let provider = ScrambledProvider {
        inner: fixture(),
        scrambled: call(105.0, "2024-01-12").ticker,
    };
    assert!(matches!(
        ingest(&provider),
        Err(PipelineError::DataOrder(DataOrderError::NonIncreasing { .. }))
    ));
}

#[test]
fn out_of_order_stock_bars_abort_the_run() {
    let provider = ScrambledProvider {
        inner: fixture(),
        scrambled: "XYZ".into(),
    };
    assert!(matches!(ingest(&provider), Err(PipelineError::DataOrder(_))));
}

#[test]
fn unavailable_provider_stops_the_run() {
    let provider = fixture().blocked();
    assert!(matches!(
        ingest(&provider),
        Err(PipelineError::Data(DataError::CircuitBreakerTripped))
    ));
}

#[test]
fn nan_option_bar_rejects_only_that_contract() {
    let strikes = |provider: &InMemoryProvider| -> Vec<f64> {
        ingest(provider).unwrap().weeks()[0]
            .call_options()
            .iter()
            .map(|o| o.strike_price())
            .collect()
    };

    let mut bars = series(&[("2024-01-05", 0.7), ("2024-01-12", 0.01)]);
    bars[0].open = f64::NAN;
    let provider = with_call(fixture(), 106.0, "2024-01-12", bars);

    assert!(!strikes(&provider).contains(&106.0));
    assert_eq!(strikes(&provider), strikes(&fixture()));
}

#[test]
fn strike_cap_limits_requested_contracts() {
    let provider = fixture();
    let policy = IngestPolicy {
        max_strike_quantile: Some(0.5),
        ..IngestPolicy::default()
    };
    let capped = Ingestor::new(&provider, policy)
        .run("XYZ", d("2024-01-01"), d("2024-01-31"))
        .unwrap();
    let uncapped = ingest(&provider).unwrap();
    assert!(capped.all_calls().count() < uncapped.all_calls().count());
}

#[test]
fn cached_stock_bars_are_reused() {
    let dir = temp_dir();
    let provider = fixture();
    let first = Ingestor::new(&provider, IngestPolicy::default())
        .with_cache(BarCache::new(dir.join("bars")))
        .run("XYZ", d("2024-01-01"), d("2024-01-31"))
        .unwrap();

    // Same contracts, but the provider no longer serves daily stock bars.
    let mut offline = InMemoryProvider::new();
    for week in first.weeks() {
        for o in week.call_options() {
            offline = offline
                .with_contract("XYZ", o.contract().clone())
                .with_aggs(o.ticker(), o.series().to_vec());
        }
    }
    let offline = offline.with_details(first.ticker().clone());

    let second = Ingestor::new(&offline, IngestPolicy::default())
        .with_cache(BarCache::new(dir.join("bars")))
        .run("XYZ", d("2024-01-01"), d("2024-01-31"))
        .unwrap();
    assert_eq!(first, second);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn ingested_history_survives_a_snapshot() {
    let dir = temp_dir();
    let store = HistoryStore::new(&dir);
    let history = ingest(&fixture()).unwrap();

    store.save(&history).unwrap();
    assert_eq!(store.load("XYZ").unwrap(), history);
    assert_eq!(store.list().unwrap(), ["XYZ"]);

    let _ = std::fs::remove_dir_all(&dir);
}
