//! Polygon.io REST data provider.
//!
//! Fetches ticker details, splits, daily aggregates and option contract
//! listings. Handles pagination via `next_url`, request pacing, retries with
//! exponential backoff and the circuit breaker.
//!
//! The API key is resolved once, when the provider is constructed.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::provider::{ContractQuery, DataError, MarketDataProvider};
use super::throttle::Throttle;
use crate::domain::{OptionContract, PricePoint, StockSplit, TickerDetails};

/// One page of a v2/v3 listing.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Option::default")]
    results: Option<Vec<T>>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    results: TickerRow,
}

#[derive(Debug, Deserialize)]
struct TickerRow {
    ticker: String,
    name: Option<String>,
    locale: Option<String>,
    market: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    currency_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SplitRow {
    execution_date: NaiveDate,
    split_from: f64,
    split_to: f64,
}

#[derive(Debug, Deserialize)]
struct AggRow {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    /// Bar start, Unix milliseconds.
    t: i64,
}

#[derive(Debug, Deserialize)]
struct ContractRow {
    ticker: String,
    strike_price: f64,
    expiration_date: NaiveDate,
}

/// Polygon.io REST provider.
pub struct PolygonProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    throttle: Arc<Throttle>,
    max_retries: u32,
    base_delay: Duration,
}

impl PolygonProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.polygon.io";

    /// Environment variable holding the API key.
    pub const API_KEY_VAR: &'static str = "POLYGON_API_KEY";

    pub fn new(api_key: impl Into<String>, throttle: Arc<Throttle>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            throttle,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Construct with the key from `POLYGON_API_KEY`.
    pub fn from_env(throttle: Arc<Throttle>) -> Result<Self, DataError> {
        let key = std::env::var(Self::API_KEY_VAR).map_err(|_| {
            DataError::AuthenticationRequired(format!("{} is not set", Self::API_KEY_VAR))
        })?;
        Self::new(key, throttle)
    }

    /// Point the provider at another host (proxies, recorded fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, DataError> {
        Url::parse_with_params(&format!("{}{path}", self.base_url), params)
            .map_err(|e| DataError::Other(format!("bad request URL for {path}: {e}")))
    }

    /// Execute a single GET with retry and circuit breaker logic.
    fn get_json<T: DeserializeOwned>(&self, url: &Url, subject: &str) -> Result<T, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.throttle.acquire() {
                tracing::warn!(
                    subject,
                    cooldown_secs = self.throttle.remaining_cooldown().as_secs(),
                    "circuit breaker open"
                );
                return Err(DataError::CircuitBreakerTripped);
            }

            tracing::trace!(path = url.path(), attempt, "polygon request");

            let resp = match self.client.get(url.clone()).bearer_auth(&self.api_key).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == StatusCode::FORBIDDEN {
                self.throttle.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                self.throttle.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                tracing::warn!(subject, retry_after, "rate limited by polygon");
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "polygon rejected the API key".into(),
                ));
            }

            if status == StatusCode::NOT_FOUND {
                self.throttle.record_success();
                return Err(DataError::SymbolNotFound {
                    symbol: subject.to_string(),
                });
            }

            if !status.is_success() {
                self.throttle.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {subject}")));
                continue;
            }

            let body: T = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {subject}: {e}"))
            })?;
            self.throttle.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    /// Follow `next_url` links until the listing is exhausted.
    fn paginate<T: DeserializeOwned>(&self, first: Url, subject: &str) -> Result<Vec<T>, DataError> {
        let mut rows = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let page: Page<T> = self.get_json(&url, subject)?;
            rows.extend(page.results.unwrap_or_default());
            next = page
                .next_url
                .map(|u| {
                    Url::parse(&u).map_err(|e| {
                        DataError::ResponseFormatChanged(format!("bad next_url for {subject}: {e}"))
                    })
                })
                .transpose()?;
        }

        Ok(rows)
    }
}

impl MarketDataProvider for PolygonProvider {
    fn name(&self) -> &str {
        "polygon"
    }

    fn ticker_details(&self, symbol: &str) -> Result<TickerDetails, DataError> {
        let url = self.url(&format!("/v3/reference/tickers/{symbol}"), &[])?;
        let resp: TickerResponse = self.get_json(&url, symbol)?;
        let row = resp.results;
        Ok(TickerDetails {
            name: row.name.unwrap_or_else(|| row.ticker.clone()),
            ticker: row.ticker,
            locale: row.locale.unwrap_or_default(),
            market: row.market.unwrap_or_default(),
            kind: row.kind.unwrap_or_default(),
            currency: row.currency_name,
        })
    }

    fn list_splits(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StockSplit>, DataError> {
        let url = self.url(
            "/v3/reference/splits",
            &[
                ("ticker", symbol.to_string()),
                ("execution_date.gte", from.to_string()),
                ("execution_date.lte", to.to_string()),
                ("sort", "execution_date".into()),
                ("order", "asc".into()),
                ("limit", "1000".into()),
            ],
        )?;
        let rows: Vec<SplitRow> = self.paginate(url, symbol)?;
        Ok(rows
            .into_iter()
            .map(|r| StockSplit {
                execution_date: r.execution_date,
                split_from: r.split_from,
                split_to: r.split_to,
            })
            .collect())
    }

    fn list_aggs(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let url = self.url(
            &format!("/v2/aggs/ticker/{ticker}/range/1/day/{from}/{to}"),
            &[
                ("adjusted", "false".into()),
                ("sort", "asc".into()),
                ("limit", "50000".into()),
            ],
        )?;
        let rows: Vec<AggRow> = match self.paginate(url, ticker) {
            Ok(rows) => rows,
            Err(DataError::SymbolNotFound { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        rows.into_iter()
            .map(|r| {
                // Daily bars start at midnight New York time, which is the same UTC date.
                let date = chrono::DateTime::from_timestamp_millis(r.t)
                    .map(|dt| dt.date_naive())
                    .ok_or_else(|| {
                        DataError::ResponseFormatChanged(format!("invalid timestamp: {}", r.t))
                    })?;
                Ok(PricePoint {
                    date,
                    open: r.o,
                    high: r.h,
                    low: r.l,
                    close: r.c,
                })
            })
            .collect()
    }

    fn list_call_contracts(&self, query: &ContractQuery) -> Result<Vec<OptionContract>, DataError> {
        let mut params = vec![
            ("underlying_ticker", query.underlying.clone()),
            ("contract_type", "call".to_string()),
            ("as_of", query.as_of.to_string()),
            ("sort", "strike_price".into()),
            ("order", "asc".into()),
            ("limit", "1000".into()),
        ];
        if let Some(expiration) = query.expiration {
            params.push(("expiration_date", expiration.to_string()));
        }
        if let Some(k) = query.strike_gte {
            params.push(("strike_price.gte", k.to_string()));
        }
        if let Some(k) = query.strike_lte {
            params.push(("strike_price.lte", k.to_string()));
        }

        let url = self.url("/v3/reference/options/contracts", &params)?;
        let rows: Vec<ContractRow> = self.paginate(url, &query.underlying)?;
        Ok(rows
            .into_iter()
            .map(|r| OptionContract {
                ticker: r.ticker,
                strike_price: r.strike_price,
                expiration_date: r.expiration_date,
            })
            .collect())
    }

    fn is_available(&self) -> bool {
        self.throttle.is_allowed()
    }
}
