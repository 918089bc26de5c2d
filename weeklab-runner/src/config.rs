//! Lab configuration loaded from TOML.
//!
//! ```toml
//! [data]
//! data_dir = "data"
//! bar_cache = true
//!
//! [ingest]
//! lookback_years = 2
//! request_delay_ms = 12000
//! grace_days = 3
//! min_series_len = 2
//! payoff_abs_tolerance = 2.0
//! payoff_rel_tolerance = 0.2
//! # max_strike_quantile = 0.9
//!
//! [sweep]
//! return_quantile = 0.9
//! leverage_quantile = 0.9
//! parallel = true
//! ```
//!
//! Every key is optional; missing keys take the defaults above (with
//! `request_delay_ms = 0`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use weeklab_core::ingest::{IngestPolicy, ValidationPolicy};

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Root for `history/` snapshots and the `bars/` cache.
    pub data_dir: PathBuf,
    /// Cache daily stock bars as parquet.
    pub bar_cache: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bar_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Window length when `fetch` is given no start date.
    pub lookback_years: u32,
    /// Minimum delay between provider requests.
    pub request_delay_ms: u64,
    pub grace_days: i64,
    pub min_series_len: usize,
    pub payoff_abs_tolerance: f64,
    pub payoff_rel_tolerance: f64,
    /// Cap contract requests at this quantile of weekly stock returns.
    pub max_strike_quantile: Option<f64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let validation = ValidationPolicy::default();
        Self {
            lookback_years: 2,
            request_delay_ms: 0,
            grace_days: validation.grace_days,
            min_series_len: validation.min_series_len,
            payoff_abs_tolerance: validation.payoff_abs_tolerance,
            payoff_rel_tolerance: validation.payoff_rel_tolerance,
            max_strike_quantile: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Upper bound of the strike-gap sweep, as a quantile of weekly returns.
    pub return_quantile: f64,
    /// Upper bound of the leverage sweep, as a quantile of all leverages.
    pub leverage_quantile: f64,
    /// Evaluate scan points on the rayon pool.
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            return_quantile: 0.9,
            leverage_quantile: 0.9,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabConfig {
    pub data: DataConfig,
    pub ingest: IngestConfig,
    pub sweep: SweepConfig,
}

impl LabConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let open_unit = |name: &str, q: f64| {
            if q > 0.0 && q < 1.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be in (0, 1), got {q}")))
            }
        };
        open_unit("sweep.return_quantile", self.sweep.return_quantile)?;
        open_unit("sweep.leverage_quantile", self.sweep.leverage_quantile)?;
        if let Some(q) = self.ingest.max_strike_quantile {
            open_unit("ingest.max_strike_quantile", q)?;
        }

        let ingest = &self.ingest;
        if ingest.lookback_years == 0 {
            return Err(ConfigError::Invalid("ingest.lookback_years must be at least 1".into()));
        }
        if ingest.min_series_len == 0 {
            return Err(ConfigError::Invalid("ingest.min_series_len must be at least 1".into()));
        }
        if ingest.grace_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "ingest.grace_days must not be negative, got {}",
                ingest.grace_days
            )));
        }
        for (name, tol) in [
            ("ingest.payoff_abs_tolerance", ingest.payoff_abs_tolerance),
            ("ingest.payoff_rel_tolerance", ingest.payoff_rel_tolerance),
        ] {
            if !(tol.is_finite() && tol >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {tol}"
                )));
            }
        }
        Ok(())
    }

    pub fn ingest_policy(&self) -> IngestPolicy {
        IngestPolicy {
            validation: ValidationPolicy {
                min_series_len: self.ingest.min_series_len,
                grace_days: self.ingest.grace_days,
                payoff_abs_tolerance: self.ingest.payoff_abs_tolerance,
                payoff_rel_tolerance: self.ingest.payoff_rel_tolerance,
            },
            max_strike_quantile: self.ingest.max_strike_quantile,
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.ingest.request_delay_ms)
    }

    /// Parquet bar cache directory, if caching is enabled.
    pub fn bar_cache_dir(&self) -> Option<PathBuf> {
        self.data.bar_cache.then(|| self.data.data_dir.join("bars"))
    }
}
