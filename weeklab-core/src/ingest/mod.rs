//! Ingestion: daily bars and contract listings to a validated [`History`].
//!
//! [`History`]: crate::domain::History

pub mod calendar;
pub mod matcher;
pub mod pipeline;
pub mod split;
pub mod validate;

pub use calendar::{align_weeks, WEEK_END};
pub use matcher::match_contracts;
pub use pipeline::{lookback_window, IngestPolicy, IngestStats, Ingestor};
pub use split::normalize_anchor;
pub use validate::{validate_series, PayoffCheck, ValidationPolicy, Verdict};
