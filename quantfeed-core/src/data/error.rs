//! Structured error types for data operations.
//!
//! Per-ticker conditions (`SourceUnavailable`, missing fields) normally travel
//! through the diagnostic channel and are skipped; the remaining variants are
//! returned to the caller immediately.

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::domain::{Frequency, SecurityKind};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("source unavailable for '{ticker}': {reason}")]
    SourceUnavailable { ticker: String, reason: String },

    #[error("unsupported field '{field}'")]
    UnsupportedField { field: String },

    #[error("{provider} does not support frequency {frequency}")]
    UnsupportedFrequency {
        provider: String,
        frequency: Frequency,
    },

    #[error("{provider} does not support {kind:?} tickers ('{ticker}')")]
    UnsupportedInstrumentKind {
        provider: String,
        ticker: String,
        kind: SecurityKind,
    },

    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("no data was found for any of the requested tickers: {tickers}")]
    NoDataFound { tickers: String },

    #[error("{provider} has no price field mapping; get_price is unavailable")]
    MissingPriceFieldMap { provider: String },

    #[error("table error: {0}")]
    Table(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<PolarsError> for DataError {
    fn from(e: PolarsError) -> Self {
        DataError::Table(e.to_string())
    }
}

impl DataError {
    /// True for errors that only concern a single ticker and should not abort
    /// a multi-ticker request.
    pub fn is_per_ticker(&self) -> bool {
        matches!(self, DataError::SourceUnavailable { .. })
    }
}
