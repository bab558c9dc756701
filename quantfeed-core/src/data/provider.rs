//! Provider trait and the shared request pipeline.
//!
//! Every provider runs the same steps: the look-ahead guard fixes the
//! window, a `RawFetcher` produces one `RawTable` per distinct ticker, the
//! tables are assembled into a `DataCube`, and the `ShapeNormalizer` lays the
//! cube out to the caller's labels. Providers differ only in their fetcher.

use std::collections::{BTreeMap, HashSet};

use crate::containers::{DataCube, History};
use crate::domain::{FieldToken, Frequency, PriceField, SecurityKind, Ticker};

use super::diagnostics::{Diagnostic, DiagnosticSink};
use super::error::DataError;
use super::guard::Window;
use super::normalize::{ShapeNormalizer, SqueezeFlags};
use super::request::{HistoryRequest, PriceRequest};
use super::table::RawTable;

/// Canonical field → source column.
pub type PriceFieldMap = BTreeMap<PriceField, String>;

/// Produces one ticker's raw rows.
///
/// Implementations return the deduplicated rows inside `window`; the
/// pipeline projects fields and reports missing ones. A ticker the source
/// rejects is `DataError::SourceUnavailable`, which the pipeline turns into
/// a diagnostic. Any other error aborts the request.
pub trait RawFetcher {
    fn fetch(
        &mut self,
        ticker: &Ticker,
        fields: &[String],
        window: &Window,
        frequency: Frequency,
        sink: &dyn DiagnosticSink,
    ) -> Result<RawTable, DataError>;
}

/// Fetcher for plans with an empty window. Every ticker gets an empty table.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyWindow;

impl RawFetcher for EmptyWindow {
    fn fetch(
        &mut self,
        _ticker: &Ticker,
        _fields: &[String],
        _window: &Window,
        _frequency: Frequency,
        _sink: &dyn DiagnosticSink,
    ) -> Result<RawTable, DataError> {
        RawTable::empty()
    }
}

/// Common interface of all market-data providers.
pub trait PriceDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Frequency used when a request does not name one.
    fn frequency(&self) -> Frequency {
        Frequency::Daily
    }

    fn supported_ticker_kinds(&self) -> &[SecurityKind];

    /// Mapping used by `get_price`; `None` disables it.
    fn price_field_map(&self) -> Option<&PriceFieldMap> {
        None
    }

    /// Raw-field history for the requested tickers.
    fn get_history(&self, request: &HistoryRequest) -> Result<History, DataError>;

    /// Canonical-field history. Field labels in the result are the canonical
    /// names regardless of the source's column names.
    fn get_price(&self, request: &PriceRequest) -> Result<History, DataError> {
        let map = self
            .price_field_map()
            .ok_or_else(|| DataError::MissingPriceFieldMap {
                provider: self.name().to_string(),
            })?;

        let fields = request.fields.map(|field| {
            FieldToken::Native(
                map.get(field)
                    .cloned()
                    .unwrap_or_else(|| field.as_str().to_string()),
            )
        });
        let history = self.get_history(&HistoryRequest {
            tickers: request.tickers.clone(),
            fields,
            start: request.start,
            end: request.end,
            frequency: request.frequency,
            look_ahead_bias: request.look_ahead_bias,
        })?;

        let canonical = request
            .fields
            .to_vec()
            .into_iter()
            .map(|f| f.as_str().to_string())
            .collect();
        Ok(history.relabel_fields(canonical))
    }
}

/// Reject tickers whose kind the provider cannot serve.
pub fn check_ticker_kinds(
    provider: &str,
    supported: &[SecurityKind],
    tickers: &[Ticker],
) -> Result<(), DataError> {
    match tickers.iter().find(|t| !supported.contains(&t.kind())) {
        Some(ticker) => Err(DataError::UnsupportedInstrumentKind {
            provider: provider.to_string(),
            ticker: ticker.as_str().to_string(),
            kind: ticker.kind(),
        }),
        None => Ok(()),
    }
}

/// Labels and window of one resolved request.
#[derive(Debug, Clone)]
pub struct Plan {
    pub tickers: Vec<Ticker>,
    pub fields: Vec<String>,
    pub window: Window,
    pub frequency: Frequency,
    pub flags: SqueezeFlags,
}

/// Fetch, assemble and normalize.
pub fn run_pipeline(
    fetcher: &mut dyn RawFetcher,
    plan: &Plan,
    sink: &dyn DiagnosticSink,
) -> Result<History, DataError> {
    let tables = fetch_tables(fetcher, plan, sink)?;

    if tables.is_empty() && !plan.tickers.is_empty() {
        let tickers: Vec<&str> = plan.tickers.iter().map(Ticker::as_str).collect();
        return Err(DataError::NoDataFound {
            tickers: tickers.join(", "),
        });
    }

    let cube = DataCube::assemble(&tables, &plan.fields)?;
    Ok(ShapeNormalizer::normalize(
        &cube,
        &plan.tickers,
        &plan.fields,
        plan.flags,
    ))
}

/// One table per distinct ticker, in first-appearance order. Unavailable
/// tickers are reported and left out.
pub fn fetch_tables(
    fetcher: &mut dyn RawFetcher,
    plan: &Plan,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<(Ticker, RawTable)>, DataError> {
    let mut seen = HashSet::new();
    let mut tables = Vec::new();

    for ticker in &plan.tickers {
        if !seen.insert(ticker.clone()) {
            continue;
        }

        if plan.window.is_empty() {
            log::debug!("{ticker}: empty window, nothing to fetch");
            tables.push((ticker.clone(), RawTable::empty()?));
            continue;
        }

        let table = match fetcher.fetch(ticker, &plan.fields, &plan.window, plan.frequency, sink) {
            Ok(table) => table,
            Err(e) if e.is_per_ticker() => {
                sink.record(Diagnostic::SourceUnavailable {
                    ticker: ticker.as_str().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let (table, missing) = table.project(&plan.fields)?;
        if !missing.is_empty() && !table.is_empty() {
            sink.record(Diagnostic::MissingFields {
                ticker: ticker.as_str().to_string(),
                fields: missing,
            });
        }
        log::debug!("{ticker}: {} rows", table.height());
        tables.push((ticker.clone(), table));
    }

    Ok(tables)
}
