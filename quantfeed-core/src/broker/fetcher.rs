//! Per-ticker kline fetch over one open session.

use chrono::NaiveDateTime;

use super::session::{KlineRequest, KlineRow, KlineType, QuoteSession};
use crate::data::diagnostics::{Diagnostic, DiagnosticSink};
use crate::data::error::DataError;
use crate::data::guard::Window;
use crate::data::provider::RawFetcher;
use crate::data::table::RawTable;
use crate::domain::{Frequency, Ticker};

/// Follows pagination and turns the collected rows into a `RawTable`.
pub struct BrokerFetcher<'s> {
    session: &'s mut dyn QuoteSession,
    page_size: usize,
    provider: String,
}

impl<'s> BrokerFetcher<'s> {
    pub fn new(session: &'s mut dyn QuoteSession, page_size: usize, provider: &str) -> Self {
        Self {
            session,
            page_size,
            provider: provider.to_string(),
        }
    }

    /// Every page for one request, in arrival order.
    ///
    /// A failing first page is the ticker's error. A failing follow-up page
    /// is reported and the rows received so far are kept.
    fn collect_pages(
        &mut self,
        mut request: KlineRequest,
        sink: &dyn DiagnosticSink,
    ) -> Result<Vec<KlineRow>, DataError> {
        let mut rows = Vec::new();
        let mut page = 0usize;

        loop {
            match self.session.request_history_kline(&request) {
                Ok(result) => {
                    log::debug!(
                        "{} page {page}: {} rows",
                        request.code,
                        result.rows.len()
                    );
                    rows.extend(result.rows);
                    match result.next_page {
                        Some(key) => {
                            request.page_req_key = Some(key);
                            page += 1;
                        }
                        None => break,
                    }
                }
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    sink.record(Diagnostic::PageFailed {
                        ticker: request.code.clone(),
                        page,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        Ok(rows)
    }
}

impl RawFetcher for BrokerFetcher<'_> {
    fn fetch(
        &mut self,
        ticker: &Ticker,
        fields: &[String],
        window: &Window,
        frequency: Frequency,
        sink: &dyn DiagnosticSink,
    ) -> Result<RawTable, DataError> {
        let ktype =
            KlineType::for_frequency(frequency).ok_or_else(|| DataError::UnsupportedFrequency {
                provider: self.provider.clone(),
                frequency,
            })?;

        let request = KlineRequest {
            code: ticker.as_str().to_string(),
            start: window.start.date(),
            end: window.end.date(),
            ktype,
            fields: fields.to_vec(),
            max_count: self.page_size,
            adjust: true,
            page_req_key: None,
        };

        let rows = self.collect_pages(request, sink)?;
        rows_to_table(&rows, fields)?
            .dedup_first()?
            .within(window.start, window.end)
    }
}

/// One column per requested field that at least one row carries.
fn rows_to_table(rows: &[KlineRow], fields: &[String]) -> Result<RawTable, DataError> {
    let timestamps: Vec<NaiveDateTime> = rows.iter().map(|r| r.time).collect();

    let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for field in fields {
        if columns.iter().any(|(name, _)| name == field) {
            continue;
        }
        if !rows.iter().any(|r| r.values.contains_key(field)) {
            continue;
        }
        let values = rows
            .iter()
            .map(|r| r.values.get(field).copied().flatten())
            .collect();
        columns.push((field.clone(), values));
    }

    RawTable::from_columns(&timestamps, columns)
}
