//! Structured diagnostics for recoverable, per-ticker problems.
//!
//! Providers never print. They hand a `Diagnostic` to the injected
//! `DiagnosticSink`; the default sink forwards to the `log` facade and tests
//! use `CollectingSink` to assert on what was reported.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// A recoverable condition encountered while serving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The source rejected the ticker; it was skipped.
    SourceUnavailable { ticker: String, reason: String },
    /// Some requested fields are not present for the ticker.
    MissingFields {
        ticker: String,
        fields: BTreeSet<String>,
    },
    /// A follow-up page failed; rows from earlier pages were kept.
    PageFailed {
        ticker: String,
        page: usize,
        reason: String,
    },
}

impl Diagnostic {
    pub fn ticker(&self) -> &str {
        match self {
            Diagnostic::SourceUnavailable { ticker, .. }
            | Diagnostic::MissingFields { ticker, .. }
            | Diagnostic::PageFailed { ticker, .. } => ticker,
        }
    }
}

/// Observer for diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::SourceUnavailable { ticker, reason } => {
                log::warn!("skipping {ticker}: {reason}");
            }
            Diagnostic::MissingFields { ticker, fields } => {
                log::info!("not all fields are available for {ticker}; missing: {fields:?}");
            }
            Diagnostic::PageFailed {
                ticker,
                page,
                reason,
            } => {
                log::warn!("page {page} for {ticker} failed, keeping earlier pages: {reason}");
            }
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain recorded diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&self, diagnostic: Diagnostic) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.record(Diagnostic::PageFailed {
            ticker: "SH600000".into(),
            page: 2,
            reason: "timeout".into(),
        });
        sink.record(Diagnostic::SourceUnavailable {
            ticker: "BAD".into(),
            reason: "not found".into(),
        });

        let records = sink.take();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].ticker(), "BAD");
        assert!(sink.records().is_empty());
    }

    #[test]
    fn diagnostics_serialize_with_kind_tag() {
        let d = Diagnostic::MissingFields {
            ticker: "AAPL".into(),
            fields: ["high".to_string()].into_iter().collect(),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"kind\":\"missing_fields\""));
    }
}
