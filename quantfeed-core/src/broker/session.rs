//! Quote-session interface of the brokerage gateway.
//!
//! The provider only needs two calls from the gateway: a paginated
//! historical-kline request and `close`. Anything that can answer them (the
//! HTTP gateway client, a test double) plugs in through `QuoteConnector`.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::data::error::DataError;
use crate::domain::Frequency;

/// Gateway candlestick period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineType {
    K1m,
    K5m,
    K15m,
    K30m,
    K60m,
    Day,
    Week,
    Month,
    Quarter,
}

impl KlineType {
    /// Period for a bar frequency; `None` when the gateway has no such bars.
    pub fn for_frequency(frequency: Frequency) -> Option<Self> {
        match frequency {
            Frequency::Min1 => Some(KlineType::K1m),
            Frequency::Min5 => Some(KlineType::K5m),
            Frequency::Min15 => Some(KlineType::K15m),
            Frequency::Min30 => Some(KlineType::K30m),
            Frequency::Min60 => Some(KlineType::K60m),
            Frequency::Daily => Some(KlineType::Day),
            Frequency::Weekly => Some(KlineType::Week),
            Frequency::Monthly => Some(KlineType::Month),
            Frequency::Quarterly => Some(KlineType::Quarter),
            Frequency::Min10 | Frequency::Yearly => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KlineType::K1m => "K_1M",
            KlineType::K5m => "K_5M",
            KlineType::K15m => "K_15M",
            KlineType::K30m => "K_30M",
            KlineType::K60m => "K_60M",
            KlineType::Day => "K_DAY",
            KlineType::Week => "K_WEEK",
            KlineType::Month => "K_MON",
            KlineType::Quarter => "K_QUARTER",
        }
    }
}

/// One page request. Bounds are day-granular.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineRequest {
    pub code: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub ktype: KlineType,
    pub fields: Vec<String>,
    /// Rows per page.
    pub max_count: usize,
    /// Forward-adjusted prices.
    pub adjust: bool,
    /// Continuation token from the previous page; `None` for the first page.
    pub page_req_key: Option<String>,
}

/// One candlestick. Values are keyed by gateway field name.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineRow {
    pub time: NaiveDateTime,
    pub values: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KlinePage {
    pub rows: Vec<KlineRow>,
    /// Continuation token; `None` on the last page.
    pub next_page: Option<String>,
}

/// An open gateway session.
pub trait QuoteSession: Send {
    /// Fetch one page. A rejected code is `DataError::SourceUnavailable`.
    fn request_history_kline(&mut self, request: &KlineRequest) -> Result<KlinePage, DataError>;

    fn close(&mut self);
}

/// Opens gateway sessions.
pub trait QuoteConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn QuoteSession>, DataError>;
}

/// Closes the wrapped session when dropped.
pub struct SessionGuard {
    session: Box<dyn QuoteSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn QuoteSession>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut dyn QuoteSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        log::debug!("closing quote session");
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSession(Arc<AtomicUsize>);

    impl QuoteSession for CountingSession {
        fn request_history_kline(&mut self, _: &KlineRequest) -> Result<KlinePage, DataError> {
            Err(DataError::SourceUnavailable {
                ticker: "X".into(),
                reason: "down".into(),
            })
        }

        fn close(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn failing_batch(closes: Arc<AtomicUsize>) -> Result<(), DataError> {
        let mut guard = SessionGuard::new(Box::new(CountingSession(closes)));
        let request = KlineRequest {
            code: "X".into(),
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            ktype: KlineType::Day,
            fields: vec![],
            max_count: 10,
            adjust: true,
            page_req_key: None,
        };
        guard.session().request_history_kline(&request)?;
        Ok(())
    }

    #[test]
    fn session_closed_on_early_return() {
        let closes = Arc::new(AtomicUsize::new(0));
        assert!(failing_batch(closes.clone()).is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn kline_mapping_skips_unsupported_frequencies() {
        assert_eq!(KlineType::for_frequency(Frequency::Daily), Some(KlineType::Day));
        assert_eq!(KlineType::for_frequency(Frequency::Min60).map(KlineType::as_str), Some("K_60M"));
        assert!(KlineType::for_frequency(Frequency::Min10).is_none());
        assert!(KlineType::for_frequency(Frequency::Yearly).is_none());
    }
}
