//! Brokerage-backed price provider.

use std::sync::Arc;

use super::fetcher::BrokerFetcher;
use super::session::{KlineType, QuoteConnector, SessionGuard};
use crate::containers::History;
use crate::data::capability::{self, Backend};
use crate::data::config::BrokerConfig;
use crate::data::diagnostics::{DiagnosticSink, LogSink};
use crate::data::error::DataError;
use crate::data::guard::LookAheadGuard;
use crate::data::normalize::SqueezeFlags;
use crate::data::provider::{
    check_ticker_kinds, run_pipeline, EmptyWindow, Plan, PriceDataProvider, PriceFieldMap,
};
use crate::data::request::HistoryRequest;
use crate::domain::{Frequency, PriceField, SecurityKind};
use crate::time::{Clock, MarketCalendar, RealClock, RegularSessions};

const SUPPORTED_KINDS: [SecurityKind; 2] = [SecurityKind::Stock, SecurityKind::Index];
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Historical klines from a brokerage quote gateway.
///
/// A session is opened per request and closed when the request finishes,
/// whatever the outcome.
pub struct BrokerDataProvider {
    connector: Arc<dyn QuoteConnector>,
    clock: Arc<dyn Clock>,
    guard: LookAheadGuard,
    sink: Arc<dyn DiagnosticSink>,
    frequency: Frequency,
    page_size: usize,
    field_map: PriceFieldMap,
}

impl BrokerDataProvider {
    /// Connect to the configured HTTP gateway.
    pub fn try_new(config: &BrokerConfig) -> Result<Self, DataError> {
        capability::require(Backend::Broker)?;
        let connector = gateway_connector(config)?;
        Ok(Self::with_connector(connector)
            .with_frequency(config.frequency()?)
            .with_page_size(config.page_size))
    }

    /// Like [`BrokerDataProvider::try_new`], but exits the process when the
    /// gateway backend is unavailable.
    pub fn new(config: &BrokerConfig) -> Self {
        capability::fail_fast(Self::try_new(config))
    }

    /// Provider over any connector, with a wall clock, default sessions and
    /// log diagnostics.
    pub fn with_connector(connector: Arc<dyn QuoteConnector>) -> Self {
        Self {
            connector,
            clock: Arc::new(RealClock),
            guard: LookAheadGuard::new(Arc::new(RegularSessions::default())),
            sink: Arc::new(LogSink),
            frequency: Frequency::Daily,
            page_size: DEFAULT_PAGE_SIZE,
            field_map: PriceField::ohlcv()
                .into_iter()
                .map(|f| (f, f.as_str().to_string()))
                .collect(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn MarketCalendar>) -> Self {
        self.guard = LookAheadGuard::new(calendar);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[cfg(feature = "broker")]
fn gateway_connector(config: &BrokerConfig) -> Result<Arc<dyn QuoteConnector>, DataError> {
    Ok(Arc::new(super::gateway::HttpGatewayConnector::new(config)?))
}

#[cfg(not(feature = "broker"))]
fn gateway_connector(_config: &BrokerConfig) -> Result<Arc<dyn QuoteConnector>, DataError> {
    Err(DataError::EnvironmentUnavailable(
        "built without the 'broker' feature".into(),
    ))
}

impl PriceDataProvider for BrokerDataProvider {
    fn name(&self) -> &str {
        "broker"
    }

    fn frequency(&self) -> Frequency {
        self.frequency
    }

    fn supported_ticker_kinds(&self) -> &[SecurityKind] {
        &SUPPORTED_KINDS
    }

    fn price_field_map(&self) -> Option<&PriceFieldMap> {
        Some(&self.field_map)
    }

    fn get_history(&self, request: &HistoryRequest) -> Result<History, DataError> {
        let frequency = request.frequency.unwrap_or(self.frequency);
        if KlineType::for_frequency(frequency).is_none() {
            return Err(DataError::UnsupportedFrequency {
                provider: self.name().to_string(),
                frequency,
            });
        }

        let tickers = request.tickers.to_vec();
        check_ticker_kinds(self.name(), self.supported_ticker_kinds(), &tickers)?;

        let window = self.guard.window(
            request.start,
            request.end,
            frequency,
            self.clock.now(),
            request.look_ahead_bias,
        );
        log::debug!(
            "broker window {} .. {} ({frequency}), single date: {}",
            window.start,
            window.end,
            window.single_date
        );

        let plan = Plan {
            tickers,
            fields: request.field_names(),
            window,
            frequency,
            flags: SqueezeFlags {
                single_date: window.single_date,
                single_ticker: request.tickers.is_single(),
                single_field: request.fields.is_single(),
            },
        };

        if window.is_empty() {
            log::debug!("nothing observable yet, gateway not contacted");
            return run_pipeline(&mut EmptyWindow, &plan, self.sink.as_ref());
        }

        let mut session = SessionGuard::new(self.connector.connect()?);
        let mut fetcher = BrokerFetcher::new(session.session(), self.page_size, self.name());
        run_pipeline(&mut fetcher, &plan, self.sink.as_ref())
    }
}
