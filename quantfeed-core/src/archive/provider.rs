//! Archive-backed price provider.
//!
//! Loads a snapshot (tickers × fields × date range) once at construction and
//! answers every request by slicing it.

use chrono::{NaiveDateTime, NaiveTime};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::reader::{InstrumentSpan, QlibArchive};
use crate::containers::History;
use crate::data::capability::{self, Backend};
use crate::data::config::ArchiveConfig;
use crate::data::diagnostics::{Diagnostic, DiagnosticSink, LogSink};
use crate::data::error::DataError;
use crate::data::guard::{LookAheadGuard, Window};
use crate::data::normalize::SqueezeFlags;
use crate::data::provider::{
    check_ticker_kinds, run_pipeline, EmptyWindow, Plan, PriceDataProvider, PriceFieldMap,
    RawFetcher,
};
use crate::data::request::HistoryRequest;
use crate::data::table::RawTable;
use crate::domain::{Frequency, SecurityKind, Ticker};
use crate::time::{Clock, MarketCalendar, RealClock, RegularSessions};

const SUPPORTED_KINDS: [SecurityKind; 2] = [SecurityKind::Stock, SecurityKind::Index];

pub struct ArchiveDataProvider {
    archive: QlibArchive,
    tables: HashMap<String, RawTable>,
    tickers: Vec<Ticker>,
    /// Index name → constituents loaded for it.
    members: BTreeMap<String, Vec<Ticker>>,
    fields: Vec<String>,
    field_map: Option<PriceFieldMap>,
    frequency: Frequency,
    start: NaiveDateTime,
    end: NaiveDateTime,
    clock: Arc<dyn Clock>,
    guard: LookAheadGuard,
    sink: Arc<dyn DiagnosticSink>,
}

impl ArchiveDataProvider {
    /// Resolve the archive location from `config` and the environment, then
    /// load the snapshot.
    pub fn try_new(config: &ArchiveConfig) -> Result<Self, DataError> {
        capability::require(Backend::Archive)?;
        let root = config.resolve_path()?;
        log::info!(
            "opening archive {} (region {})",
            root.display(),
            config.resolve_region()
        );
        let archive = QlibArchive::open(root)?;
        Self::from_archive(archive, config, Arc::new(LogSink))
    }

    /// Like [`ArchiveDataProvider::try_new`], but exits the process when the
    /// archive is unavailable.
    pub fn new(config: &ArchiveConfig) -> Self {
        capability::fail_fast(Self::try_new(config))
    }

    /// Load the snapshot from an already opened archive.
    pub fn from_archive(
        archive: QlibArchive,
        config: &ArchiveConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, DataError> {
        let frequency = config.frequency()?;
        let start = config.start.and_time(NaiveTime::MIN);
        let end = config
            .end
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| DataError::Config(format!("invalid end date {}", config.end)))?;

        let mut requested = Vec::new();
        let mut seen = HashSet::new();
        for ticker in config.ticker_list() {
            if seen.insert(ticker.clone()) {
                requested.push(ticker);
            }
        }
        check_ticker_kinds("archive", &SUPPORTED_KINDS, &requested)?;

        let mut seen_fields = HashSet::new();
        let mut fields: Vec<String> = config
            .fields
            .iter()
            .filter(|f| seen_fields.insert(f.as_str()))
            .cloned()
            .collect();

        let (instruments, members) = expand(&archive, &requested, start, end)?;
        let calendar = archive.calendar(frequency)?;

        let loaded: Vec<_> = instruments
            .par_iter()
            .map(|(ticker, _)| {
                archive.load_instrument(ticker.as_str(), &fields, frequency, &calendar, start, end)
            })
            .collect::<Result<_, _>>()?;

        let mut tables = HashMap::new();
        let mut tickers = Vec::new();
        for ((ticker, explicit), table) in instruments.into_iter().zip(loaded) {
            let Some((mut table, missing)) = table else {
                if explicit {
                    sink.record(Diagnostic::SourceUnavailable {
                        ticker: ticker.as_str().to_string(),
                        reason: "no feature files in the archive".into(),
                    });
                } else {
                    log::debug!("constituent {ticker} has no feature files");
                }
                continue;
            };

            if !missing.is_empty() && !table.is_empty() {
                sink.record(Diagnostic::MissingFields {
                    ticker: ticker.as_str().to_string(),
                    fields: missing.into_iter().collect(),
                });
            }
            for (column, field) in &config.field_map {
                if table.field_names().contains(column) {
                    table = table.with_alias(column, field.as_str())?;
                }
            }
            tables.insert(ticker.as_str().to_string(), table);
            tickers.push(ticker);
        }

        if tables.is_empty() {
            let names: Vec<&str> = requested.iter().map(Ticker::as_str).collect();
            return Err(DataError::NoDataFound {
                tickers: names.join(", "),
            });
        }

        for field in config.field_map.values() {
            if !fields.iter().any(|f| f == field.as_str()) {
                fields.push(field.as_str().to_string());
            }
        }
        let field_map: Option<PriceFieldMap> = (!config.field_map.is_empty()).then(|| {
            config
                .field_map
                .values()
                .map(|f| (*f, f.as_str().to_string()))
                .collect()
        });

        log::info!(
            "archive snapshot: {} tickers, {} fields, {start} .. {end} ({frequency})",
            tickers.len(),
            fields.len()
        );

        Ok(Self {
            archive,
            tables,
            tickers,
            members,
            fields,
            field_map,
            frequency,
            start,
            end,
            clock: Arc::new(RealClock),
            guard: LookAheadGuard::new(Arc::new(RegularSessions::default())),
            sink,
        })
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

    /// Tickers present in the snapshot, in load order.
    pub fn available_tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    /// Fields present in the snapshot, canonical aliases included.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Snapshot date range.
    pub fn range(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.start, self.end)
    }

    /// Rows of an instruments file of the underlying archive.
    pub fn instruments(&self, market: &str) -> Result<Vec<InstrumentSpan>, DataError> {
        self.archive.instruments(market)
    }

    /// Replace index tickers by their loaded constituents.
    fn expand_request(&self, tickers: &[Ticker]) -> (Vec<Ticker>, bool) {
        let mut expanded = false;
        let mut out = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            match (ticker.kind(), self.members.get(ticker.as_str())) {
                (SecurityKind::Index, Some(members)) => {
                    expanded = true;
                    out.extend(members.iter().cloned());
                }
                _ => out.push(ticker.clone()),
            }
        }
        (out, expanded)
    }

    /// Slice every distinct ticker to `window` in parallel.
    fn slice(&self, tickers: &[Ticker], window: &Window) -> Result<SnapshotSlices, DataError> {
        let mut seen = HashSet::new();
        let unique: Vec<&Ticker> = tickers.iter().filter(|t| seen.insert(*t)).collect();

        let slices = unique
            .par_iter()
            .filter_map(|t| {
                let table = self.tables.get(t.as_str())?;
                Some(
                    table
                        .clone()
                        .within(window.start, window.end)
                        .map(|sliced| (t.as_str().to_string(), sliced)),
                )
            })
            .collect::<Result<HashMap<_, _>, DataError>>()?;

        Ok(SnapshotSlices { slices })
    }
}

/// Instruments to load, in request order, with whether each was named
/// explicitly; and the constituents found for each index.
fn expand(
    archive: &QlibArchive,
    requested: &[Ticker],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<(Vec<(Ticker, bool)>, BTreeMap<String, Vec<Ticker>>), DataError> {
    let explicit: HashSet<&Ticker> = requested
        .iter()
        .filter(|t| t.kind() == SecurityKind::Stock)
        .collect();

    let mut instruments = Vec::new();
    let mut members = BTreeMap::new();
    let mut seen = HashSet::new();

    for ticker in requested {
        if ticker.kind() != SecurityKind::Index {
            if seen.insert(ticker.clone()) {
                instruments.push((ticker.clone(), true));
            }
            continue;
        }

        let constituents: Vec<Ticker> = archive
            .instruments(ticker.as_str())?
            .into_iter()
            .filter(|span| span.overlaps(start.date(), end.date()))
            .map(|span| Ticker::stock(span.symbol))
            .collect();
        log::debug!("{ticker}: {} constituents in range", constituents.len());

        for member in &constituents {
            if seen.insert(member.clone()) {
                instruments.push((member.clone(), explicit.contains(member)));
            }
        }
        let mut unique = HashSet::new();
        members.insert(
            ticker.as_str().to_string(),
            constituents.into_iter().filter(|t| unique.insert(t.clone())).collect(),
        );
    }

    Ok((instruments, members))
}

/// Pre-sliced tables served to the pipeline.
struct SnapshotSlices {
    slices: HashMap<String, RawTable>,
}

impl RawFetcher for SnapshotSlices {
    fn fetch(
        &mut self,
        ticker: &Ticker,
        _fields: &[String],
        _window: &Window,
        _frequency: Frequency,
        _sink: &dyn DiagnosticSink,
    ) -> Result<RawTable, DataError> {
        self.slices
            .remove(ticker.as_str())
            .ok_or_else(|| DataError::SourceUnavailable {
                ticker: ticker.as_str().to_string(),
                reason: "not in the loaded snapshot".into(),
            })
    }
}

impl PriceDataProvider for ArchiveDataProvider {
    fn name(&self) -> &str {
        "archive"
    }

    fn frequency(&self) -> Frequency {
        self.frequency
    }

    fn supported_ticker_kinds(&self) -> &[SecurityKind] {
        &SUPPORTED_KINDS
    }

    fn price_field_map(&self) -> Option<&PriceFieldMap> {
        self.field_map.as_ref()
    }

    fn get_history(&self, request: &HistoryRequest) -> Result<History, DataError> {
        let frequency = request.frequency.unwrap_or(self.frequency);
        if frequency != self.frequency {
            return Err(DataError::UnsupportedFrequency {
                provider: self.name().to_string(),
                frequency,
            });
        }

        let requested = request.tickers.to_vec();
        check_ticker_kinds(self.name(), self.supported_ticker_kinds(), &requested)?;
        let (tickers, expanded) = self.expand_request(&requested);

        let window = self.guard.window(
            request.start,
            request.end,
            frequency,
            self.clock.now(),
            request.look_ahead_bias,
        );

        let plan = Plan {
            tickers,
            fields: request.field_names(),
            window,
            frequency,
            flags: SqueezeFlags {
                single_date: window.single_date,
                single_ticker: request.tickers.is_single() && !expanded,
                single_field: request.fields.is_single(),
            },
        };

        if window.is_empty() {
            return run_pipeline(&mut EmptyWindow, &plan, self.sink.as_ref());
        }
        let mut fetcher = self.slice(&plan.tickers, &window)?;
        run_pipeline(&mut fetcher, &plan, self.sink.as_ref())
    }
}
