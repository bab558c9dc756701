//! Archive provider over a small qlib layout written to a temp directory.
//!
//! Calendar: the seven trading days 2020-01-02 .. 2020-01-10.
//! SH600000 carries a constant factor of 2; SZ000001 has no factor file and
//! starts on the third calendar day.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use quantfeed_core::archive::reader::encode_feature;
use quantfeed_core::archive::QlibArchive;
use quantfeed_core::data::{CollectingSink, Diagnostic};
use quantfeed_core::time::{RegularSessions, SettableClock};
use quantfeed_core::{
    ArchiveConfig, ArchiveDataProvider, DataError, FieldToken, Frequency, HistoryRequest,
    PriceDataProvider, PriceField, PriceRequest, SecurityKind, Ticker,
};

const CALENDAR: [u32; 7] = [2, 3, 6, 7, 8, 9, 10];

// ── Fixture ──────────────────────────────────────────────────────────

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
}

fn day(d: u32) -> NaiveDateTime {
    date(d).and_time(NaiveTime::MIN)
}

fn write_feature(root: &Path, symbol: &str, field: &str, start: usize, values: &[f32]) {
    let dir = root.join("features").join(symbol);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{field}.day.bin")), encode_feature(start, values)).unwrap();
}

fn write_archive(root: &Path) {
    fs::create_dir_all(root.join("calendars")).unwrap();
    let calendar: String = CALENDAR
        .iter()
        .map(|d| format!("2020-01-{d:02}\n"))
        .collect();
    fs::write(root.join("calendars").join("day.txt"), calendar).unwrap();

    fs::create_dir_all(root.join("instruments")).unwrap();
    fs::write(
        root.join("instruments").join("csi300.txt"),
        "SH600000\t2019-01-01\t2020-12-31\n\
         SZ000001\t2019-06-01\t2020-12-31\n\
         SH600999\t2021-01-01\t2021-12-31\n",
    )
    .unwrap();

    write_feature(root, "sh600000", "open", 0, &[18.0, 20.0, 22.0, 24.0, 26.0, 28.0, 30.0]);
    write_feature(root, "sh600000", "close", 0, &[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
    write_feature(
        root,
        "sh600000",
        "volume",
        0,
        &[1000.0, 1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2200.0],
    );
    write_feature(root, "sh600000", "factor", 0, &[2.0; 7]);
    write_feature(
        root,
        "sh600000",
        "adjclose",
        0,
        &[100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0],
    );

    write_feature(root, "sz000001", "close", 2, &[20.0, 21.0, 22.0, f32::NAN, 24.0]);
}

fn archive() -> (tempfile::TempDir, QlibArchive) {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let archive = QlibArchive::open(dir.path()).unwrap();
    (dir, archive)
}

fn config(tickers: Vec<Ticker>) -> ArchiveConfig {
    ArchiveConfig::new(tickers, date(2), date(10))
}

fn provider(config: &ArchiveConfig) -> (tempfile::TempDir, ArchiveDataProvider, Arc<CollectingSink>) {
    let (dir, archive) = archive();
    let sink = Arc::new(CollectingSink::new());
    let provider = ArchiveDataProvider::from_archive(archive, config, sink.clone())
        .unwrap()
        .with_clock(Arc::new(SettableClock::new(day(31))));
    (dir, provider, sink)
}

fn sh() -> Ticker {
    Ticker::stock("SH600000")
}

fn sz() -> Ticker {
    Ticker::stock("SZ000001")
}

fn close(ticker: impl Into<quantfeed_core::OneOrMany<Ticker>>, start: u32, end: u32) -> HistoryRequest {
    HistoryRequest::new(ticker, FieldToken::from("close"), day(start)).end(day(end))
}

// ── Loading ──────────────────────────────────────────────────────────

#[test]
fn adjusted_fields_are_divided_by_factor() {
    let (_dir, provider, _) = provider(&config(vec![sh()]));
    let out = provider.get_history(&close(sh(), 2, 3)).unwrap();
    let series = out.as_date_series().unwrap();
    assert_eq!(series.index(), &[day(2), day(3)]);
    assert_eq!(series.values(), &[Some(5.0), Some(5.5)]);

    let out = provider
        .get_history(&HistoryRequest::new(sh(), FieldToken::from("volume"), day(10)).end(day(10)))
        .unwrap();
    assert_eq!(out.as_scalar(), Some(Some(1100.0)));
}

#[test]
fn missing_factor_leaves_values_raw() {
    let (_dir, provider, _) = provider(&config(vec![sz()]));
    assert_eq!(provider.get_history(&close(sz(), 6, 6)).unwrap().as_scalar(), Some(Some(20.0)));
    assert_eq!(provider.get_history(&close(sz(), 9, 9)).unwrap().as_scalar(), Some(None));
}

#[test]
fn repeated_construction_tickers_load_once() {
    let (_dir, provider, _) = provider(&config(vec![sh(), sh()]));
    assert_eq!(provider.available_tickers(), &[sh()]);
    assert_eq!(provider.range(), (day(2), day(10).date().and_hms_opt(23, 59, 59).unwrap()));
}

#[test]
fn fields_without_files_are_reported() {
    let (_dir, provider, sink) = provider(&config(vec![sh()]));
    assert_eq!(provider.fields(), &["open", "high", "low", "close", "volume"]);

    let reported: Vec<String> = sink
        .records()
        .into_iter()
        .filter_map(|d| match d {
            Diagnostic::MissingFields { ticker, fields } if ticker == "SH600000" => {
                Some(fields.into_iter().collect::<Vec<_>>().join(","))
            }
            _ => None,
        })
        .collect();
    assert_eq!(reported, vec!["high,low".to_string()]);
}

#[test]
fn repeated_config_fields_load_once() {
    let mut config = config(vec![sh()]);
    config.fields = vec!["close".into(), "open".into(), "close".into()];
    let (_dir, provider, _) = provider(&config);
    assert_eq!(provider.fields(), &["close", "open"]);

    let out = provider.get_history(&close(sh(), 2, 3)).unwrap();
    assert_eq!(out.as_date_series().unwrap().values(), &[Some(5.0), Some(5.5)]);
}

#[test]
fn unknown_explicit_ticker_is_diagnosed_and_kept_as_label() {
    let bad = Ticker::stock("SH999999");
    let (_dir, provider, sink) = provider(&config(vec![sh(), bad.clone()]));
    assert!(sink
        .records()
        .iter()
        .any(|d| matches!(d, Diagnostic::SourceUnavailable { ticker, .. } if ticker == "SH999999")));

    let out = provider.get_history(&close(vec![sh(), bad.clone()], 2, 3)).unwrap();
    let frame = out.as_date_ticker().unwrap();
    assert_eq!(frame.columns(), &[sh(), bad]);
    assert_eq!(frame.column(1).unwrap().values(), &[None, None]);
}

#[test]
fn nothing_loadable_is_no_data() {
    let (_dir, archive) = archive();
    let err = ArchiveDataProvider::from_archive(
        archive,
        &config(vec![Ticker::stock("NOPE"), Ticker::stock("ALSO")]),
        Arc::new(CollectingSink::new()),
    )
    .err()
    .unwrap();
    match err {
        DataError::NoDataFound { tickers } => assert_eq!(tickers, "NOPE, ALSO"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_archive_root_is_environment_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(vec![sh()]);
    config.path = Some(dir.path().join("absent"));
    let err = ArchiveDataProvider::try_new(&config).err().unwrap();
    assert!(matches!(err, DataError::EnvironmentUnavailable(_)));
}

#[test]
fn try_new_reads_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let mut config = config(vec![sh()]);
    config.path = Some(dir.path().to_path_buf());
    let provider = ArchiveDataProvider::try_new(&config).unwrap();
    assert_eq!(provider.name(), "archive");
    assert_eq!(provider.frequency(), Frequency::Daily);
}

// ── Indices ──────────────────────────────────────────────────────────

#[test]
fn index_expands_to_listed_constituents() {
    let csi300 = Ticker::index("csi300");
    let (_dir, provider, _) = provider(&config(vec![csi300.clone()]));
    assert_eq!(provider.available_tickers(), &[sh(), sz()]);
    assert_eq!(provider.instruments("csi300").unwrap().len(), 3);

    let out = provider.get_history(&close(csi300, 6, 7)).unwrap();
    let frame = out.as_date_ticker().unwrap();
    assert_eq!(frame.columns(), &[sh(), sz()]);
    assert_eq!(frame.column(0).unwrap().values(), &[Some(6.0), Some(6.5)]);
    assert_eq!(frame.column(1).unwrap().values(), &[Some(20.0), Some(21.0)]);
}

#[test]
fn index_alongside_explicit_member_loads_it_once() {
    let (_dir, provider, _) = provider(&config(vec![sz(), Ticker::index("csi300")]));
    assert_eq!(provider.available_tickers(), &[sz(), sh()]);
}

#[test]
fn unknown_index_in_request_keeps_its_label() {
    let csi500 = Ticker::index("csi500");
    let (_dir, provider, sink) = provider(&config(vec![sh()]));
    let out = provider.get_history(&close(vec![csi500.clone(), sh()], 2, 3)).unwrap();
    let frame = out.as_date_ticker().unwrap();
    assert_eq!(frame.columns(), &[csi500, sh()]);
    assert_eq!(frame.column(0).unwrap().values(), &[None, None]);
    assert!(sink
        .records()
        .iter()
        .any(|d| matches!(d, Diagnostic::SourceUnavailable { ticker, .. } if ticker == "csi500")));
}

// ── Request validation ───────────────────────────────────────────────

#[test]
fn other_frequency_is_rejected() {
    let (_dir, provider, _) = provider(&config(vec![sh()]));
    let err = provider
        .get_history(&close(sh(), 2, 3).frequency(Frequency::Weekly))
        .unwrap_err();
    assert!(matches!(err, DataError::UnsupportedFrequency { .. }));
}

#[test]
fn future_ticker_is_rejected() {
    let (_dir, provider, _) = provider(&config(vec![sh()]));
    let err = provider
        .get_history(&close(Ticker::new("IF2001", SecurityKind::Future), 2, 3))
        .unwrap_err();
    assert!(matches!(err, DataError::UnsupportedInstrumentKind { .. }));
}

#[test]
fn guard_hides_bars_before_their_close() {
    let (_dir, provider, _) = provider(&config(vec![sh()]));
    let provider = provider
        .with_calendar(Arc::new(RegularSessions::new(
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        )))
        .with_clock(Arc::new(SettableClock::new(day(3) + chrono::Duration::hours(10))));

    let out = provider.get_history(&close(sh(), 2, 6)).unwrap();
    assert_eq!(out.as_scalar(), Some(Some(5.0)));

    let out = provider.get_history(&close(sh(), 2, 6).look_ahead_bias(true)).unwrap();
    assert_eq!(out.as_date_series().unwrap().len(), 3);
}

// ── get_price ────────────────────────────────────────────────────────

#[test]
fn get_price_needs_a_field_map() {
    let (_dir, provider, _) = provider(&config(vec![sh()]));
    let err = provider
        .get_price(&PriceRequest::new(sh(), PriceField::Close, day(2)))
        .unwrap_err();
    assert!(matches!(err, DataError::MissingPriceFieldMap { .. }));
}

#[test]
fn get_price_reads_mapped_columns() {
    let mut config = config(vec![sh()]);
    config.fields = vec!["adjclose".into(), "volume".into()];
    config.field_map = [
        ("adjclose".to_string(), PriceField::Close),
        ("volume".to_string(), PriceField::Volume),
    ]
    .into_iter()
    .collect();
    let (_dir, provider, _) = provider(&config);
    assert_eq!(provider.fields(), &["adjclose", "volume", "close"]);

    let out = provider
        .get_price(&PriceRequest::new(sh(), vec![PriceField::Close, PriceField::Volume], day(2)).end(day(3)))
        .unwrap();
    let frame = out.as_date_field().unwrap();
    assert_eq!(frame.columns(), &["close".to_string(), "volume".to_string()]);
    assert_eq!(frame.get(0, 0), Some(100.0));
    assert_eq!(frame.get(1, 1), Some(600.0));
}
