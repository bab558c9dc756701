//! quantfeed core: market-data providers with look-ahead protection and
//! shape normalization.
//!
//! This crate contains:
//! - Domain types (tickers, frequencies, canonical price fields)
//! - Clocks and market sessions
//! - Labeled containers (series, frame, cube) and the squeezed `History` result
//! - The shared request pipeline: look-ahead guard, raw tables, shape normalizer
//! - A brokerage quote-gateway provider and a qlib archive provider

pub mod archive;
pub mod broker;
pub mod containers;
pub mod data;
pub mod domain;
pub mod time;

pub use archive::ArchiveDataProvider;
pub use broker::BrokerDataProvider;
pub use containers::{DataCube, Frame, History, Series};
pub use data::{
    ArchiveConfig, BrokerConfig, DataError, Diagnostic, DiagnosticSink, HistoryRequest, OneOrMany,
    PriceDataProvider, PriceRequest, QuantfeedConfig,
};
pub use domain::{FieldToken, Frequency, PriceField, SecurityKind, Ticker};
