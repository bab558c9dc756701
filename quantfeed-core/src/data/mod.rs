//! Request pipeline shared by every provider: look-ahead guard, raw tables,
//! shape normalization, diagnostics and configuration.

pub mod capability;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod normalize;
pub mod provider;
pub mod request;
pub mod table;

pub use capability::{capabilities, Backend};
pub use config::{ArchiveConfig, BrokerConfig, QuantfeedConfig};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, LogSink};
pub use error::DataError;
pub use guard::{LookAheadGuard, Window};
pub use normalize::{ShapeNormalizer, SqueezeFlags};
pub use provider::{EmptyWindow, PriceDataProvider, PriceFieldMap, RawFetcher};
pub use request::{HistoryRequest, OneOrMany, PriceRequest};
pub use table::RawTable;
