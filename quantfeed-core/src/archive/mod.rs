//! Provider over a local qlib-layout archive.

pub mod provider;
pub mod reader;

pub use provider::ArchiveDataProvider;
pub use reader::{InstrumentSpan, QlibArchive};
