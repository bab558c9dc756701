//! Ticker: the instrument identifier shared by every provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// What kind of security a ticker refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityKind {
    Stock,
    Index,
    Future,
    Fx,
    Crypto,
}

/// Instrument identifier.
///
/// Equality and hashing use the canonical string only, so the same symbol
/// tagged with two different kinds still compares equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    symbol: String,
    kind: SecurityKind,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>, kind: SecurityKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
        }
    }

    /// Shorthand for a stock ticker.
    pub fn stock(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SecurityKind::Stock)
    }

    /// Shorthand for an index ticker (e.g. a qlib market such as `csi300`).
    pub fn index(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SecurityKind::Index)
    }

    /// Canonical string form used by every data source.
    pub fn as_str(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> SecurityKind {
        self.kind
    }
}

impl PartialEq for Ticker {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Ticker {}

impl Hash for Ticker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}
