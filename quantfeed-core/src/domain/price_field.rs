//! Canonical OHLCV field vocabulary and field-token resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::error::DataError;

/// Source-independent price field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    /// All five fields in OHLCV order.
    pub fn ohlcv() -> Vec<PriceField> {
        vec![
            PriceField::Open,
            PriceField::High,
            PriceField::Low,
            PriceField::Close,
            PriceField::Volume,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field as supplied by a caller: either a source-native column name or a
/// canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldToken {
    Canonical(PriceField),
    Native(String),
}

impl FieldToken {
    /// Column label this token selects in a raw table.
    pub fn column_name(&self) -> &str {
        match self {
            FieldToken::Canonical(field) => field.as_str(),
            FieldToken::Native(name) => name,
        }
    }
}

impl From<PriceField> for FieldToken {
    fn from(field: PriceField) -> Self {
        FieldToken::Canonical(field)
    }
}

impl From<&str> for FieldToken {
    fn from(name: &str) -> Self {
        FieldToken::Native(name.to_string())
    }
}

impl From<String> for FieldToken {
    fn from(name: String) -> Self {
        FieldToken::Native(name)
    }
}

/// Resolve a token to the canonical vocabulary.
///
/// Total over `open/high/low/close/volume` (case-insensitive); anything else
/// is `UnsupportedField`.
pub fn resolve_field(token: &FieldToken) -> Result<PriceField, DataError> {
    match token {
        FieldToken::Canonical(field) => Ok(*field),
        FieldToken::Native(name) => match name.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PriceField::Open),
            "high" => Ok(PriceField::High),
            "low" => Ok(PriceField::Low),
            "close" => Ok(PriceField::Close),
            "volume" => Ok(PriceField::Volume),
            _ => Err(DataError::UnsupportedField {
                field: name.clone(),
            }),
        },
    }
}
