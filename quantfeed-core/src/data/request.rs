//! Request types for `get_history` / `get_price`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{FieldToken, Frequency, PriceField, Ticker};

/// A single label or a list of labels.
///
/// Whether the caller supplied one label decides if that axis is squeezed
/// out of the result, so `One(x)` and `Many(vec![x])` are not the same
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn is_single(&self) -> bool {
        matches!(self, OneOrMany::One(_))
    }

    /// Labels in caller order, duplicates kept.
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item.clone()],
            OneOrMany::Many(items) => items.clone(),
        }
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> OneOrMany<U> {
        match self {
            OneOrMany::One(item) => OneOrMany::One(f(item)),
            OneOrMany::Many(items) => OneOrMany::Many(items.iter().map(f).collect()),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(item: T) -> Self {
        OneOrMany::One(item)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

/// Raw-field history request.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub tickers: OneOrMany<Ticker>,
    pub fields: OneOrMany<FieldToken>,
    pub start: NaiveDateTime,
    /// Defaults to the provider clock's current time.
    pub end: Option<NaiveDateTime>,
    /// Defaults to the provider's configured frequency.
    pub frequency: Option<Frequency>,
    /// Disable the look-ahead guard.
    pub look_ahead_bias: bool,
}

impl HistoryRequest {
    pub fn new(
        tickers: impl Into<OneOrMany<Ticker>>,
        fields: impl Into<OneOrMany<FieldToken>>,
        start: NaiveDateTime,
    ) -> Self {
        Self {
            tickers: tickers.into(),
            fields: fields.into(),
            start,
            end: None,
            frequency: None,
            look_ahead_bias: false,
        }
    }

    pub fn end(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn look_ahead_bias(mut self, allow: bool) -> Self {
        self.look_ahead_bias = allow;
        self
    }

    /// Requested field labels as raw column names.
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .to_vec()
            .iter()
            .map(|f| f.column_name().to_string())
            .collect()
    }
}

/// Canonical-field price request.
#[derive(Debug, Clone)]
pub struct PriceRequest {
    pub tickers: OneOrMany<Ticker>,
    pub fields: OneOrMany<PriceField>,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub frequency: Option<Frequency>,
    pub look_ahead_bias: bool,
}

impl PriceRequest {
    pub fn new(
        tickers: impl Into<OneOrMany<Ticker>>,
        fields: impl Into<OneOrMany<PriceField>>,
        start: NaiveDateTime,
    ) -> Self {
        Self {
            tickers: tickers.into(),
            fields: fields.into(),
            start,
            end: None,
            frequency: None,
            look_ahead_bias: false,
        }
    }

    pub fn end(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn look_ahead_bias(mut self, allow: bool) -> Self {
        self.look_ahead_bias = allow;
        self
    }
}
