//! History: the squeezed result of a data request.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::cube::DataCube;
use super::frame::Frame;
use super::series::Series;
use crate::domain::Ticker;

/// Result of `get_history` / `get_price`, at the lowest rank implied by the
/// request. Variant names list the remaining axes in date → ticker → field
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum History {
    Scalar(Option<f64>),
    ByDate(Series<NaiveDateTime>),
    ByTicker(Series<Ticker>),
    ByField(Series<String>),
    DateTicker(Frame<NaiveDateTime, Ticker>),
    DateField(Frame<NaiveDateTime, String>),
    TickerField(Frame<Ticker, String>),
    Cube(DataCube),
}

impl History {
    /// Number of axes left after squeezing (0 for a scalar).
    pub fn rank(&self) -> usize {
        match self {
            History::Scalar(_) => 0,
            History::ByDate(_) | History::ByTicker(_) | History::ByField(_) => 1,
            History::DateTicker(_) | History::DateField(_) | History::TickerField(_) => 2,
            History::Cube(_) => 3,
        }
    }

    /// `Some(value)` when the result is a scalar.
    pub fn as_scalar(&self) -> Option<Option<f64>> {
        match self {
            History::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date_series(&self) -> Option<&Series<NaiveDateTime>> {
        match self {
            History::ByDate(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ticker_series(&self) -> Option<&Series<Ticker>> {
        match self {
            History::ByTicker(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_field_series(&self) -> Option<&Series<String>> {
        match self {
            History::ByField(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date_ticker(&self) -> Option<&Frame<NaiveDateTime, Ticker>> {
        match self {
            History::DateTicker(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_date_field(&self) -> Option<&Frame<NaiveDateTime, String>> {
        match self {
            History::DateField(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_ticker_field(&self) -> Option<&Frame<Ticker, String>> {
        match self {
            History::TickerField(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_cube(&self) -> Option<&DataCube> {
        match self {
            History::Cube(c) => Some(c),
            _ => None,
        }
    }

    /// Replace the field axis labels positionally. Results without a field
    /// axis are returned unchanged.
    ///
    /// # Panics
    /// If `fields` does not match the length of the field axis.
    pub fn relabel_fields(self, fields: Vec<String>) -> History {
        match self {
            History::ByField(s) => History::ByField(s.relabel(fields)),
            History::DateField(f) => History::DateField(f.relabel_columns(fields)),
            History::TickerField(f) => History::TickerField(f.relabel_columns(fields)),
            History::Cube(c) => History::Cube(c.relabel_fields(fields)),
            other => other,
        }
    }
}
