//! RawTable: one ticker's raw rows, keyed by timestamp.
//!
//! Backed by a Polars `DataFrame` with a `timestamp` column
//! (`Datetime(ms)`) and one `Float64` column per field. Source-specific
//! column names never leave the fetcher that builds the table.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use std::collections::BTreeSet;

use super::error::DataError;

pub const TIMESTAMP: &str = "timestamp";

#[derive(Debug, Clone)]
pub struct RawTable {
    df: DataFrame,
}

impl RawTable {
    /// Table with no rows and no field columns.
    pub fn empty() -> Result<Self, DataError> {
        Self::from_columns(&[], Vec::new())
    }

    /// Build a table from a timestamp axis and named value columns.
    ///
    /// Every column must have one entry per timestamp.
    pub fn from_columns(
        timestamps: &[NaiveDateTime],
        fields: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self, DataError> {
        let millis: Vec<i64> = timestamps
            .iter()
            .map(|t| t.and_utc().timestamp_millis())
            .collect();

        let mut columns = vec![Column::new(TIMESTAMP.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?];

        for (name, values) in fields {
            if values.len() != timestamps.len() {
                return Err(DataError::Table(format!(
                    "column '{name}' has {} values for {} timestamps",
                    values.len(),
                    timestamps.len()
                )));
            }
            columns.push(Column::new(name.as_str().into(), values));
        }

        Ok(Self {
            df: DataFrame::new(columns)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Field columns in table order (the timestamp column excluded).
    pub fn field_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != TIMESTAMP)
            .map(|name| name.to_string())
            .collect()
    }

    /// Drop rows whose timestamp was already seen (first occurrence wins),
    /// then sort ascending.
    pub fn dedup_first(self) -> Result<Self, DataError> {
        let df = self
            .df
            .lazy()
            .unique_stable(Some(vec![TIMESTAMP.into()]), UniqueKeepStrategy::First)
            .sort(
                [TIMESTAMP],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;
        Ok(Self { df })
    }

    /// Keep rows with `start <= timestamp <= end`.
    pub fn within(self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, DataError> {
        let start_ms = start.and_utc().timestamp_millis();
        let end_ms = end.and_utc().timestamp_millis();
        let ts = col(TIMESTAMP).cast(DataType::Int64);

        let df = self
            .df
            .lazy()
            .filter(ts.clone().gt_eq(lit(start_ms)).and(ts.lt_eq(lit(end_ms))))
            .collect()?;
        Ok(Self { df })
    }

    /// Restrict the table to the requested fields that exist.
    ///
    /// Returns the projected table and the requested fields that were not
    /// available. An empty request keeps every column.
    pub fn project(self, fields: &[String]) -> Result<(Self, BTreeSet<String>), DataError> {
        if fields.is_empty() {
            return Ok((self, BTreeSet::new()));
        }

        let available = self.field_names();
        let mut selection = vec![TIMESTAMP.to_string()];
        let mut missing = BTreeSet::new();

        for field in fields {
            if available.contains(field) {
                if !selection.contains(field) {
                    selection.push(field.clone());
                }
            } else {
                missing.insert(field.clone());
            }
        }

        let df = self.df.select(selection)?;
        Ok((Self { df }, missing))
    }

    /// Copy `source` into a new column named `alias` (replacing any existing one).
    pub fn with_alias(mut self, source: &str, alias: &str) -> Result<Self, DataError> {
        let mut column = self.df.column(source)?.clone();
        column.rename(alias.into());
        self.df.with_column(column)?;
        Ok(self)
    }

    /// Timestamps in table order.
    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>, DataError> {
        let column = self.df.column(TIMESTAMP)?.cast(&DataType::Int64)?;
        column
            .i64()?
            .into_iter()
            .enumerate()
            .map(|(row, ms)| {
                ms.and_then(DateTime::from_timestamp_millis)
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| DataError::Table(format!("null timestamp at row {row}")))
            })
            .collect()
    }

    /// Values of one field, `None` where missing or NaN. `Ok(None)` when the
    /// column does not exist.
    pub fn values(&self, field: &str) -> Result<Option<Vec<Option<f64>>>, DataError> {
        let Ok(column) = self.df.column(field) else {
            return Ok(None);
        };
        let column = column.cast(&DataType::Float64)?;
        let values = column
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Ok(Some(values))
    }
}
