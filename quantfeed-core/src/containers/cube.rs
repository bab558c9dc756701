//! DataCube: the (date × ticker × field) structure every request assembles
//! before it is squeezed.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::data::error::DataError;
use crate::data::table::RawTable;
use crate::domain::Ticker;

/// Dense 3-D array with labeled axes. `None` is "no value".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataCube {
    dates: Vec<NaiveDateTime>,
    tickers: Vec<Ticker>,
    fields: Vec<String>,
    values: Vec<Option<f64>>,
}

impl DataCube {
    /// # Panics
    /// If `values` does not match the product of the axis lengths.
    pub fn new(
        dates: Vec<NaiveDateTime>,
        tickers: Vec<Ticker>,
        fields: Vec<String>,
        values: Vec<Option<f64>>,
    ) -> Self {
        assert_eq!(
            values.len(),
            dates.len() * tickers.len() * fields.len(),
            "cube values do not match its shape"
        );
        Self {
            dates,
            tickers,
            fields,
            values,
        }
    }

    /// Assemble per-ticker tables onto a common date axis.
    ///
    /// The date axis is the sorted union of every table's timestamps. A
    /// ticker without a row for a date, or without a column for a field,
    /// gets "no value" there; nothing is forward-filled.
    pub fn assemble(tables: &[(Ticker, RawTable)], fields: &[String]) -> Result<Self, DataError> {
        let mut per_ticker: Vec<(Vec<NaiveDateTime>, Vec<Option<Vec<Option<f64>>>>)> =
            Vec::with_capacity(tables.len());
        let mut all_dates = BTreeSet::new();

        for (_, table) in tables {
            let timestamps = table.timestamps()?;
            all_dates.extend(timestamps.iter().copied());
            let columns = fields
                .iter()
                .map(|f| table.values(f))
                .collect::<Result<Vec<_>, _>>()?;
            per_ticker.push((timestamps, columns));
        }

        let dates: Vec<NaiveDateTime> = all_dates.into_iter().collect();
        let date_pos: HashMap<NaiveDateTime, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let (n_t, n_f) = (tables.len(), fields.len());
        let mut values = vec![None; dates.len() * n_t * n_f];

        for (t, (timestamps, columns)) in per_ticker.iter().enumerate() {
            for (row, ts) in timestamps.iter().enumerate() {
                let d = date_pos[ts];
                for (f, column) in columns.iter().enumerate() {
                    if let Some(column) = column {
                        values[(d * n_t + t) * n_f + f] = column[row];
                    }
                }
            }
        }

        Ok(Self {
            dates,
            tickers: tables.iter().map(|(t, _)| t.clone()).collect(),
            fields: fields.to_vec(),
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDateTime] {
        &self.dates
    }

    pub fn tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// (dates, tickers, fields)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.dates.len(), self.tickers.len(), self.fields.len())
    }

    /// Same values under new field labels.
    pub fn relabel_fields(self, fields: Vec<String>) -> Self {
        Self::new(self.dates, self.tickers, fields, self.values)
    }

    pub fn get(&self, date: usize, ticker: usize, field: usize) -> Option<f64> {
        let (n_d, n_t, n_f) = self.shape();
        if date >= n_d || ticker >= n_t || field >= n_f {
            return None;
        }
        self.values[(date * n_t + ticker) * n_f + field]
    }

    /// Rebuild the ticker axis in the given order.
    ///
    /// Labels are matched to the first existing entry, so a label requested
    /// twice yields two identical slots; unknown labels are all "no value".
    pub fn reindex_tickers(&self, tickers: &[Ticker]) -> Self {
        let source: Vec<Option<usize>> = tickers
            .iter()
            .map(|t| self.tickers.iter().position(|x| x == t))
            .collect();
        let (n_d, _, n_f) = self.shape();

        let mut values = Vec::with_capacity(n_d * tickers.len() * n_f);
        for d in 0..n_d {
            for src in &source {
                for f in 0..n_f {
                    values.push(src.and_then(|t| self.get(d, t, f)));
                }
            }
        }

        Self::new(self.dates.clone(), tickers.to_vec(), self.fields.clone(), values)
    }

    /// Rebuild the field axis in the given order; same matching rules as
    /// [`DataCube::reindex_tickers`].
    pub fn reindex_fields(&self, fields: &[String]) -> Self {
        let source: Vec<Option<usize>> = fields
            .iter()
            .map(|f| self.fields.iter().position(|x| x == f))
            .collect();
        let (n_d, n_t, _) = self.shape();

        let mut values = Vec::with_capacity(n_d * n_t * fields.len());
        for d in 0..n_d {
            for t in 0..n_t {
                for src in &source {
                    values.push(src.and_then(|f| self.get(d, t, f)));
                }
            }
        }

        Self::new(self.dates.clone(), self.tickers.clone(), fields.to_vec(), values)
    }

    /// Drop dates on which every (ticker, field) entry is "no value".
    pub fn drop_empty_dates(&self) -> Self {
        let (_, n_t, n_f) = self.shape();
        let width = n_t * n_f;

        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (d, date) in self.dates.iter().enumerate() {
            let slab = &self.values[d * width..(d + 1) * width];
            if slab.iter().any(Option::is_some) {
                dates.push(*date);
                values.extend_from_slice(slab);
            }
        }

        Self::new(dates, self.tickers.clone(), self.fields.clone(), values)
    }
}
