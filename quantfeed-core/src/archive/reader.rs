//! Reader for the qlib on-disk layout.
//!
//! ```text
//! <root>/calendars/day.txt                  one timestamp per line
//! <root>/instruments/csi300.txt             SYMBOL<TAB>START<TAB>END
//! <root>/features/sh600000/close.day.bin    little-endian f32
//! ```
//!
//! A feature file starts with the calendar index of its first value,
//! followed by one value per consecutive calendar entry.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::error::DataError;
use crate::data::table::RawTable;
use crate::domain::Frequency;

/// Divisor column for adjusted prices.
pub const FACTOR_FIELD: &str = "factor";

/// Fields stored raw and adjusted by `factor` on read.
pub const ADJUSTED_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// One row of an instruments file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSpan {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl InstrumentSpan {
    /// Listed at some point in `[start, end]`.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= end && self.end >= start
    }
}

/// Archive file-name suffix for a frequency.
pub fn archive_freq(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Min1 => "1min",
        Frequency::Min5 => "5min",
        Frequency::Min10 => "10min",
        Frequency::Min15 => "15min",
        Frequency::Min30 => "30min",
        Frequency::Min60 => "60min",
        Frequency::Daily => "day",
        Frequency::Weekly => "week",
        Frequency::Monthly => "month",
        Frequency::Quarterly => "quarter",
        Frequency::Yearly => "year",
    }
}

/// Feature values with their calendar offset.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSeries {
    pub start_index: usize,
    pub values: Vec<f32>,
}

impl FeatureSeries {
    /// Value at calendar position `index`, `None` outside the series or NaN.
    pub fn at(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.start_index)
            .and_then(|i| self.values.get(i))
            .filter(|v| !v.is_nan())
            .map(|v| f64::from(*v))
    }

    fn end_index(&self) -> usize {
        self.start_index + self.values.len()
    }
}

#[derive(Debug, Clone)]
pub struct QlibArchive {
    root: PathBuf,
}

impl QlibArchive {
    /// `EnvironmentUnavailable` when `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DataError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(DataError::EnvironmentUnavailable(format!(
                "archive directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn calendar(&self, frequency: Frequency) -> Result<Vec<NaiveDateTime>, DataError> {
        let path = self
            .root
            .join("calendars")
            .join(format!("{}.txt", archive_freq(frequency)));
        let content = fs::read_to_string(&path)
            .map_err(|e| DataError::Archive(format!("read {}: {e}", path.display())))?;

        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(parse_timestamp)
            .collect()
    }

    /// Rows of `instruments/{market}.txt`, in file order.
    pub fn instruments(&self, market: &str) -> Result<Vec<InstrumentSpan>, DataError> {
        let path = self.root.join("instruments").join(format!("{market}.txt"));
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| DataError::Archive(format!("open {}: {e}", path.display())))?;

        let mut spans = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| DataError::Archive(format!("{}: {e}", path.display())))?;
            let field = |i: usize| {
                record.get(i).map(str::trim).ok_or_else(|| {
                    DataError::Archive(format!("{}:{}: missing column {i}", path.display(), line + 1))
                })
            };
            spans.push(InstrumentSpan {
                symbol: field(0)?.to_string(),
                start: parse_timestamp(field(1)?)?.date(),
                end: parse_timestamp(field(2)?)?.date(),
            });
        }
        Ok(spans)
    }

    /// `Ok(None)` when the instrument has no file for this field.
    pub fn feature(
        &self,
        symbol: &str,
        field: &str,
        frequency: Frequency,
    ) -> Result<Option<FeatureSeries>, DataError> {
        let path = self.feature_path(symbol, field, frequency);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .map_err(|e| DataError::Archive(format!("read {}: {e}", path.display())))?;
        decode_feature(&bytes)
            .map(Some)
            .map_err(|e| DataError::Archive(format!("{}: {e}", path.display())))
    }

    pub fn feature_path(&self, symbol: &str, field: &str, frequency: Frequency) -> PathBuf {
        self.root
            .join("features")
            .join(symbol.to_lowercase())
            .join(format!("{field}.{}.bin", archive_freq(frequency)))
    }

    /// One instrument's rows in `[start, end]`.
    ///
    /// Returns the table and the fields that have no file. `Ok(None)` when
    /// the instrument has none of the fields.
    pub fn load_instrument(
        &self,
        symbol: &str,
        fields: &[String],
        frequency: Frequency,
        calendar: &[NaiveDateTime],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Option<(RawTable, Vec<String>)>, DataError> {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for field in fields {
            match self.feature(symbol, field, frequency)? {
                Some(series) => found.push((field.clone(), series)),
                None => missing.push(field.clone()),
            }
        }
        if found.is_empty() {
            return Ok(None);
        }
        let factor = self.feature(symbol, FACTOR_FIELD, frequency)?;

        let first = found.iter().map(|(_, s)| s.start_index).min().unwrap_or(0);
        let last = found
            .iter()
            .map(|(_, s)| s.end_index())
            .max()
            .unwrap_or(0)
            .min(calendar.len());
        let positions: Vec<usize> = (first..last)
            .filter(|i| calendar[*i] >= start && calendar[*i] <= end)
            .collect();
        let timestamps: Vec<NaiveDateTime> = positions.iter().map(|i| calendar[*i]).collect();

        let columns = found
            .iter()
            .map(|(field, series)| {
                let adjust = ADJUSTED_FIELDS.contains(&field.as_str());
                let values = positions
                    .iter()
                    .map(|i| {
                        let raw = series.at(*i)?;
                        match (&factor, adjust) {
                            (Some(factor), true) => factor.at(*i).map(|f| raw / f),
                            _ => Some(raw),
                        }
                    })
                    .collect();
                (field.clone(), values)
            })
            .collect();

        let table = RawTable::from_columns(&timestamps, columns)?.dedup_first()?;
        Ok(Some((table, missing)))
    }
}

/// Decode a feature file body.
pub fn decode_feature(bytes: &[u8]) -> Result<FeatureSeries, String> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(format!("{} bytes is not a whole number of f32 values", bytes.len()));
    }
    let mut floats = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));

    let start = floats.next().unwrap_or(f32::NAN);
    if !start.is_finite() || start < 0.0 || start.fract() != 0.0 {
        return Err(format!("invalid start index {start}"));
    }
    Ok(FeatureSeries {
        start_index: start as usize,
        values: floats.collect(),
    })
}

/// Encode a feature file body; inverse of [`decode_feature`].
pub fn encode_feature(start_index: usize, values: &[f32]) -> Vec<u8> {
    std::iter::once(start_index as f32)
        .chain(values.iter().copied())
        .flat_map(f32::to_le_bytes)
        .collect()
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, DataError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|e| DataError::Archive(format!("bad timestamp '{s}': {e}")))
}
