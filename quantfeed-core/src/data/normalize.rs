//! Shape normalization: reindex an assembled cube to the caller's labels and
//! squeeze it to the lowest rank the request implies.

use crate::containers::{DataCube, Frame, History, Series};
use crate::domain::Ticker;

/// Which axes the caller supplied as a single label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqueezeFlags {
    pub single_date: bool,
    pub single_ticker: bool,
    pub single_field: bool,
}

/// Reindex + rank-squeeze.
pub struct ShapeNormalizer;

impl ShapeNormalizer {
    /// Normalize an assembled cube.
    ///
    /// Tickers and fields are laid out exactly as requested (duplicates kept,
    /// unknown labels filled with "no value"); dates with no value at all are
    /// dropped. Axes then collapse in date → ticker → field order for every
    /// flag that is set. Absent data is never an error.
    pub fn normalize(
        cube: &DataCube,
        tickers: &[Ticker],
        fields: &[String],
        flags: SqueezeFlags,
    ) -> History {
        let cube = cube
            .reindex_tickers(tickers)
            .reindex_fields(fields)
            .drop_empty_dates();
        Self::squeeze(cube, flags)
    }

    /// Collapse the flagged axes of an already reindexed cube.
    ///
    /// A collapsed date axis takes its last (most recent) date; when the axis
    /// is empty every remaining entry is "no value".
    pub fn squeeze(cube: DataCube, flags: SqueezeFlags) -> History {
        let (n_d, n_t, n_f) = cube.shape();
        let last_date = n_d.checked_sub(1);
        let on_last = |t: usize, f: usize| last_date.and_then(|d| cube.get(d, t, f));

        let dates = cube.dates().to_vec();
        let tickers = cube.tickers().to_vec();
        let fields = cube.fields().to_vec();

        match (flags.single_date, flags.single_ticker, flags.single_field) {
            (true, true, true) => History::Scalar(on_last(0, 0)),
            (true, true, false) => {
                let values = (0..n_f).map(|f| on_last(0, f)).collect();
                History::ByField(Series::new(fields, values))
            }
            (true, false, true) => {
                let values = (0..n_t).map(|t| on_last(t, 0)).collect();
                History::ByTicker(Series::new(tickers, values))
            }
            (true, false, false) => {
                let values = (0..n_t)
                    .flat_map(|t| (0..n_f).map(move |f| (t, f)))
                    .map(|(t, f)| on_last(t, f))
                    .collect();
                History::TickerField(Frame::new(tickers, fields, values))
            }
            (false, true, true) => {
                let values = (0..n_d).map(|d| cube.get(d, 0, 0)).collect();
                History::ByDate(Series::new(dates, values))
            }
            (false, true, false) => {
                let values = (0..n_d)
                    .flat_map(|d| (0..n_f).map(move |f| (d, f)))
                    .map(|(d, f)| cube.get(d, 0, f))
                    .collect();
                History::DateField(Frame::new(dates, fields, values))
            }
            (false, false, true) => {
                let values = (0..n_d)
                    .flat_map(|d| (0..n_t).map(move |t| (d, t)))
                    .map(|(d, t)| cube.get(d, t, 0))
                    .collect();
                History::DateTicker(Frame::new(dates, tickers, values))
            }
            (false, false, false) => History::Cube(cube),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// 2 dates × [A, B] × [open, close]; value = 100*date + 10*ticker + field.
    fn sample_cube() -> DataCube {
        let mut values = Vec::new();
        for d in 1..=2 {
            for t in 0..2 {
                for f in 0..2 {
                    values.push(Some((100 * d + 10 * t + f) as f64));
                }
            }
        }
        DataCube::new(
            vec![day(1), day(2)],
            vec![Ticker::stock("A"), Ticker::stock("B")],
            vec!["open".into(), "close".into()],
            values,
        )
    }

    fn flags(d: bool, t: bool, f: bool) -> SqueezeFlags {
        SqueezeFlags {
            single_date: d,
            single_ticker: t,
            single_field: f,
        }
    }

    #[test]
    fn all_single_is_scalar_from_last_date() {
        let out = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("B")],
            &["close".into()],
            flags(true, true, true),
        );
        assert_eq!(out, History::Scalar(Some(211.0)));
    }

    #[test]
    fn many_tickers_single_field_single_date_is_ticker_series() {
        let out = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("A"), Ticker::stock("B")],
            &["open".into()],
            flags(true, false, true),
        );
        let series = out.as_ticker_series().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.values(), &[Some(200.0), Some(210.0)]);
    }

    #[test]
    fn one_ticker_many_fields_single_date_is_field_series() {
        let out = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("A")],
            &["open".into(), "close".into(), "volume".into()],
            flags(true, true, false),
        );
        let series = out.as_field_series().unwrap();
        assert_eq!(series.values(), &[Some(200.0), Some(201.0), None]);
    }

    #[test]
    fn many_many_single_date_is_ticker_field_table() {
        let out = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("A"), Ticker::stock("B")],
            &["open".into(), "close".into()],
            flags(true, false, false),
        );
        let frame = out.as_ticker_field().unwrap();
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(frame.get(1, 0), Some(210.0));
    }

    #[test]
    fn many_dates_stays_three_dimensional() {
        let out = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("A"), Ticker::stock("B")],
            &["open".into(), "close".into()],
            flags(false, false, false),
        );
        assert_eq!(out.as_cube().unwrap().shape(), (2, 2, 2));
    }

    #[test]
    fn date_series_and_tables_keep_date_axis_first() {
        let by_date = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("A")],
            &["close".into()],
            flags(false, true, true),
        );
        assert_eq!(by_date.as_date_series().unwrap().values(), &[Some(101.0), Some(201.0)]);

        let date_ticker = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("A"), Ticker::stock("B")],
            &["close".into()],
            flags(false, false, true),
        );
        let frame = date_ticker.as_date_ticker().unwrap();
        assert_eq!(frame.index(), &[day(1), day(2)]);
        assert_eq!(frame.get(0, 1), Some(111.0));

        let date_field = ShapeNormalizer::normalize(
            &sample_cube(),
            &[Ticker::stock("B")],
            &["open".into(), "close".into()],
            flags(false, true, false),
        );
        assert_eq!(date_field.as_date_field().unwrap().get(1, 1), Some(211.0));
    }

    #[test]
    fn duplicate_ticker_yields_two_columns() {
        let a = Ticker::stock("A");
        let out = ShapeNormalizer::normalize(
            &sample_cube(),
            &[a.clone(), a],
            &["close".into()],
            flags(false, false, true),
        );
        let frame = out.as_date_ticker().unwrap();
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(frame.column(0), frame.column(1));
    }

    #[test]
    fn empty_cube_keeps_requested_labels() {
        let empty = DataCube::new(vec![], vec![], vec!["close".into()], vec![]);
        let tickers = [Ticker::stock("A"), Ticker::stock("B")];

        let out = ShapeNormalizer::normalize(&empty, &tickers, &["close".into()], flags(false, false, true));
        let frame = out.as_date_ticker().unwrap();
        assert_eq!(frame.shape(), (0, 2));
        assert_eq!(frame.columns(), &tickers);

        let single = ShapeNormalizer::normalize(&empty, &tickers, &["close".into()], flags(true, false, true));
        let series = single.as_ticker_series().unwrap();
        assert_eq!(series.index(), &tickers);
        assert_eq!(series.values(), &[None, None]);

        let scalar = ShapeNormalizer::normalize(&empty, &tickers[..1], &["close".into()], flags(true, true, true));
        assert_eq!(scalar, History::Scalar(None));
    }
}
