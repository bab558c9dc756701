//! Look-ahead guard.
//!
//! Turns a requested `[start, end]` into the window that may be disclosed at
//! the clock's current time. A bar is withheld until it is complete: daily and
//! coarser bars once the market close of their day has been reached, intraday
//! bars once their full duration has elapsed.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::sync::Arc;

use crate::domain::Frequency;
use crate::time::MarketCalendar;

/// Effective request window after normalization and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// The request covers a single bar; drives the date-axis squeeze.
    pub single_date: bool,
}

impl Window {
    /// True when nothing can fall inside the window.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

pub struct LookAheadGuard {
    calendar: Arc<dyn MarketCalendar>,
}

impl LookAheadGuard {
    pub fn new(calendar: Arc<dyn MarketCalendar>) -> Self {
        Self { calendar }
    }

    /// Full window computation used by every provider.
    pub fn window(
        &self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        frequency: Frequency,
        now: NaiveDateTime,
        allow_look_ahead: bool,
    ) -> Window {
        let start = adjust_start(start, frequency);
        let requested_end = normalize_end(end.unwrap_or(now), frequency);
        let end = self.clamp(requested_end, frequency, now, allow_look_ahead);
        // A one-bar request stays single when the clamp empties it; a range
        // becomes single when the clamp leaves exactly one bar.
        let single_date = got_single_date(start, requested_end, frequency)
            || (end >= start && got_single_date(start, end, frequency));

        Window {
            start,
            end,
            single_date,
        }
    }

    /// Latest end that does not disclose incomplete bars at `now`.
    pub fn clamp(
        &self,
        requested_end: NaiveDateTime,
        frequency: Frequency,
        now: NaiveDateTime,
        allow_look_ahead: bool,
    ) -> NaiveDateTime {
        let requested_end = normalize_end(requested_end, frequency);
        if allow_look_ahead {
            return requested_end;
        }
        requested_end.min(self.last_observable(now, frequency))
    }

    /// Boundary of the most recent bar that is fully observable at `now`.
    pub fn last_observable(&self, now: NaiveDateTime, frequency: Frequency) -> NaiveDateTime {
        let now = truncate_seconds(now);
        match frequency.bar_duration() {
            Some(bar) => now - bar,
            None => {
                let today = now.date();
                if now >= self.calendar.market_close(today) {
                    end_of_day(today)
                } else {
                    end_of_day(today - Duration::days(1))
                }
            }
        }
    }
}

/// Daily and coarser: beginning of the day. Intraday: seconds dropped.
pub fn adjust_start(start: NaiveDateTime, frequency: Frequency) -> NaiveDateTime {
    if frequency.is_intraday() {
        truncate_seconds(start)
    } else {
        start.date().and_time(NaiveTime::MIN)
    }
}

/// Daily and coarser: end of the day, so a date-only end covers the whole
/// day. Intraday: seconds dropped.
pub fn normalize_end(end: NaiveDateTime, frequency: Frequency) -> NaiveDateTime {
    if frequency.is_intraday() {
        truncate_seconds(end)
    } else {
        end_of_day(end.date())
    }
}

/// Whether `[start, end]` spans exactly one bar of `frequency`.
pub fn got_single_date(start: NaiveDateTime, end: NaiveDateTime, frequency: Frequency) -> bool {
    match frequency.bar_duration() {
        Some(bar) => end >= start && end < start + bar,
        None => start.date() == end.date(),
    }
}

fn truncate_seconds(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1)
}
