//! Market session events (open / close trigger times per calendar day).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Queryable market open and close times.
pub trait MarketCalendar: Send + Sync {
    fn market_open(&self, date: NaiveDate) -> NaiveDateTime;
    fn market_close(&self, date: NaiveDate) -> NaiveDateTime;
}

/// Session times as they appear in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionTimes {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for SessionTimes {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Same open and close time every day. Both times can be changed at runtime.
#[derive(Debug)]
pub struct RegularSessions {
    times: RwLock<SessionTimes>,
}

impl RegularSessions {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self::from_times(SessionTimes { open, close })
    }

    pub fn from_times(times: SessionTimes) -> Self {
        Self {
            times: RwLock::new(times),
        }
    }

    pub fn set_open_time(&self, open: NaiveTime) {
        self.times.write().unwrap_or_else(|e| e.into_inner()).open = open;
    }

    pub fn set_close_time(&self, close: NaiveTime) {
        self.times.write().unwrap_or_else(|e| e.into_inner()).close = close;
    }

    pub fn times(&self) -> SessionTimes {
        *self.times.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RegularSessions {
    fn default() -> Self {
        Self::from_times(SessionTimes::default())
    }
}

impl MarketCalendar for RegularSessions {
    fn market_open(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.times().open)
    }

    fn market_close(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.times().close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_time_is_settable() {
        let sessions = RegularSessions::default();
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(sessions.market_close(day).time(), NaiveTime::from_hms_opt(16, 0, 0).unwrap());

        sessions.set_close_time(NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        sessions.set_open_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(sessions.market_close(day), day.and_hms_opt(15, 0, 0).unwrap());
        assert_eq!(sessions.market_open(day), day.and_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn session_times_parse_from_toml() {
        let times: SessionTimes = toml::from_str("open = \"09:00:00\"\nclose = \"15:00:00\"").unwrap();
        assert_eq!(times.close, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
    }
}
