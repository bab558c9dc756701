//! Clocks: the "current time" a provider guards against.
//!
//! Providers hold an `Arc<dyn Clock>` so a backtest can drive them with a
//! `SettableClock` while live code uses `RealClock`.

use chrono::NaiveDateTime;
use std::sync::RwLock;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Deterministic clock that only moves when told to.
#[derive(Debug)]
pub struct SettableClock {
    current: RwLock<NaiveDateTime>,
}

impl SettableClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            current: RwLock::new(at),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for SettableClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}
