//! Clocks and market sessions consumed by the look-ahead guard.

pub mod clock;
pub mod session;

pub use clock::{Clock, RealClock, SettableClock};
pub use session::{MarketCalendar, RegularSessions, SessionTimes};
