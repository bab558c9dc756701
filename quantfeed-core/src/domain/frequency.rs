//! Bar frequency.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar frequency, ordered by bar length (`Min1` is the smallest).
///
/// The order decides how the look-ahead guard rounds: everything from
/// `Daily` upwards is handled per calendar day, everything below per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Min1,
    Min5,
    Min10,
    Min15,
    Min30,
    Min60,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 11] = [
        Frequency::Min1,
        Frequency::Min5,
        Frequency::Min10,
        Frequency::Min15,
        Frequency::Min30,
        Frequency::Min60,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Yearly,
    ];

    /// True for frequencies shorter than one day.
    pub fn is_intraday(self) -> bool {
        self < Frequency::Daily
    }

    /// Length of one bar. Only defined for intraday frequencies; calendar
    /// frequencies have no fixed length.
    pub fn bar_duration(self) -> Option<chrono::Duration> {
        let minutes = match self {
            Frequency::Min1 => 1,
            Frequency::Min5 => 5,
            Frequency::Min10 => 10,
            Frequency::Min15 => 15,
            Frequency::Min30 => 30,
            Frequency::Min60 => 60,
            _ => return None,
        };
        Some(chrono::Duration::minutes(minutes))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Min1 => "1m",
            Frequency::Min5 => "5m",
            Frequency::Min10 => "10m",
            Frequency::Min15 => "15m",
            Frequency::Min30 => "30m",
            Frequency::Min60 => "60m",
            Frequency::Daily => "1d",
            Frequency::Weekly => "1w",
            Frequency::Monthly => "1mo",
            Frequency::Quarterly => "1q",
            Frequency::Yearly => "1y",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .or(match normalized.as_str() {
                "daily" | "day" => Some(Frequency::Daily),
                "weekly" | "week" => Some(Frequency::Weekly),
                "monthly" | "month" => Some(Frequency::Monthly),
                "quarterly" | "quarter" => Some(Frequency::Quarterly),
                "yearly" | "year" => Some(Frequency::Yearly),
                "1min" => Some(Frequency::Min1),
                "5min" => Some(Frequency::Min5),
                "10min" => Some(Frequency::Min10),
                "15min" => Some(Frequency::Min15),
                "30min" => Some(Frequency::Min30),
                "60min" => Some(Frequency::Min60),
                _ => None,
            })
            .ok_or_else(|| format!("unknown frequency '{s}'"))
    }
}
