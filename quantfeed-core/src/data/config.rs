//! Provider configuration loaded from TOML.
//!
//! ```toml
//! [sessions]
//! open = "09:00:00"
//! close = "15:00:00"
//!
//! [archive]
//! region = "cn"
//! tickers = ["SH600000", "SZ000001"]
//! indices = ["csi300"]
//! fields = ["open", "close", "volume"]
//! start = "2020-01-01"
//! end = "2020-12-31"
//!
//! [broker]
//! base_url = "http://127.0.0.1:11111"
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::DataError;
use crate::domain::{Frequency, PriceField, Ticker};
use crate::time::SessionTimes;

/// Environment variable naming the archive root.
pub const ARCHIVE_DIR_ENV: &str = "QLIB_DIR";
/// Environment variable naming the archive region.
pub const ARCHIVE_REGION_ENV: &str = "QLIB_REGION";
pub const DEFAULT_REGION: &str = "cn";

/// Whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuantfeedConfig {
    #[serde(default)]
    pub sessions: SessionTimes,
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
}

impl QuantfeedConfig {
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content).map_err(|e| DataError::Config(format!("parse config TOML: {e}")))
    }
}

/// Snapshot loaded by the archive provider at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Archive root; see [`ArchiveConfig::resolve_path`].
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub region: Option<String>,
    /// Stock symbols.
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Index names, expanded to their constituents.
    #[serde(default)]
    pub indices: Vec<String>,
    #[serde(default = "default_archive_fields")]
    pub fields: Vec<String>,
    /// Archive column → canonical field. Enables `get_price`.
    #[serde(default)]
    pub field_map: BTreeMap<String, PriceField>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_frequency")]
    pub frequency: String,
}

fn default_archive_fields() -> Vec<String> {
    PriceField::ohlcv()
        .into_iter()
        .map(|f| f.as_str().to_string())
        .collect()
}

fn default_frequency() -> String {
    Frequency::Daily.as_str().to_string()
}

impl ArchiveConfig {
    /// Config for the given tickers with every other setting defaulted.
    pub fn new(tickers: Vec<Ticker>, start: NaiveDate, end: NaiveDate) -> Self {
        let (indices, stocks): (Vec<_>, Vec<_>) = tickers
            .into_iter()
            .partition(|t| t.kind() == crate::domain::SecurityKind::Index);
        Self {
            path: None,
            region: None,
            tickers: stocks.iter().map(|t| t.as_str().to_string()).collect(),
            indices: indices.iter().map(|t| t.as_str().to_string()).collect(),
            fields: default_archive_fields(),
            field_map: BTreeMap::new(),
            start,
            end,
            frequency: default_frequency(),
        }
    }

    /// Stocks first, then indices, in file order.
    pub fn ticker_list(&self) -> Vec<Ticker> {
        self.tickers
            .iter()
            .map(Ticker::stock)
            .chain(self.indices.iter().map(Ticker::index))
            .collect()
    }

    pub fn frequency(&self) -> Result<Frequency, DataError> {
        self.frequency.parse().map_err(DataError::Config)
    }

    /// `region`, else `$QLIB_REGION`, else `cn`.
    pub fn resolve_region(&self) -> String {
        self.resolve_region_with(|key| std::env::var(key).ok())
    }

    /// `path`, else `$QLIB_DIR`, else `~/.qlib/qlib_data/{region}_data`.
    pub fn resolve_path(&self) -> Result<PathBuf, DataError> {
        self.resolve_path_with(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    fn resolve_region_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        self.region
            .clone()
            .or_else(|| env(ARCHIVE_REGION_ENV))
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    fn resolve_path_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<PathBuf, DataError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if let Some(dir) = env(ARCHIVE_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let region = self.resolve_region_with(&env);
        home.map(|h| h.join(".qlib").join("qlib_data").join(format!("{region}_data")))
            .ok_or_else(|| {
                DataError::EnvironmentUnavailable(format!(
                    "no archive path configured, {ARCHIVE_DIR_ENV} unset and no home directory"
                ))
            })
    }
}

/// Brokerage gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Rows per kline page requested from the gateway.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_frequency")]
    pub default_frequency: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_page_size() -> usize {
    1000
}

impl BrokerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            page_size: default_page_size(),
            default_frequency: default_frequency(),
        }
    }

    pub fn frequency(&self) -> Result<Frequency, DataError> {
        self.default_frequency.parse().map_err(DataError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    const SAMPLE: &str = r#"
[sessions]
open = "09:00:00"
close = "15:00:00"

[archive]
tickers = ["SH600000"]
indices = ["csi300"]
start = "2020-01-01"
end = "2020-03-31"

[archive.field_map]
close = "close"
vwap = "open"

[broker]
base_url = "http://127.0.0.1:11111"
page_size = 500
"#;

    #[test]
    fn parses_full_file() {
        let config = QuantfeedConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.sessions.close, NaiveTime::from_hms_opt(15, 0, 0).unwrap());

        let archive = config.archive.unwrap();
        assert_eq!(archive.fields.len(), 5);
        assert_eq!(archive.frequency().unwrap(), Frequency::Daily);
        assert_eq!(archive.field_map["vwap"], PriceField::Open);
        let tickers = archive.ticker_list();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[1].kind(), crate::domain::SecurityKind::Index);

        let broker = config.broker.unwrap();
        assert_eq!(broker.page_size, 500);
        assert_eq!(broker.max_retries, 3);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = QuantfeedConfig::from_toml("").unwrap();
        assert!(config.archive.is_none());
        assert_eq!(config.sessions, SessionTimes::default());
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = QuantfeedConfig::from_toml("[archive\n").unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
    }

    #[test]
    fn path_resolution_order() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut config = ArchiveConfig::new(vec![Ticker::stock("A")], start, start);
        let home = Some(PathBuf::from("/home/q"));

        let no_env = |_: &str| None;
        assert_eq!(
            config.resolve_path_with(no_env, home.clone()).unwrap(),
            PathBuf::from("/home/q/.qlib/qlib_data/cn_data")
        );

        let region_env = |k: &str| (k == ARCHIVE_REGION_ENV).then(|| "us".to_string());
        assert_eq!(
            config.resolve_path_with(region_env, home.clone()).unwrap(),
            PathBuf::from("/home/q/.qlib/qlib_data/us_data")
        );

        let dir_env = |k: &str| (k == ARCHIVE_DIR_ENV).then(|| "/data/qlib".to_string());
        assert_eq!(
            config.resolve_path_with(dir_env, home.clone()).unwrap(),
            PathBuf::from("/data/qlib")
        );

        config.path = Some(PathBuf::from("/explicit"));
        assert_eq!(
            config.resolve_path_with(dir_env, home).unwrap(),
            PathBuf::from("/explicit")
        );

        config.path = None;
        assert!(matches!(
            config.resolve_path_with(no_env, None),
            Err(DataError::EnvironmentUnavailable(_))
        ));
    }
}
