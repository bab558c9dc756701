//! JSON quote gateway over blocking HTTP.
//!
//! Endpoints (all `POST`, JSON bodies):
//! - `/v1/session` opens a session: `{"ret":0,"msg":"","session_id":"…"}`
//! - `/v1/history_kline` returns one page:
//!   `{"ret":0,"msg":"","data":[{"time_key":"2025-01-02 00:00:00","close":1.0,…}],"page_req_key":"…"}`
//! - `/v1/session/close` releases the session.
//!
//! `ret != 0` rejects the request with `msg` as the reason. Connection
//! failures, timeouts, 429 and 5xx are retried with exponential backoff.

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use super::session::{KlinePage, KlineRequest, KlineRow, QuoteConnector, QuoteSession};
use crate::data::config::BrokerConfig;
use crate::data::error::DataError;

const TIME_KEY: &str = "time_key";

#[derive(Debug, Deserialize)]
struct Envelope {
    ret: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
    #[serde(default)]
    page_req_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct KlineBody<'a> {
    session_id: &'a str,
    code: &'a str,
    start: String,
    end: String,
    ktype: &'static str,
    fields: &'a [String],
    max_count: usize,
    autype: &'static str,
    page_req_key: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SessionBody<'a> {
    session_id: &'a str,
}

/// Why a call failed; the caller picks the `DataError` variant.
#[derive(Debug)]
enum CallError {
    /// Credentials rejected (401/403); not retried.
    Denied(String),
    Failed(String),
}

impl CallError {
    fn reason(self) -> String {
        match self {
            CallError::Denied(r) | CallError::Failed(r) => r,
        }
    }
}

#[derive(Clone)]
struct Transport {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

/// Delay before retry `attempt` (1-based): `base`, doubling, saturating.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

impl Transport {
    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, CallError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff(self.base_delay, attempt);
                log::debug!("retrying {url} in {delay:?} (attempt {attempt})");
                std::thread::sleep(delay);
            }

            match self.client.post(&url).json(body).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(CallError::Denied(format!("HTTP {status} from gateway")));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_error = Some(format!("HTTP {status} from gateway"));
                        continue;
                    }

                    if !status.is_success() {
                        return Err(CallError::Failed(format!("HTTP {status} from gateway")));
                    }

                    return resp
                        .json()
                        .map_err(|e| CallError::Failed(format!("malformed gateway response: {e}")));
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(e.to_string());
                        continue;
                    }
                    return Err(CallError::Failed(e.to_string()));
                }
            }
        }

        Err(CallError::Failed(
            last_error.unwrap_or_else(|| "max retries exceeded".into()),
        ))
    }
}

/// Opens sessions on an HTTP quote gateway.
pub struct HttpGatewayConnector {
    transport: Transport,
}

impl HttpGatewayConnector {
    pub fn new(config: &BrokerConfig) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::EnvironmentUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            transport: Transport {
                client,
                base_url: config.base_url.clone(),
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(500),
            },
        })
    }
}

impl QuoteConnector for HttpGatewayConnector {
    fn connect(&self) -> Result<Box<dyn QuoteSession>, DataError> {
        let unavailable =
            |reason: String| DataError::EnvironmentUnavailable(format!("quote gateway: {reason}"));

        let envelope: Envelope = self
            .transport
            .post("/v1/session", &serde_json::json!({}))
            .map_err(|e| unavailable(e.reason()))?;
        if envelope.ret != 0 {
            return Err(unavailable(envelope.msg));
        }
        let session_id = envelope
            .session_id
            .ok_or_else(|| unavailable("no session id in response".into()))?;

        log::info!("opened quote session {session_id}");
        Ok(Box::new(HttpQuoteSession {
            transport: self.transport.clone(),
            session_id,
            closed: false,
        }))
    }
}

struct HttpQuoteSession {
    transport: Transport,
    session_id: String,
    closed: bool,
}

impl QuoteSession for HttpQuoteSession {
    fn request_history_kline(&mut self, request: &KlineRequest) -> Result<KlinePage, DataError> {
        let unavailable = |reason: String| DataError::SourceUnavailable {
            ticker: request.code.clone(),
            reason,
        };

        let body = KlineBody {
            session_id: &self.session_id,
            code: &request.code,
            start: request.start.format("%Y-%m-%d").to_string(),
            end: request.end.format("%Y-%m-%d").to_string(),
            ktype: request.ktype.as_str(),
            fields: &request.fields,
            max_count: request.max_count,
            autype: if request.adjust { "qfq" } else { "none" },
            page_req_key: request.page_req_key.as_deref(),
        };

        let envelope: Envelope = self
            .transport
            .post("/v1/history_kline", &body)
            .map_err(|e| unavailable(e.reason()))?;
        parse_page(envelope).map_err(unavailable)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let body = SessionBody {
            session_id: &self.session_id,
        };
        if let Err(e) = self.transport.post::<_, Value>("/v1/session/close", &body) {
            log::warn!("closing quote session {} failed: {}", self.session_id, e.reason());
        }
    }
}

fn parse_page(envelope: Envelope) -> Result<KlinePage, String> {
    if envelope.ret != 0 {
        return Err(envelope.msg);
    }
    let rows = envelope
        .data
        .into_iter()
        .map(parse_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(KlinePage {
        rows,
        next_page: envelope.page_req_key.filter(|k| !k.is_empty()),
    })
}

/// Numeric members become values; `null` is "no value"; text members (code,
/// name) are ignored.
fn parse_row(mut row: Map<String, Value>) -> Result<KlineRow, String> {
    let time = match row.remove(TIME_KEY) {
        Some(Value::String(s)) => parse_time_key(&s)?,
        other => return Err(format!("row without {TIME_KEY}: {other:?}")),
    };

    let values: BTreeMap<String, Option<f64>> = row
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Number(n) => Some((key, n.as_f64())),
            Value::Null => Some((key, None)),
            _ => None,
        })
        .collect();

    Ok(KlineRow { time, values })
}

fn parse_time_key(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN)))
        .map_err(|e| format!("bad {TIME_KEY} '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff(base, 1), base);
        assert_eq!(backoff(base, 3), Duration::from_millis(2000));
        assert_eq!(backoff(base, 40), base.saturating_mul(u32::MAX));
    }

    fn envelope(json: &str) -> Envelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_page_with_continuation() {
        let page = parse_page(envelope(
            r#"{"ret":0,"msg":"","page_req_key":"abc","data":[
                {"code":"US.AAPL","time_key":"2025-01-02 00:00:00","close":151.0,"open":null,"volume":1200}
            ]}"#,
        ))
        .unwrap();

        assert_eq!(page.next_page.as_deref(), Some("abc"));
        let row = &page.rows[0];
        assert_eq!(row.time, parse_time_key("2025-01-02").unwrap());
        assert_eq!(row.values["close"], Some(151.0));
        assert_eq!(row.values["open"], None);
        assert_eq!(row.values["volume"], Some(1200.0));
        assert!(!row.values.contains_key("code"));
    }

    #[test]
    fn last_page_has_no_key() {
        let page = parse_page(envelope(r#"{"ret":0,"data":[],"page_req_key":""}"#)).unwrap();
        assert!(page.next_page.is_none());
        let page = parse_page(envelope(r#"{"ret":0,"data":[]}"#)).unwrap();
        assert!(page.next_page.is_none());
    }

    #[test]
    fn rejected_request_carries_message() {
        let err = parse_page(envelope(r#"{"ret":-1,"msg":"unknown stock"}"#)).unwrap_err();
        assert_eq!(err, "unknown stock");
    }

    #[test]
    fn row_without_time_key_is_malformed() {
        let row: Map<String, Value> = serde_json::from_str(r#"{"close":1.0}"#).unwrap();
        assert!(parse_row(row).is_err());
    }

    #[test]
    fn unreachable_gateway_is_environment_error() {
        let mut config = BrokerConfig::new("http://127.0.0.1:9");
        config.max_retries = 0;
        config.timeout_secs = 1;
        let connector = HttpGatewayConnector::new(&config).unwrap();
        assert!(matches!(
            connector.connect(),
            Err(DataError::EnvironmentUnavailable(_))
        ));
    }
}
