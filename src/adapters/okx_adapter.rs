//! OKX history-candles client over blocking `reqwest`.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::error::{SourceError, TraderError};
use crate::ports::candle_source_port::{CandleSource, Endpoint, PageRequest};

pub const HISTORY_CANDLES_PATH: &str = "/api/v5/market/history-candles";

/// Production host first, then the AWS mirror.
pub const DEFAULT_ENDPOINTS: [(&str, &str); 2] = [
    ("okx", "https://www.okx.com"),
    ("okx-aws", "https://aws.okx.com"),
];

pub fn default_endpoints() -> Vec<Endpoint> {
    DEFAULT_ENDPOINTS
        .iter()
        .map(|(name, url)| Endpoint::new(*name, *url))
        .collect()
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

pub struct OkxAdapter {
    client: Client,
}

impl OkxAdapter {
    pub fn new(timeout: Duration) -> Result<Self, TraderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TraderError::Io(std::io::Error::other(e)))?;
        Ok(Self { client })
    }

    fn parse_rows(rows: &[Vec<Value>]) -> Result<Vec<Candle>, SourceError> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() < 6 {
                    return Err(SourceError::Format {
                        reason: format!("row {i} has {} fields, expected at least 6", row.len()),
                    });
                }
                let ts_sec = number(&row[0], i, "timestamp")?;
                Ok(Candle::new(
                    (ts_sec * 1000.0).round() as i64,
                    number(&row[1], i, "open")?,
                    number(&row[2], i, "high")?,
                    number(&row[3], i, "low")?,
                    number(&row[4], i, "close")?,
                    number(&row[5], i, "volume")?,
                ))
            })
            .collect()
    }
}

/// Numeric field sent either as a JSON number or a numeric string.
fn number(value: &Value, row: usize, field: &str) -> Result<f64, SourceError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| SourceError::Format {
            reason: format!("row {row}: invalid {field} {value}"),
        })
}

fn code_is_ok(code: &Value) -> bool {
    match code {
        Value::Null => true,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s.trim() == "0",
        _ => false,
    }
}

impl CandleSource for OkxAdapter {
    fn fetch_page(
        &self,
        endpoint: &Endpoint,
        request: &PageRequest<'_>,
    ) -> Result<Vec<Candle>, SourceError> {
        let url = format!(
            "{}{}",
            endpoint.base_url.trim_end_matches('/'),
            HISTORY_CANDLES_PATH
        );

        let mut query = vec![
            ("instId", request.instrument.to_string()),
            ("bar", request.timeframe.bar_token().to_string()),
            ("limit", request.limit.min(100).to_string()),
        ];
        if let Some(older) = request.older_than {
            query.push(("after", older.div_euclid(1000).to_string()));
        }
        if let Some(newer) = request.newer_than {
            query.push(("before", newer.div_euclid(1000).to_string()));
        }

        debug!(endpoint = %endpoint.name, ?query, "requesting candles");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .map_err(|e| SourceError::Transient {
                reason: format!("{}: {e}", endpoint.name),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Transient {
                reason: format!("{}: HTTP {status}", endpoint.name),
            });
        }

        let body = response.text().map_err(|e| SourceError::Transient {
            reason: format!("{}: reading body: {e}", endpoint.name),
        })?;
        let parsed: CandleResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Format {
                reason: format!("{}: {e}", endpoint.name),
            })?;

        if !code_is_ok(&parsed.code) {
            return Err(SourceError::Transient {
                reason: format!("{}: API code {} {}", endpoint.name, parsed.code, parsed.msg),
            });
        }

        Self::parse_rows(&parsed.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use mockito::Matcher;

    fn adapter() -> OkxAdapter {
        OkxAdapter::new(Duration::from_secs(5)).unwrap()
    }

    fn request(older_than: Option<i64>) -> PageRequest<'static> {
        PageRequest {
            instrument: "SOL-USDT-SWAP",
            timeframe: Timeframe::H1,
            limit: 100,
            older_than,
            newer_than: None,
        }
    }

    #[test]
    fn parses_page_and_converts_to_millis() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", HISTORY_CANDLES_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("instId".into(), "SOL-USDT-SWAP".into()),
                Matcher::UrlEncoded("bar".into(), "1H".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("after".into(), "1700003600".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"code":"0","msg":"","data":[
                    ["1700000000","20.1","20.5","19.9","20.3","1500","0","0","1"],
                    ["1699996400","19.8","20.2","19.7","20.1","900","0","0","1"]
                ]}"#,
            )
            .create();

        let endpoint = Endpoint::new("mock", server.url());
        let candles = adapter()
            .fetch_page(&endpoint, &request(Some(1_700_003_600_500)))
            .unwrap();

        mock.assert();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_000_000);
        assert!((candles[0].close - 20.3).abs() < 1e-12);
        assert!((candles[1].volume - 900.0).abs() < 1e-12);
    }

    #[test]
    fn nonzero_code_is_transient() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", HISTORY_CANDLES_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":"50011","msg":"Too Many Requests","data":[]}"#)
            .create();

        let err = adapter()
            .fetch_page(&Endpoint::new("mock", server.url()), &request(None))
            .unwrap_err();
        match err {
            SourceError::Transient { reason } => assert!(reason.contains("50011")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn http_error_is_transient() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", HISTORY_CANDLES_PATH)
            .match_query(Matcher::Any)
            .with_status(503)
            .create();

        let err = adapter()
            .fetch_page(&Endpoint::new("mock", server.url()), &request(None))
            .unwrap_err();
        assert!(matches!(err, SourceError::Transient { .. }));
    }

    #[test]
    fn malformed_row_is_format_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", HISTORY_CANDLES_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":"0","msg":"","data":[["1700000000","abc","1","1","1","1"]]}"#)
            .create();

        let err = adapter()
            .fetch_page(&Endpoint::new("mock", server.url()), &request(None))
            .unwrap_err();
        assert!(matches!(err, SourceError::Format { .. }));
    }

    #[test]
    fn invalid_json_is_format_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", HISTORY_CANDLES_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create();

        let err = adapter()
            .fetch_page(&Endpoint::new("mock", server.url()), &request(None))
            .unwrap_err();
        assert!(matches!(err, SourceError::Format { .. }));
    }

    #[test]
    fn unreachable_host_is_transient() {
        let endpoint = Endpoint::new("dead", "http://127.0.0.1:9");
        let err = adapter().fetch_page(&endpoint, &request(None)).unwrap_err();
        assert!(matches!(err, SourceError::Transient { .. }));
    }

    #[test]
    fn numeric_fields_accept_numbers() {
        let rows = vec![vec![
            Value::from(1_700_000_000),
            Value::from(1.0),
            Value::from(2.0),
            Value::from(0.5),
            Value::from(1.5),
            Value::from(10),
        ]];
        let candles = OkxAdapter::parse_rows(&rows).unwrap();
        assert_eq!(candles[0].timestamp, 1_700_000_000_000);
    }

    #[test]
    fn default_endpoints_order() {
        let eps = default_endpoints();
        assert_eq!(eps[0].base_url, "https://www.okx.com");
        assert_eq!(eps[1].base_url, "https://aws.okx.com");
    }
}
