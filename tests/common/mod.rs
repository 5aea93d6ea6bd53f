#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use bandtrader::domain::candle::Candle;
use bandtrader::domain::error::SourceError;
use bandtrader::domain::timeframe::Timeframe;
use bandtrader::ports::candle_source_port::{CandleSource, Endpoint, PageRequest};
use chrono::{DateTime, TimeZone, Utc};

pub const M15: i64 = 900_000;
pub const H1: i64 = 3_600_000;
pub const DAY: i64 = 86_400_000;

/// Serves pages out of a fixed per-timeframe history, newest first.
pub struct HistorySource {
    pub history: HashMap<Timeframe, Vec<Candle>>,
    calls: AtomicUsize,
}

impl HistorySource {
    pub fn new() -> Self {
        Self {
            history: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_series(mut self, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.history.insert(timeframe, candles);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CandleSource for HistorySource {
    fn fetch_page(
        &self,
        _endpoint: &Endpoint,
        request: &PageRequest<'_>,
    ) -> Result<Vec<Candle>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut page: Vec<Candle> = self
            .history
            .get(&request.timeframe)
            .map(|all| {
                all.iter()
                    .filter(|c| request.older_than.is_none_or(|t| c.timestamp < t))
                    .filter(|c| request.newer_than.is_none_or(|t| c.timestamp > t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        page.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        page.truncate(request.limit);
        Ok(page)
    }
}

pub fn endpoints() -> Vec<Endpoint> {
    vec![Endpoint::new("primary", "http://primary.test")]
}

pub fn candle(timestamp: i64, close: f64) -> Candle {
    Candle::new(timestamp, close, close + 0.5, close - 0.5, close, 10.0)
}

pub fn series(start: i64, step: i64, closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle(start + i as i64 * step, c))
        .collect()
}

/// Oscillating closes so bands stay defined and prices cross them.
pub fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + 8.0 * ((i as f64) / 6.0).sin() + (i % 4) as f64)
        .collect()
}

/// Forty 15m closes alternating 100/101 with a dip to 80 at bar 25 and a
/// spike to 130 at bar 33.
pub fn dip_and_spike() -> Vec<f64> {
    (0..40)
        .map(|i| match i {
            25 => 80.0,
            33 => 130.0,
            _ if i % 2 == 0 => 100.0,
            _ => 101.0,
        })
        .collect()
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

pub const VALID_INI: &str = r#"
[market]
symbol = SOL-USDT-SWAP
timeframes = 15m,1h
base_timeframe = 15m
history_days = 2

[source]
endpoints = https://www.okx.com, https://aws.okx.com
page_size = 100
retries_per_endpoint = 2
backoff_ms = 100
max_backoff_ms = 400
rate_limit_ms = 0

[indicator]
period = 20
k = 2.0

[weights.15m]
lower = 3

[backtest]
initial_capital = 100
leverage = 10
entry_threshold = 3
exit_threshold = -3
stop_loss_pct = -10

[live]
poll_secs = 5
lookback_bars = 40
"#;
