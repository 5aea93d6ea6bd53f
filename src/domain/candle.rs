//! OHLCV candle representation and series hygiene.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::timeframe::Timeframe;

/// Allowed deviation from the nominal bar spacing before a gap is flagged.
pub const GAP_TOLERANCE_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Sort ascending and drop duplicate timestamps; for duplicates the entry that
/// appears last in the input wins.
pub fn normalize_candles(candles: Vec<Candle>) -> Vec<Candle> {
    let by_ts: BTreeMap<i64, Candle> = candles.into_iter().map(|c| (c.timestamp, c)).collect();
    by_ts.into_values().collect()
}

/// Merge a previously stored series with newer data; `newer` overrides `older`
/// on equal timestamps.
pub fn merge_candles(older: &[Candle], newer: &[Candle]) -> Vec<Candle> {
    let combined: Vec<Candle> = older.iter().chain(newer.iter()).cloned().collect();
    normalize_candles(combined)
}

/// A spacing between two consecutive candles that differs from the timeframe's
/// nominal duration by more than [`GAP_TOLERANCE_MS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapViolation {
    pub index: usize,
    pub previous: i64,
    pub current: i64,
    pub expected_ms: i64,
}

impl GapViolation {
    pub fn actual_ms(&self) -> i64 {
        self.current - self.previous
    }
}

pub fn find_gaps(candles: &[Candle], timeframe: Timeframe) -> Vec<GapViolation> {
    let expected_ms = timeframe.duration_ms();
    candles
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let diff = w[1].timestamp - w[0].timestamp;
            if (diff - expected_ms).abs() > GAP_TOLERANCE_MS {
                Some(GapViolation {
                    index: i + 1,
                    previous: w[0].timestamp,
                    current: w[1].timestamp,
                    expected_ms,
                })
            } else {
                None
            }
        })
        .collect()
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
