//! Freshness and retention rules over a [`CachePort`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::candle::{normalize_candles, Candle};
use crate::domain::error::TraderError;
use crate::domain::timeframe::Timeframe;
use crate::ports::cache_port::{CacheKey, CachePort};

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);
pub const DEFAULT_MAX_LAG: Duration = Duration::from_secs(24 * 3600);

pub struct DataCache<P> {
    port: P,
    retention: Duration,
    max_lag: Duration,
}

impl<P: CachePort> DataCache<P> {
    pub fn new(port: P, retention: Duration, max_lag: Duration) -> Self {
        Self {
            port,
            retention,
            max_lag,
        }
    }

    pub fn with_defaults(port: P) -> Self {
        Self::new(port, DEFAULT_RETENTION, DEFAULT_MAX_LAG)
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Entries are keyed by the UTC calendar day of `now`.
    pub fn key(symbol: &str, timeframe: Timeframe, now: DateTime<Utc>) -> CacheKey {
        CacheKey::new(symbol, timeframe, now.date_naive())
    }

    pub fn load(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<Candle>>, TraderError> {
        let key = Self::key(symbol, timeframe, now);
        let loaded = self.port.load(&key)?;
        match &loaded {
            Some(candles) => debug!(key = %key.stem(), candles = candles.len(), "cache hit"),
            None => debug!(key = %key.stem(), "cache miss"),
        }
        Ok(loaded)
    }

    /// A cached series is usable when its first bar covers `horizon` (ms)
    /// and its newest candle is no more than the allowed lag behind `now`.
    /// A first bar opening less than one bar width after `horizon` covers it.
    pub fn is_usable(
        &self,
        candles: &[Candle],
        timeframe: Timeframe,
        horizon: i64,
        now: DateTime<Utc>,
    ) -> bool {
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return false;
        };
        let max_lag_ms = i64::try_from(self.max_lag.as_millis()).unwrap_or(i64::MAX);
        first.timestamp < horizon.saturating_add(timeframe.duration_ms())
            && last.timestamp >= now.timestamp_millis() - max_lag_ms
    }

    /// Normalize and store `candles`; returns the series as written.
    pub fn save(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
        candles: Vec<Candle>,
    ) -> Result<Vec<Candle>, TraderError> {
        let key = Self::key(symbol, timeframe, now);
        let normalized = normalize_candles(candles);
        self.port.save(&key, &normalized)?;
        debug!(key = %key.stem(), candles = normalized.len(), "cache saved");
        Ok(normalized)
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize, TraderError> {
        let cutoff = SystemTime::from(now)
            .checked_sub(self.retention)
            .unwrap_or(UNIX_EPOCH);
        let removed = self.port.evict_older_than(cutoff)?;
        if removed > 0 {
            info!(removed, retention_days = self.retention.as_secs() / 86_400, "evicted cache entries");
        }
        Ok(removed)
    }
}
