//! Candle cache storage port.

use chrono::NaiveDate;
use std::time::SystemTime;

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub day: NaiveDate,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, day: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            day,
        }
    }

    /// `<symbol>_<timeframe>_<YYYY-MM-DD>`
    pub fn stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.symbol.replace('/', "-"),
            self.timeframe.label(),
            self.day.format("%Y-%m-%d")
        )
    }
}

/// Storage for per-(symbol, timeframe, day) candle arrays.
///
/// Implementations must make `save` atomic per key: a concurrent or
/// interrupted write never leaves a partially written entry behind.
pub trait CachePort: Send + Sync {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<Candle>>, TraderError>;

    fn save(&self, key: &CacheKey, candles: &[Candle]) -> Result<(), TraderError>;

    /// Remove every entry whose storage time is older than `cutoff`; returns
    /// the number of entries removed.
    fn evict_older_than(&self, cutoff: SystemTime) -> Result<usize, TraderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_format() {
        let key = CacheKey::new(
            "SOL-USDT-SWAP",
            Timeframe::H1,
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        );
        assert_eq!(key.stem(), "SOL-USDT-SWAP_1h_2024-03-09");
    }

    #[test]
    fn stem_replaces_slash() {
        let key = CacheKey::new(
            "BTC/USDT",
            Timeframe::M15,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert_eq!(key.stem(), "BTC-USDT_15m_2024-01-01");
    }
}
