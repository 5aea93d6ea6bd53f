//! Technical indicators over close-price series.
//!
//! Every indicator returns one `Option` per input price. Entries inside the
//! warm-up window (index < period - 1) are `None`; a value at index `i` only
//! depends on prices at indices `<= i`.

pub mod bollinger;
pub mod sma;
pub mod stddev;

pub use bollinger::bollinger;
pub use sma::sma;
pub use stddev::stddev;

use crate::domain::candle::{closes, Candle};
use crate::domain::timeframe::Timeframe;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBand {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

impl BollingerBand {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerParams {
    pub period: usize,
    pub k: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self { period: 20, k: 2.0 }
    }
}

impl fmt::Display for BollingerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BOLLINGER({},{})", self.period, self.k)
    }
}

/// One timeframe's candles with their Bollinger bands, index-aligned 1:1.
#[derive(Debug, Clone)]
pub struct TimeframeSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub bands: Vec<Option<BollingerBand>>,
}

impl TimeframeSeries {
    /// Build the series, computing bands from the candle closes.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        params: BollingerParams,
    ) -> Self {
        let bands = bollinger(&closes(&candles), params.period, params.k);
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
            bands,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Number of entries with a defined band.
    pub fn defined_count(&self) -> usize {
        self.bands.iter().filter(|b| b.is_some()).count()
    }
}
