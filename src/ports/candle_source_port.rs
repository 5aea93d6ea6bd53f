//! Candle history source port.

use crate::domain::candle::Candle;
use crate::domain::error::SourceError;
use crate::domain::timeframe::Timeframe;

/// One API host the source can be queried through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub base_url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }
}

/// A single page query. Bounds are milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub instrument: &'a str,
    pub timeframe: Timeframe,
    pub limit: usize,
    /// Only candles strictly older than this.
    pub older_than: Option<i64>,
    /// Only candles strictly newer than this.
    pub newer_than: Option<i64>,
}

pub trait CandleSource {
    /// Fetch one page from `endpoint`. Candles may come back in any order.
    fn fetch_page(
        &self,
        endpoint: &Endpoint,
        request: &PageRequest<'_>,
    ) -> Result<Vec<Candle>, SourceError>;
}
