//! Cache-checked acquisition of candle history for every configured timeframe.
//!
//! A usable cached series is returned as is. Otherwise the history is fetched,
//! gap violations are logged and the result is written back to the cache. If
//! the fetch fails terminally the previously cached series is used even when
//! stale; with nothing cached the failure is returned to the caller.

use std::thread;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::domain::alignment::{align, AlignedPoint};
use crate::domain::cache::DataCache;
use crate::domain::cancel::CancelToken;
use crate::domain::candle::{merge_candles, Candle};
use crate::domain::error::{FetchError, TraderError};
use crate::domain::fetcher::HistoricalDataFetcher;
use crate::domain::indicator::{BollingerParams, TimeframeSeries};
use crate::domain::timeframe::Timeframe;
use crate::ports::cache_port::CachePort;
use crate::ports::candle_source_port::CandleSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleOrigin {
    Cache,
    Fetched,
    /// Fetch failed; an older cached series was used instead.
    StaleCache,
}

#[derive(Debug, Clone)]
pub struct Acquired {
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub origin: CandleOrigin,
}

pub struct Acquisition<'a, S, P> {
    fetcher: &'a HistoricalDataFetcher<S>,
    cache: &'a DataCache<P>,
}

impl<'a, S: CandleSource, P: CachePort> Acquisition<'a, S, P> {
    pub fn new(fetcher: &'a HistoricalDataFetcher<S>, cache: &'a DataCache<P>) -> Self {
        Self { fetcher, cache }
    }

    /// Candles for `[since, now]`, from cache when usable.
    pub fn acquire(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Acquired, TraderError> {
        let cached = self.cache.load(symbol, timeframe, now)?;
        if let Some(candles) = &cached {
            if self.cache.is_usable(candles, timeframe, since, now) {
                info!(symbol, %timeframe, candles = candles.len(), "using cached history");
                return Ok(Acquired {
                    timeframe,
                    candles: candles.clone(),
                    origin: CandleOrigin::Cache,
                });
            }
        }

        self.fetch_and_store(symbol, timeframe, since, now, cached, cancel)
    }

    /// Extend today's cache entry with newly fetched candles. Only the span
    /// after the newest cached candle is requested when the entry already
    /// reaches back to `since`.
    pub fn refresh(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Acquired, TraderError> {
        let cached = self.cache.load(symbol, timeframe, now)?;
        let fetch_from = match cached.as_deref() {
            Some([first, .., last]) if first.timestamp < since + timeframe.duration_ms() => {
                last.timestamp
            }
            _ => since,
        };
        self.fetch_and_store(symbol, timeframe, fetch_from, now, cached, cancel)
    }

    fn fetch_and_store(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        now: DateTime<Utc>,
        cached: Option<Vec<Candle>>,
        cancel: &CancelToken,
    ) -> Result<Acquired, TraderError> {
        match self
            .fetcher
            .fetch(symbol, timeframe, since, now.timestamp_millis(), cancel)
        {
            Ok(series) => {
                for gap in &series.gaps {
                    warn!(
                        symbol,
                        %timeframe,
                        previous = gap.previous,
                        current = gap.current,
                        expected_ms = gap.expected_ms,
                        actual_ms = gap.actual_ms(),
                        "gap in candle series"
                    );
                }
                let merged = match &cached {
                    Some(old) => merge_candles(old, &series.candles),
                    None => series.candles,
                };
                let candles = self.cache.save(symbol, timeframe, now, merged)?;
                Ok(Acquired {
                    timeframe,
                    candles,
                    origin: CandleOrigin::Fetched,
                })
            }
            Err(FetchError::Cancelled { .. }) => Err(TraderError::Cancelled),
            Err(e) => match cached {
                Some(candles) if !candles.is_empty() => {
                    warn!(
                        symbol,
                        %timeframe,
                        error = %e,
                        candles = candles.len(),
                        "fetch failed, falling back to stale cache"
                    );
                    Ok(Acquired {
                        timeframe,
                        candles,
                        origin: CandleOrigin::StaleCache,
                    })
                }
                _ => {
                    error!(symbol, %timeframe, error = %e, "fetch failed with nothing cached");
                    Err(TraderError::Fetch {
                        symbol: symbol.to_string(),
                        timeframe: timeframe.to_string(),
                        source: e,
                    })
                }
            },
        }
    }

    /// One timeframe after another, stopping between timeframes on cancel.
    pub fn acquire_all(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
        since: i64,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Vec<Acquired>, TraderError> {
        let mut out = Vec::with_capacity(timeframes.len());
        for &timeframe in timeframes {
            if cancel.is_cancelled() {
                return Err(TraderError::Cancelled);
            }
            out.push(self.acquire(symbol, timeframe, since, now, cancel)?);
        }
        Ok(out)
    }

    /// One scoped thread per timeframe. Results keep the order of
    /// `timeframes`; the first error wins.
    pub fn acquire_all_parallel(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
        since: i64,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Vec<Acquired>, TraderError>
    where
        S: Sync,
    {
        let results: Vec<Result<Acquired, TraderError>> = thread::scope(|scope| {
            let handles: Vec<_> = timeframes
                .iter()
                .map(|&timeframe| {
                    scope.spawn(move || self.acquire(symbol, timeframe, since, now, cancel))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(TraderError::Io(std::io::Error::other(
                            "acquisition thread panicked",
                        )))
                    })
                })
                .collect()
        });
        results.into_iter().collect()
    }
}

/// Offline read of today's cache entry; a miss is insufficient data.
pub fn load_cached<P: CachePort>(
    cache: &DataCache<P>,
    symbol: &str,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Result<Acquired, TraderError> {
    match cache.load(symbol, timeframe, now)? {
        Some(candles) if !candles.is_empty() => Ok(Acquired {
            timeframe,
            candles,
            origin: CandleOrigin::Cache,
        }),
        _ => Err(TraderError::InsufficientData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            bars: 0,
            minimum: 1,
        }),
    }
}

/// Compute bands per timeframe and align them on `base`.
///
/// Every timeframe needs at least `params.period` candles, otherwise no band
/// is ever defined and nothing can be aligned.
pub fn prepare_points(
    symbol: &str,
    base: Timeframe,
    acquired: Vec<Acquired>,
    params: BollingerParams,
) -> Result<Vec<AlignedPoint>, TraderError> {
    let mut base_series = None;
    let mut others = Vec::new();

    for a in acquired {
        if a.candles.len() < params.period {
            return Err(TraderError::InsufficientData {
                symbol: symbol.to_string(),
                timeframe: a.timeframe.to_string(),
                bars: a.candles.len(),
                minimum: params.period,
            });
        }
        let series = TimeframeSeries::new(symbol, a.timeframe, a.candles, params);
        if a.timeframe == base {
            base_series = Some(series);
        } else {
            others.push(series);
        }
    }

    let base_series = base_series.ok_or_else(|| TraderError::InsufficientData {
        symbol: symbol.to_string(),
        timeframe: base.to_string(),
        bars: 0,
        minimum: params.period,
    })?;

    Ok(align(&base_series, &others))
}
