//! Paginated history fetch with retry and endpoint failover.
//!
//! The fetcher walks backward from `until` toward `since`, one page of
//! candles older than the cursor per request. Transient failures rotate
//! round-robin through the configured endpoints with a doubling backoff, up to
//! `retries_per_endpoint` attempts per endpoint for the same page. Three empty
//! pages in a row mean the provider has no older history.
//!
//! All mutable fetch state (cursor, endpoint index, counters) lives on the
//! stack of a single [`HistoricalDataFetcher::fetch`] call, so one fetcher can
//! serve several threads without sharing rotation state.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::cancel::CancelToken;
use crate::domain::candle::{find_gaps, normalize_candles, Candle, GapViolation};
use crate::domain::error::{FetchError, SourceError};
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_source_port::{CandleSource, Endpoint, PageRequest};

/// Largest page the candle API serves.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub page_size: usize,
    pub retries_per_endpoint: usize,
    pub backoff: Duration,
    pub max_backoff: Duration,
    /// Pause after every successful request.
    pub rate_limit: Duration,
    pub max_empty_pages: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            retries_per_endpoint: 3,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(4_000),
            rate_limit: Duration::from_millis(200),
            max_empty_pages: 3,
        }
    }
}

impl FetchConfig {
    /// Same limits with every delay set to zero.
    pub fn without_delays(self) -> Self {
        Self {
            backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            rate_limit: Duration::ZERO,
            ..self
        }
    }
}

/// Why a successful fetch stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The cursor reached the requested start.
    ReachedStart,
    /// The provider returned consecutive empty pages before the start.
    HistoryExhausted,
}

#[derive(Debug, Clone)]
pub struct FetchedSeries {
    /// Sorted, unique, within `[since, until]`.
    pub candles: Vec<Candle>,
    pub termination: Termination,
    pub requests: usize,
    /// Spacing violations; the data is still returned.
    pub gaps: Vec<GapViolation>,
}

enum PageFailure {
    Exhausted { attempts: usize, last_error: String },
    Format(String),
}

pub struct HistoricalDataFetcher<S> {
    source: S,
    endpoints: Vec<Endpoint>,
    config: FetchConfig,
}

impl<S: CandleSource> HistoricalDataFetcher<S> {
    pub fn new(source: S, endpoints: Vec<Endpoint>, config: FetchConfig) -> Self {
        Self {
            source,
            endpoints,
            config,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        until: i64,
        cancel: &CancelToken,
    ) -> Result<FetchedSeries, FetchError> {
        if self.endpoints.is_empty() {
            return Err(FetchError::NoEndpoints);
        }

        let page_size = self.config.page_size.clamp(1, MAX_PAGE_SIZE);
        let page_width = page_size as i64 * timeframe.duration_ms();
        let max_empty = self.config.max_empty_pages.max(1);

        let mut cursor = until;
        let mut endpoint_idx = 0usize;
        let mut consecutive_empty = 0usize;
        let mut requests = 0usize;
        let mut collected: Vec<Candle> = Vec::new();

        let termination = loop {
            if cursor <= since {
                break Termination::ReachedStart;
            }
            if cancel.is_cancelled() {
                info!(symbol, %timeframe, "fetch cancelled");
                return Err(FetchError::Cancelled {
                    partial: finalize(collected, since, until),
                });
            }

            let request = PageRequest {
                instrument: symbol,
                timeframe,
                limit: page_size,
                older_than: Some(cursor),
                newer_than: None,
            };

            let page = match self.request_page(&request, &mut endpoint_idx, &mut requests) {
                Ok(page) => page,
                Err(PageFailure::Format(reason)) => {
                    warn!(symbol, %timeframe, %reason, "malformed page, aborting fetch");
                    return Err(FetchError::DataFormat { reason });
                }
                Err(PageFailure::Exhausted {
                    attempts,
                    last_error,
                }) => {
                    warn!(symbol, %timeframe, attempts, %last_error, "all endpoints exhausted");
                    return Err(FetchError::EndpointsExhausted {
                        partial: finalize(collected, since, until),
                        attempts,
                        last_error,
                    });
                }
            };

            if !self.config.rate_limit.is_zero() {
                thread::sleep(self.config.rate_limit);
            }

            match page.iter().map(|c| c.timestamp).min() {
                Some(oldest) if oldest < cursor => {
                    debug!(
                        symbol,
                        %timeframe,
                        count = page.len(),
                        oldest,
                        "fetched page"
                    );
                    collected.extend(page);
                    cursor = oldest;
                    consecutive_empty = 0;
                }
                _ => {
                    consecutive_empty += 1;
                    cursor -= page_width;
                    debug!(symbol, %timeframe, consecutive_empty, cursor, "empty page");
                    if consecutive_empty >= max_empty {
                        break Termination::HistoryExhausted;
                    }
                }
            }
        };

        let candles = finalize(collected, since, until);
        let gaps = find_gaps(&candles, timeframe);
        info!(
            symbol,
            %timeframe,
            candles = candles.len(),
            requests,
            gaps = gaps.len(),
            ?termination,
            "fetch complete"
        );

        Ok(FetchedSeries {
            candles,
            termination,
            requests,
            gaps,
        })
    }

    fn request_page(
        &self,
        request: &PageRequest<'_>,
        endpoint_idx: &mut usize,
        requests: &mut usize,
    ) -> Result<Vec<Candle>, PageFailure> {
        let budget = self.config.retries_per_endpoint.max(1) * self.endpoints.len();
        let mut delay = self.config.backoff;
        let mut last_error = String::new();

        for attempt in 1..=budget {
            let endpoint = &self.endpoints[*endpoint_idx];
            *requests += 1;

            match self.source.fetch_page(endpoint, request) {
                Ok(candles) => return Ok(candles),
                Err(SourceError::Format { reason }) => return Err(PageFailure::Format(reason)),
                Err(SourceError::Transient { reason }) => {
                    *endpoint_idx = (*endpoint_idx + 1) % self.endpoints.len();
                    warn!(
                        endpoint = %endpoint.name,
                        attempt,
                        budget,
                        %reason,
                        next = %self.endpoints[*endpoint_idx].name,
                        "page request failed, switching endpoint"
                    );
                    last_error = reason;
                    if attempt < budget && !delay.is_zero() {
                        thread::sleep(delay);
                        delay = (delay * 2).min(self.config.max_backoff);
                    }
                }
            }
        }

        Err(PageFailure::Exhausted {
            attempts: budget,
            last_error,
        })
    }
}

fn finalize(collected: Vec<Candle>, since: i64, until: i64) -> Vec<Candle> {
    normalize_candles(collected)
        .into_iter()
        .filter(|c| c.timestamp >= since && c.timestamp <= until)
        .collect()
}
