//! Live signal loop.
//!
//! Every tick pulls the most recent `lookback_bars` candles of each timeframe,
//! recomputes the bands, aligns them and feeds the newest aligned point that
//! has not been seen yet into a long-lived [`BacktestEngine`]. Position
//! changes are forwarded to the order, trade-log and notification ports.

use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::acquisition::{prepare_points, Acquired, CandleOrigin};
use crate::domain::backtest::{BacktestConfig, BacktestEngine, Transition};
use crate::domain::cancel::CancelToken;
use crate::domain::error::{FetchError, TraderError};
use crate::domain::fetcher::HistoricalDataFetcher;
use crate::domain::indicator::BollingerParams;
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_source_port::CandleSource;
use crate::ports::notification_port::NotificationPort;
use crate::ports::order_port::OrderPort;
use crate::ports::trade_log_port::{TradeLogPort, TradeLogRecord};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub poll_interval: Duration,
    pub lookback_bars: usize,
    pub fee_rate: f64,
    /// Stop after this many ticks; run until cancelled when `None`.
    pub iterations: Option<usize>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            lookback_bars: 60,
            fee_rate: 0.0,
            iterations: None,
        }
    }
}

/// Outbound sinks a live session reports position changes to.
#[derive(Clone, Copy)]
pub struct LivePorts<'a> {
    pub orders: &'a dyn OrderPort,
    pub trade_log: &'a dyn TradeLogPort,
    pub notifier: &'a dyn NotificationPort,
}

pub struct LiveSession<'a, S> {
    fetcher: &'a HistoricalDataFetcher<S>,
    ports: LivePorts<'a>,
    symbol: String,
    base: Timeframe,
    timeframes: Vec<Timeframe>,
    params: BollingerParams,
    config: LiveConfig,
    engine: BacktestEngine,
    last_processed: Option<i64>,
}

impl<'a, S: CandleSource> LiveSession<'a, S> {
    pub fn new(
        fetcher: &'a HistoricalDataFetcher<S>,
        ports: LivePorts<'a>,
        symbol: impl Into<String>,
        base: Timeframe,
        timeframes: Vec<Timeframe>,
        params: BollingerParams,
        backtest: BacktestConfig,
        config: LiveConfig,
    ) -> Self {
        Self {
            fetcher,
            ports,
            symbol: symbol.into(),
            base,
            timeframes,
            params,
            config,
            engine: BacktestEngine::new(backtest),
            last_processed: None,
        }
    }

    pub fn engine(&self) -> &BacktestEngine {
        &self.engine
    }

    pub fn last_processed(&self) -> Option<i64> {
        self.last_processed
    }

    /// One poll: returns the transition the newest point produced, if any.
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Option<Transition>, TraderError> {
        let until = now.timestamp_millis();
        let mut acquired = Vec::with_capacity(self.timeframes.len());

        for &timeframe in &self.timeframes {
            let since = until - self.config.lookback_bars as i64 * timeframe.duration_ms();
            let series = self
                .fetcher
                .fetch(&self.symbol, timeframe, since, until, cancel)
                .map_err(|e| match e {
                    FetchError::Cancelled { .. } => TraderError::Cancelled,
                    other => TraderError::Fetch {
                        symbol: self.symbol.clone(),
                        timeframe: timeframe.to_string(),
                        source: other,
                    },
                })?;
            acquired.push(Acquired {
                timeframe,
                candles: series.candles,
                origin: CandleOrigin::Fetched,
            });
        }

        let points = prepare_points(&self.symbol, self.base, acquired, self.params)?;
        let Some(point) = points.last() else {
            warn!(symbol = %self.symbol, "no aligned point available yet");
            return Ok(None);
        };

        if self.last_processed.is_some_and(|ts| point.timestamp <= ts) {
            debug!(timestamp = point.timestamp, "no new bar");
            return Ok(None);
        }
        self.last_processed = Some(point.timestamp);

        let transition = self.engine.step(point);
        if let Some(t) = &transition {
            self.dispatch(t)?;
        }
        Ok(transition)
    }

    fn dispatch(&self, transition: &Transition) -> Result<(), TraderError> {
        match transition {
            Transition::Opened(position) => {
                self.ports
                    .orders
                    .open_long(&self.symbol, position.size, position.entry_price)?;
                self.ports.notifier.notify(&format!(
                    "{} LONG opened at {:.4}, size {:.4}, signal {}",
                    self.symbol, position.entry_price, position.size, position.entry_signal
                ));
            }
            Transition::Closed(trade) => {
                self.ports
                    .orders
                    .close_long(&self.symbol, trade.size, trade.exit_price)?;
                let record = TradeLogRecord::from_trade(
                    trade,
                    self.engine.config().leverage,
                    self.config.fee_rate,
                    self.engine.capital(),
                );
                self.ports.trade_log.append(&record)?;
                self.ports.notifier.notify(&format!(
                    "{} LONG closed at {:.4} ({}), pnl {:.4}, balance {:.4}",
                    self.symbol,
                    trade.exit_price,
                    trade.exit_reason,
                    trade.pnl,
                    self.engine.capital()
                ));
            }
        }
        Ok(())
    }

    /// Poll until cancelled or the iteration limit is reached. Fetch and
    /// data shortfalls are logged and retried on the next tick; port
    /// failures end the session. Returns the number of ticks run.
    pub fn run<C>(&mut self, cancel: &CancelToken, clock: C) -> Result<usize, TraderError>
    where
        C: Fn() -> DateTime<Utc>,
    {
        info!(
            symbol = %self.symbol,
            base = %self.base,
            timeframes = ?self.timeframes,
            "live session started"
        );
        let mut ticks = 0usize;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.tick(clock(), cancel) {
                Ok(_) => {}
                Err(TraderError::Cancelled) => break,
                Err(e @ (TraderError::Fetch { .. } | TraderError::InsufficientData { .. })) => {
                    error!(error = %e, "tick failed");
                }
                Err(e) => return Err(e),
            }
            ticks += 1;

            if self.config.iterations.is_some_and(|n| ticks >= n) {
                break;
            }
            sleep_unless_cancelled(self.config.poll_interval, cancel);
        }

        info!(ticks, trades = self.engine.trades().len(), "live session stopped");
        Ok(ticks)
    }
}

fn sleep_unless_cancelled(total: Duration, cancel: &CancelToken) {
    let deadline = Instant::now() + total;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
