//! Long-only position state machine.
//!
//! States are FLAT (no position) and LONG (one open position). Each aligned
//! point is one step: an open position is checked for exit, otherwise the
//! point is checked for entry. A bar that closes a position never opens a
//! new one. Positions still open when the stream ends stay open.

use tracing::{debug, info};

use crate::domain::alignment::AlignedPoint;
use crate::domain::position::{ExitReason, Position, Trade};
use crate::domain::signal::{score, SignalScope, WeightTable};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub leverage: f64,
    /// Support score at or above which a FLAT engine goes LONG.
    pub entry_threshold: i32,
    /// Resistance score at or below which a LONG engine exits.
    pub exit_threshold: i32,
    /// Unrealized return, in percent of initial capital, that forces an exit.
    pub stop_loss_pct: f64,
    pub weights: WeightTable,
}

impl BacktestConfig {
    pub fn with_weights(weights: WeightTable) -> Self {
        Self {
            initial_capital: 100.0,
            leverage: 100.0,
            entry_threshold: 3,
            exit_threshold: -3,
            stop_loss_pct: -10.0,
            weights,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Flat,
    Long,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Opened(Position),
    Closed(Trade),
}

#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
    capital: f64,
    peak_capital: f64,
    max_drawdown: f64,
    position: Option<Position>,
    trades: Vec<Trade>,
    steps: usize,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        let capital = config.initial_capital;
        Self {
            config,
            capital,
            peak_capital: capital,
            max_drawdown: 0.0,
            position: None,
            trades: Vec::new(),
            steps: 0,
        }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        if self.position.is_some() {
            EngineState::Long
        } else {
            EngineState::Flat
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn peak_capital(&self) -> f64 {
        self.peak_capital
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Feed one aligned point through the state machine.
    pub fn step(&mut self, point: &AlignedPoint) -> Option<Transition> {
        let index = self.steps;
        self.steps += 1;

        let transition = match self.position.take() {
            Some(position) => self.check_exit(position, point),
            None => self.check_entry(point, index),
        };

        self.update_drawdown();
        transition
    }

    fn check_entry(&mut self, point: &AlignedPoint, index: usize) -> Option<Transition> {
        let support = score(point, &self.config.weights, SignalScope::Support);
        if support < self.config.entry_threshold || point.price <= 0.0 {
            return None;
        }
        if self.capital <= 0.0 {
            debug!(capital = self.capital, "no capital left, entry skipped");
            return None;
        }

        let size = self.capital * self.config.leverage / point.price;
        let position = Position {
            entry_price: point.price,
            entry_time: point.timestamp,
            size,
            entry_signal: support,
            entry_index: index,
        };
        info!(
            price = point.price,
            size,
            signal = support,
            timestamp = point.timestamp,
            "opened long"
        );
        self.position = Some(position.clone());
        Some(Transition::Opened(position))
    }

    fn check_exit(&mut self, position: Position, point: &AlignedPoint) -> Option<Transition> {
        let resistance = score(point, &self.config.weights, SignalScope::Resistance);
        let unrealized_pct = position.unrealized_pct(point.price, self.config.initial_capital);

        let reason = if resistance <= self.config.exit_threshold {
            ExitReason::Signal
        } else if unrealized_pct <= self.config.stop_loss_pct {
            ExitReason::StopLoss
        } else {
            debug!(resistance, unrealized_pct, "holding long");
            self.position = Some(position);
            return None;
        };

        let pnl = position.unrealized_pnl(point.price);
        self.capital += pnl;

        let trade = Trade {
            entry_price: position.entry_price,
            exit_price: point.price,
            entry_time: position.entry_time,
            exit_time: point.timestamp,
            size: position.size,
            pnl,
            pnl_percent: pnl / self.config.initial_capital * 100.0,
            holding_period: point.timestamp - position.entry_time,
            entry_signal: position.entry_signal,
            exit_signal: resistance,
            exit_reason: reason,
        };
        info!(
            price = point.price,
            pnl,
            capital = self.capital,
            reason = %reason,
            "closed long"
        );
        self.trades.push(trade.clone());
        Some(Transition::Closed(trade))
    }

    fn update_drawdown(&mut self) {
        if self.capital > self.peak_capital {
            self.peak_capital = self.capital;
        }
        if self.peak_capital > 0.0 {
            let dd = (self.peak_capital - self.capital) / self.peak_capital;
            if dd > self.max_drawdown {
                self.max_drawdown = dd;
            }
        }
    }

    pub fn finish(self) -> BacktestResult {
        BacktestResult {
            initial_capital: self.config.initial_capital,
            final_capital: self.capital,
            peak_capital: self.peak_capital,
            max_drawdown: self.max_drawdown,
            trades: self.trades,
            open_position: self.position,
            steps: self.steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub peak_capital: f64,
    pub max_drawdown: f64,
    pub trades: Vec<Trade>,
    /// Position left open when the stream ended; never force-closed.
    pub open_position: Option<Position>,
    pub steps: usize,
}

pub fn run_backtest(points: &[AlignedPoint], config: &BacktestConfig) -> BacktestResult {
    let mut engine = BacktestEngine::new(config.clone());
    for point in points {
        engine.step(point);
    }
    engine.finish()
}
