//! Open position and closed trade records.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub entry_price: f64,
    /// Entry bar timestamp, ms since epoch.
    pub entry_time: i64,
    pub size: f64,
    pub entry_signal: i32,
    pub entry_index: usize,
}

impl Position {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size
    }

    /// Unrealized pnl as a percentage of `capital_base`.
    pub fn unrealized_pct(&self, price: f64, capital_base: f64) -> f64 {
        if capital_base <= 0.0 {
            return 0.0;
        }
        self.unrealized_pnl(price) / capital_base * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    Signal,
    StopLoss,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => f.write_str("SIGNAL"),
            ExitReason::StopLoss => f.write_str("STOP_LOSS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: i64,
    pub exit_time: i64,
    pub size: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    /// Milliseconds between entry and exit.
    pub holding_period: i64,
    pub entry_signal: i32,
    pub exit_signal: i32,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_position() -> Position {
        Position {
            entry_price: 50.0,
            entry_time: 1_000,
            size: 100.0,
            entry_signal: 3,
            entry_index: 0,
        }
    }

    #[test]
    fn unrealized_pnl_profit() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_loss() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(45.0) - (-500.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pct_of_capital() {
        let pos = sample_position();
        assert!((pos.unrealized_pct(45.0, 1_000.0) - (-50.0)).abs() < 1e-12);
        assert!((pos.unrealized_pct(45.0, 0.0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exit_reason_display() {
        assert_eq!(ExitReason::Signal.to_string(), "SIGNAL");
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP_LOSS");
    }
}
