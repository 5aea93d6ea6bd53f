//! Performance metrics over closed trades.
//!
//! Only closed trades count; a position still open at the end of the run is
//! reported separately and does not enter the profit figures.

use serde::Serialize;

use super::backtest::BacktestResult;

/// Smallest loss magnitude used as the profit-factor denominator.
pub const PROFIT_FACTOR_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub total_profit_pct: f64,
    pub avg_profit: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    /// Mean holding period in milliseconds.
    pub avg_holding_period: f64,
    pub max_drawdown: f64,
    pub final_capital: f64,
    pub has_open_position: bool,
}

impl Metrics {
    pub fn compute(result: &BacktestResult) -> Self {
        let trades = &result.trades;

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding = 0i64;

        for trade in trades {
            let pnl = trade.pnl;
            if trade.is_win() {
                trades_won += 1;
                total_wins += pnl;
                if pnl > largest_win {
                    largest_win = pnl;
                }
            } else {
                trades_lost += 1;
                total_losses += pnl.abs();
                if pnl.abs() > largest_loss {
                    largest_loss = pnl.abs();
                }
            }
            total_holding += trade.holding_period;
        }

        let total_trades = trades.len();
        let total_profit = total_wins - total_losses;

        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let avg_profit = if total_trades > 0 {
            total_profit / total_trades as f64
        } else {
            0.0
        };

        let avg_holding_period = if total_trades > 0 {
            total_holding as f64 / total_trades as f64
        } else {
            0.0
        };

        let total_profit_pct = if result.initial_capital > 0.0 {
            total_profit / result.initial_capital * 100.0
        } else {
            0.0
        };

        Metrics {
            total_trades,
            trades_won,
            trades_lost,
            win_rate,
            total_profit,
            total_profit_pct,
            avg_profit,
            largest_win,
            largest_loss,
            profit_factor: total_wins / total_losses.max(PROFIT_FACTOR_FLOOR),
            avg_holding_period,
            max_drawdown: result.max_drawdown,
            final_capital: result.final_capital,
            has_open_position: result.open_position.is_some(),
        }
    }
}
