//! Serializable summary of one backtest run.

use serde::Serialize;

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::indicator::BollingerParams;
use crate::domain::metrics::Metrics;
use crate::domain::position::{Position, Trade};
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunParameters {
    pub period: usize,
    pub k: f64,
    pub initial_capital: f64,
    pub leverage: f64,
    pub entry_threshold: i32,
    pub exit_threshold: i32,
    pub stop_loss_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub base_timeframe: String,
    pub timeframes: Vec<String>,
    pub parameters: RunParameters,
    pub points: usize,
    pub metrics: Metrics,
    pub trades: Vec<Trade>,
    pub open_position: Option<Position>,
}

impl BacktestReport {
    pub fn new(
        symbol: &str,
        base: Timeframe,
        timeframes: &[Timeframe],
        params: BollingerParams,
        config: &BacktestConfig,
        result: &BacktestResult,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            base_timeframe: base.to_string(),
            timeframes: timeframes.iter().map(|tf| tf.to_string()).collect(),
            parameters: RunParameters {
                period: params.period,
                k: params.k,
                initial_capital: config.initial_capital,
                leverage: config.leverage,
                entry_threshold: config.entry_threshold,
                exit_threshold: config.exit_threshold,
                stop_loss_pct: config.stop_loss_pct,
            },
            points: result.steps,
            metrics: Metrics::compute(result),
            trades: result.trades.clone(),
            open_position: result.open_position.clone(),
        }
    }
}
