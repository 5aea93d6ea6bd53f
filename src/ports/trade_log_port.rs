//! Append-only trade log port.

use serde::Serialize;

use crate::domain::error::TraderError;
use crate::domain::position::Trade;

/// One closed trade in the fixed trade-log schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeLogRecord {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "entryPrice")]
    pub entry_price: f64,
    #[serde(rename = "exitPrice")]
    pub exit_price: f64,
    pub size: f64,
    pub leverage: f64,
    pub profit: f64,
    pub fees: f64,
    #[serde(rename = "netProfit")]
    pub net_profit: f64,
    pub balance: f64,
    pub reason: String,
}

impl TradeLogRecord {
    /// Build a record for a closed long. Fees are charged on both legs'
    /// notional at `fee_rate`.
    pub fn from_trade(trade: &Trade, leverage: f64, fee_rate: f64, balance: f64) -> Self {
        let notional = trade.size * (trade.entry_price + trade.exit_price);
        let fees = notional * fee_rate;
        let date = chrono::DateTime::from_timestamp_millis(trade.exit_time)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| trade.exit_time.to_string());
        Self {
            date,
            kind: "LONG".to_string(),
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            size: trade.size,
            leverage,
            profit: trade.pnl,
            fees,
            net_profit: trade.pnl - fees,
            balance,
            reason: trade.exit_reason.to_string(),
        }
    }
}

pub trait TradeLogPort {
    fn append(&self, record: &TradeLogRecord) -> Result<(), TraderError>;
}
