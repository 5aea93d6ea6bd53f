//! Core domain types and logic.

pub mod error;
pub mod timeframe;
pub mod candle;
pub mod indicator;
pub mod alignment;
pub mod signal;
pub mod position;
pub mod backtest;
pub mod metrics;
pub mod cancel;
pub mod fetcher;
pub mod cache;
pub mod acquisition;
pub mod live;
pub mod report;
pub mod config_validation;
