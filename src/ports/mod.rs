//! Port traits between the domain and the outside world.

pub mod cache_port;
pub mod candle_source_port;
pub mod config_port;
pub mod notification_port;
pub mod order_port;
pub mod report_port;
pub mod trade_log_port;
