//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod file_cache_adapter;
pub mod memory_cache_adapter;
pub mod okx_adapter;
pub mod csv_trade_log_adapter;
pub mod webhook_notifier;
pub mod simulated_order_adapter;
pub mod json_report_adapter;
