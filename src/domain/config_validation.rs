//! Configuration validation.
//!
//! Validates every section before any command touches the network or the
//! cache. Numeric keys that are present but unparseable are rejected here
//! instead of silently falling back to their defaults.

use crate::domain::error::TraderError;
use crate::domain::timeframe::{parse_timeframes, Timeframe};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_TIMEFRAMES: &str = "15m,1h,4h";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let timeframes = validate_market(config)?;
    validate_source(config)?;
    validate_cache(config)?;
    let period = validate_indicator(config)?;
    validate_weights(config, &timeframes)?;
    validate_backtest(config)?;
    validate_live(config, period)?;
    validate_notify(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn int(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, format!("'{raw}' is not an integer"))),
    }
}

fn double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

/// Configured timeframes, validated; the default set when absent.
pub fn configured_timeframes(config: &dyn ConfigPort) -> Result<Vec<Timeframe>, TraderError> {
    let raw = config
        .get_string("market", "timeframes")
        .unwrap_or_else(|| DEFAULT_TIMEFRAMES.to_string());
    let timeframes =
        parse_timeframes(&raw).map_err(|e| invalid("market", "timeframes", e.to_string()))?;
    if timeframes.is_empty() {
        return Err(invalid("market", "timeframes", "at least one timeframe is required"));
    }
    Ok(timeframes)
}

fn validate_market(config: &dyn ConfigPort) -> Result<Vec<Timeframe>, TraderError> {
    match config.get_string("market", "symbol") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(TraderError::ConfigMissing {
                section: "market".to_string(),
                key: "symbol".to_string(),
            })
        }
    }

    let timeframes = configured_timeframes(config)?;

    if let Some(base) = config.get_string("market", "base_timeframe") {
        let base = base
            .parse::<Timeframe>()
            .map_err(|e| invalid("market", "base_timeframe", e.to_string()))?;
        if !timeframes.contains(&base) {
            return Err(invalid(
                "market",
                "base_timeframe",
                format!("{base} is not one of the configured timeframes"),
            ));
        }
    }

    if int(config, "market", "history_days", 180)? < 1 {
        return Err(invalid("market", "history_days", "history_days must be at least 1"));
    }
    Ok(timeframes)
}

fn validate_source(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(endpoints) = config.get_list("source", "endpoints") {
        if endpoints.is_empty() {
            return Err(invalid("source", "endpoints", "at least one endpoint is required"));
        }
        if let Some(bad) = endpoints
            .iter()
            .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(invalid(
                "source",
                "endpoints",
                format!("'{bad}' is not an http(s) URL"),
            ));
        }
    }

    let page_size = int(config, "source", "page_size", 100)?;
    if !(1..=100).contains(&page_size) {
        return Err(invalid("source", "page_size", "page_size must be between 1 and 100"));
    }
    if int(config, "source", "retries_per_endpoint", 3)? < 1 {
        return Err(invalid(
            "source",
            "retries_per_endpoint",
            "retries_per_endpoint must be at least 1",
        ));
    }

    let backoff = int(config, "source", "backoff_ms", 500)?;
    if backoff < 0 {
        return Err(invalid("source", "backoff_ms", "backoff_ms must be non-negative"));
    }
    if int(config, "source", "max_backoff_ms", 4_000)? < backoff {
        return Err(invalid(
            "source",
            "max_backoff_ms",
            "max_backoff_ms must be at least backoff_ms",
        ));
    }
    if int(config, "source", "rate_limit_ms", 200)? < 0 {
        return Err(invalid("source", "rate_limit_ms", "rate_limit_ms must be non-negative"));
    }
    if int(config, "source", "timeout_secs", 30)? < 1 {
        return Err(invalid("source", "timeout_secs", "timeout_secs must be at least 1"));
    }
    Ok(())
}

fn validate_cache(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(dir) = config.get_string("cache", "dir") {
        if dir.trim().is_empty() {
            return Err(invalid("cache", "dir", "dir must not be empty"));
        }
    }
    if int(config, "cache", "retention_days", 7)? < 1 {
        return Err(invalid("cache", "retention_days", "retention_days must be at least 1"));
    }
    if int(config, "cache", "max_lag_hours", 24)? < 1 {
        return Err(invalid("cache", "max_lag_hours", "max_lag_hours must be at least 1"));
    }
    Ok(())
}

fn validate_indicator(config: &dyn ConfigPort) -> Result<i64, TraderError> {
    let period = int(config, "indicator", "period", 20)?;
    if period < 2 {
        return Err(invalid("indicator", "period", "period must be at least 2"));
    }
    if double(config, "indicator", "k", 2.0)? <= 0.0 {
        return Err(invalid("indicator", "k", "k must be positive"));
    }
    Ok(period)
}

fn validate_weights(config: &dyn ConfigPort, timeframes: &[Timeframe]) -> Result<(), TraderError> {
    for tf in timeframes {
        let section = format!("weights.{}", tf.label());
        for key in ["lower", "middle_support", "upper", "middle_resistance"] {
            let value = int(config, &section, key, 0)?;
            if i32::try_from(value).is_err() {
                return Err(invalid(&section, key, "weight out of range"));
            }
        }
    }
    Ok(())
}

fn validate_backtest(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if double(config, "backtest", "initial_capital", 100.0)? <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if double(config, "backtest", "leverage", 100.0)? <= 0.0 {
        return Err(invalid("backtest", "leverage", "leverage must be positive"));
    }
    let entry = int(config, "backtest", "entry_threshold", 3)?;
    if entry <= 0 {
        return Err(invalid(
            "backtest",
            "entry_threshold",
            "entry_threshold must be positive",
        ));
    }
    let exit = int(config, "backtest", "exit_threshold", -3)?;
    if exit >= 0 {
        return Err(invalid(
            "backtest",
            "exit_threshold",
            "exit_threshold must be negative",
        ));
    }
    if double(config, "backtest", "stop_loss_pct", -10.0)? >= 0.0 {
        return Err(invalid(
            "backtest",
            "stop_loss_pct",
            "stop_loss_pct must be negative",
        ));
    }
    Ok(())
}

fn validate_live(config: &dyn ConfigPort, period: i64) -> Result<(), TraderError> {
    if int(config, "live", "poll_secs", 5)? < 1 {
        return Err(invalid("live", "poll_secs", "poll_secs must be at least 1"));
    }
    if int(config, "live", "lookback_bars", 60)? < period {
        return Err(invalid(
            "live",
            "lookback_bars",
            format!("lookback_bars must be at least the indicator period ({period})"),
        ));
    }
    let fee_rate = double(config, "live", "fee_rate", 0.0)?;
    if !(0.0..1.0).contains(&fee_rate) {
        return Err(invalid("live", "fee_rate", "fee_rate must be in [0, 1)"));
    }
    Ok(())
}

fn validate_notify(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("notify", "webhook_url") {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => Err(invalid(
            "notify",
            "webhook_url",
            "webhook_url must be an http(s) URL",
        )),
        _ => Ok(()),
    }
}
