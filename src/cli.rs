//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_trade_log_adapter::CsvTradeLogAdapter;
use crate::adapters::file_cache_adapter::FileCacheAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::okx_adapter::{default_endpoints, OkxAdapter};
use crate::adapters::simulated_order_adapter::SimulatedOrderAdapter;
use crate::adapters::webhook_notifier::{LogNotifier, WebhookNotifier};
use crate::domain::acquisition::{load_cached, prepare_points, Acquired, Acquisition};
use crate::domain::backtest::{run_backtest as run_engine, BacktestConfig};
use crate::domain::cache::DataCache;
use crate::domain::cancel::CancelToken;
use crate::domain::config_validation::{configured_timeframes, validate_config};
use crate::domain::error::TraderError;
use crate::domain::fetcher::{FetchConfig, HistoricalDataFetcher};
use crate::domain::indicator::BollingerParams;
use crate::domain::live::{LiveConfig, LivePorts, LiveSession};
use crate::domain::report::BacktestReport;
use crate::domain::signal::{TimeframeWeights, WeightTable};
use crate::domain::timeframe::Timeframe;
use crate::ports::cache_port::CachePort;
use crate::ports::candle_source_port::{CandleSource, Endpoint};
use crate::ports::config_port::ConfigPort;
use crate::ports::notification_port::NotificationPort;
use crate::ports::report_port::ReportPort;

const DAY_MS: i64 = 86_400_000;

#[derive(Parser, Debug)]
#[command(
    name = "bandtrader",
    about = "Multi-timeframe Bollinger band backtester and signal runner"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over cached or freshly fetched history
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Use cached candles only
        #[arg(long)]
        offline: bool,
        /// Fetch all timeframes concurrently
        #[arg(long)]
        parallel: bool,
    },
    /// Refresh the candle cache for every configured timeframe
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Delete cache files past the retention window
    EvictCache {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Poll the exchange and trade the signal on paper
    Live {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many polls
        #[arg(long)]
        iterations: Option<usize>,
    },
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let cancel = CancelToken::new();
    let outcome = match cli.command {
        Command::Backtest {
            config,
            output,
            offline,
            parallel,
        } => run_backtest(&config, output.as_deref(), offline, parallel, &cancel),
        Command::Fetch { config } => run_fetch(&config, &cancel),
        Command::EvictCache { config } => run_evict_cache(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Live { config, iterations } => run_live(&config, iterations, &cancel),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| TraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    validate_config(&adapter)?;
    Ok(adapter)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub symbol: String,
    pub timeframes: Vec<Timeframe>,
    pub base: Timeframe,
    pub history_days: i64,
}

impl MarketSettings {
    /// Oldest timestamp the history must reach, relative to `now`.
    pub fn horizon(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.history_days * DAY_MS
    }
}

pub fn build_market(adapter: &dyn ConfigPort) -> Result<MarketSettings, TraderError> {
    let symbol = adapter
        .get_string("market", "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "market".into(),
            key: "symbol".into(),
        })?;
    let timeframes = configured_timeframes(adapter)?;

    let base = match adapter.get_string("market", "base_timeframe") {
        Some(raw) => raw
            .parse::<Timeframe>()
            .map_err(|e| TraderError::ConfigInvalid {
                section: "market".into(),
                key: "base_timeframe".into(),
                reason: e.to_string(),
            })?,
        None => timeframes.iter().copied().min().ok_or_else(|| TraderError::ConfigMissing {
            section: "market".into(),
            key: "timeframes".into(),
        })?,
    };

    Ok(MarketSettings {
        symbol,
        timeframes,
        base,
        history_days: adapter.get_int("market", "history_days", 180),
    })
}

fn endpoint_name(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

pub fn build_endpoints(adapter: &dyn ConfigPort) -> Vec<Endpoint> {
    match adapter.get_list("source", "endpoints") {
        Some(urls) if !urls.is_empty() => urls
            .iter()
            .map(|url| Endpoint::new(endpoint_name(url), url.as_str()))
            .collect(),
        _ => default_endpoints(),
    }
}

fn millis(adapter: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Duration {
    Duration::from_millis(adapter.get_int(section, key, default).max(0) as u64)
}

pub fn build_fetch_config(adapter: &dyn ConfigPort) -> FetchConfig {
    FetchConfig {
        page_size: adapter.get_int("source", "page_size", 100).clamp(1, 100) as usize,
        retries_per_endpoint: adapter.get_int("source", "retries_per_endpoint", 3).max(1) as usize,
        backoff: millis(adapter, "source", "backoff_ms", 500),
        max_backoff: millis(adapter, "source", "max_backoff_ms", 4_000),
        rate_limit: millis(adapter, "source", "rate_limit_ms", 200),
        ..FetchConfig::default()
    }
}

fn request_timeout(adapter: &dyn ConfigPort) -> Duration {
    Duration::from_secs(adapter.get_int("source", "timeout_secs", 30).max(1) as u64)
}

pub fn build_fetcher(
    adapter: &dyn ConfigPort,
) -> Result<HistoricalDataFetcher<OkxAdapter>, TraderError> {
    let source = OkxAdapter::new(request_timeout(adapter))?;
    Ok(HistoricalDataFetcher::new(
        source,
        build_endpoints(adapter),
        build_fetch_config(adapter),
    ))
}

pub fn build_cache(adapter: &dyn ConfigPort) -> DataCache<FileCacheAdapter> {
    let dir = adapter
        .get_string("cache", "dir")
        .unwrap_or_else(|| "cache".to_string());
    let retention_days = adapter.get_int("cache", "retention_days", 7).max(1) as u64;
    let max_lag_hours = adapter.get_int("cache", "max_lag_hours", 24).max(1) as u64;
    DataCache::new(
        FileCacheAdapter::new(dir),
        Duration::from_secs(retention_days * 86_400),
        Duration::from_secs(max_lag_hours * 3_600),
    )
}

pub fn build_params(adapter: &dyn ConfigPort) -> BollingerParams {
    BollingerParams {
        period: adapter.get_int("indicator", "period", 20).max(1) as usize,
        k: adapter.get_double("indicator", "k", 2.0),
    }
}

/// Per-timeframe weights from `[weights.<label>]`, falling back key by key
/// to the built-in table.
pub fn build_weights(adapter: &dyn ConfigPort, timeframes: &[Timeframe]) -> WeightTable {
    timeframes
        .iter()
        .map(|&tf| {
            let section = format!("weights.{}", tf.label());
            let d = TimeframeWeights::default_for(tf);
            let get = |key: &str, default: i32| {
                i32::try_from(adapter.get_int(&section, key, default as i64)).unwrap_or(default)
            };
            let weights = TimeframeWeights::new(
                get("lower", d.lower),
                get("middle_support", d.middle_support),
                get("upper", d.upper),
                get("middle_resistance", d.middle_resistance),
            );
            (tf, weights)
        })
        .collect()
}

pub fn build_backtest_config(adapter: &dyn ConfigPort, weights: WeightTable) -> BacktestConfig {
    let d = BacktestConfig::with_weights(weights);
    BacktestConfig {
        initial_capital: adapter.get_double("backtest", "initial_capital", d.initial_capital),
        leverage: adapter.get_double("backtest", "leverage", d.leverage),
        entry_threshold: adapter.get_int("backtest", "entry_threshold", d.entry_threshold as i64)
            as i32,
        exit_threshold: adapter.get_int("backtest", "exit_threshold", d.exit_threshold as i64)
            as i32,
        stop_loss_pct: adapter.get_double("backtest", "stop_loss_pct", d.stop_loss_pct),
        ..d
    }
}

pub fn build_live_config(adapter: &dyn ConfigPort, iterations: Option<usize>) -> LiveConfig {
    LiveConfig {
        poll_interval: Duration::from_secs(adapter.get_int("live", "poll_secs", 5).max(1) as u64),
        lookback_bars: adapter.get_int("live", "lookback_bars", 60).max(1) as usize,
        fee_rate: adapter.get_double("live", "fee_rate", 0.0),
        iterations,
    }
}

fn log_banner(market: &MarketSettings, params: BollingerParams, config: &BacktestConfig) {
    let labels: Vec<&str> = market.timeframes.iter().map(|tf| tf.label()).collect();
    info!(
        symbol = %market.symbol,
        timeframes = %labels.join(","),
        base = %market.base,
        indicator = %params,
        leverage = config.leverage,
        entry_threshold = config.entry_threshold,
        exit_threshold = config.exit_threshold,
        stop_loss_pct = config.stop_loss_pct,
        "starting"
    );
}

/// Indicators, alignment, engine and metrics over already acquired candles.
pub fn backtest_report(
    market: &MarketSettings,
    params: BollingerParams,
    config: &BacktestConfig,
    acquired: Vec<Acquired>,
) -> Result<BacktestReport, TraderError> {
    let points = prepare_points(&market.symbol, market.base, acquired, params)?;
    if points.is_empty() {
        warn!(symbol = %market.symbol, "no aligned points; every timeframe needs a full band window");
    }
    info!(points = points.len(), "running backtest");
    let result = run_engine(&points, config);
    Ok(BacktestReport::new(
        &market.symbol,
        market.base,
        &market.timeframes,
        params,
        config,
        &result,
    ))
}

fn print_summary(report: &BacktestReport) {
    let m = &report.metrics;
    eprintln!("\n=== Backtest Results: {} ===", report.symbol);
    eprintln!("Aligned Points:   {}", report.points);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Won / Lost:       {} / {}", m.trades_won, m.trades_lost);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Total Profit:     {:.4} ({:.2}%)", m.total_profit, m.total_profit_pct);
    eprintln!("Average Profit:   {:.4}", m.avg_profit);
    eprintln!("Largest Win:      {:.4}", m.largest_win);
    eprintln!("Largest Loss:     {:.4}", m.largest_loss);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!("Avg Holding:      {:.1} min", m.avg_holding_period / 60_000.0);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Final Capital:    {:.4}", m.final_capital);
    if let Some(pos) = &report.open_position {
        eprintln!(
            "Open Position:    {:.4} @ {:.4} (not closed)",
            pos.size, pos.entry_price
        );
    }
}

fn run_backtest(
    config_path: &Path,
    output_path: Option<&Path>,
    offline: bool,
    parallel: bool,
    cancel: &CancelToken,
) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    let market = build_market(&adapter)?;
    let params = build_params(&adapter);
    let bt_config = build_backtest_config(&adapter, build_weights(&adapter, &market.timeframes));
    log_banner(&market, params, &bt_config);

    let cache = build_cache(&adapter);
    let now = Utc::now();

    let acquired = if offline {
        market
            .timeframes
            .iter()
            .map(|&tf| load_cached(&cache, &market.symbol, tf, now))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        let fetcher = build_fetcher(&adapter)?;
        let acquisition = Acquisition::new(&fetcher, &cache);
        let since = market.horizon(now);
        if parallel {
            acquisition.acquire_all_parallel(&market.symbol, &market.timeframes, since, now, cancel)?
        } else {
            acquisition.acquire_all(&market.symbol, &market.timeframes, since, now, cancel)?
        }
    };

    let report = backtest_report(&market, params, &bt_config, acquired)?;
    print_summary(&report);

    if let Some(path) = output_path {
        JsonReportAdapter.write(&report, path)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn run_fetch(config_path: &Path, cancel: &CancelToken) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    let market = build_market(&adapter)?;
    let fetcher = build_fetcher(&adapter)?;
    let cache = build_cache(&adapter);
    refresh_all(&fetcher, &cache, &market, Utc::now(), cancel)
}

/// Extend today's cache entry of every timeframe.
pub fn refresh_all<S, P>(
    fetcher: &HistoricalDataFetcher<S>,
    cache: &DataCache<P>,
    market: &MarketSettings,
    now: DateTime<Utc>,
    cancel: &CancelToken,
) -> Result<(), TraderError>
where
    S: CandleSource,
    P: CachePort,
{
    let acquisition = Acquisition::new(fetcher, cache);
    let since = market.horizon(now);
    for &tf in &market.timeframes {
        if cancel.is_cancelled() {
            return Err(TraderError::Cancelled);
        }
        let acquired = acquisition.refresh(&market.symbol, tf, since, now, cancel)?;
        match (acquired.candles.first(), acquired.candles.last()) {
            (Some(first), Some(last)) => eprintln!(
                "{} {}: {} candles, {} to {} ({:?})",
                market.symbol,
                tf,
                acquired.candles.len(),
                format_ts(first.timestamp),
                format_ts(last.timestamp),
                acquired.origin
            ),
            _ => eprintln!("{} {}: no candles", market.symbol, tf),
        }
    }
    Ok(())
}

fn format_ts(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn run_evict_cache(config_path: &Path) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    let cache = build_cache(&adapter);
    let removed = cache.evict_expired(Utc::now())?;
    eprintln!(
        "Removed {} cache file(s) from {}",
        removed,
        cache.port().dir().display()
    );
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    let market = build_market(&adapter)?;
    let params = build_params(&adapter);
    let weights = build_weights(&adapter, &market.timeframes);
    let bt_config = build_backtest_config(&adapter, weights);

    eprintln!("Config validated successfully\n");
    eprintln!("Market:");
    eprintln!("  symbol:        {}", market.symbol);
    eprintln!("  base:          {}", market.base);
    eprintln!("  history:       {} days", market.history_days);
    eprintln!("\nEndpoints:");
    for ep in build_endpoints(&adapter) {
        eprintln!("  {} ({})", ep.name, ep.base_url);
    }
    eprintln!("\nIndicator: {}", params);
    eprintln!("\nWeights (lower, middle support, upper, middle resistance):");
    for (tf, w) in &bt_config.weights {
        eprintln!(
            "  {:>4}: {}, {}, {}, {}",
            tf.label(),
            w.lower,
            w.middle_support,
            w.upper,
            w.middle_resistance
        );
    }
    eprintln!("\nBacktest:");
    eprintln!("  initial capital: {}", bt_config.initial_capital);
    eprintln!("  leverage:        {}", bt_config.leverage);
    eprintln!(
        "  thresholds:      entry >= {}, exit <= {}, stop loss <= {}%",
        bt_config.entry_threshold, bt_config.exit_threshold, bt_config.stop_loss_pct
    );
    Ok(())
}

fn run_live(
    config_path: &Path,
    iterations: Option<usize>,
    cancel: &CancelToken,
) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;
    let market = build_market(&adapter)?;
    let params = build_params(&adapter);
    let bt_config = build_backtest_config(&adapter, build_weights(&adapter, &market.timeframes));
    log_banner(&market, params, &bt_config);

    let fetcher = build_fetcher(&adapter)?;
    let orders = SimulatedOrderAdapter::new();
    let trade_log = CsvTradeLogAdapter::new(
        adapter
            .get_string("live", "trade_log")
            .unwrap_or_else(|| "trades.csv".to_string()),
    );
    let notifier: Box<dyn NotificationPort> = match adapter.get_string("notify", "webhook_url") {
        Some(url) => Box::new(WebhookNotifier::new(url, request_timeout(&adapter))?),
        None => Box::new(LogNotifier),
    };

    let ports = LivePorts {
        orders: &orders,
        trade_log: &trade_log,
        notifier: notifier.as_ref(),
    };
    let mut session = LiveSession::new(
        &fetcher,
        ports,
        market.symbol.clone(),
        market.base,
        market.timeframes.clone(),
        params,
        bt_config,
        build_live_config(&adapter, iterations),
    );
    let ticks = session.run(cancel, Utc::now)?;
    eprintln!(
        "Live session finished after {} poll(s), {} trade(s), {} order(s)",
        ticks,
        session.engine().trades().len(),
        orders.orders().len()
    );
    Ok(())
}
