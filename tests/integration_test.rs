//! End-to-end backtest scenarios and pipeline properties.

mod common;

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use bandtrader::adapters::memory_cache_adapter::MemoryCacheAdapter;
use bandtrader::cli::{backtest_report, MarketSettings};
use bandtrader::domain::acquisition::{prepare_points, Acquired, Acquisition, CandleOrigin};
use bandtrader::domain::alignment::{align, AlignedPoint};
use bandtrader::domain::backtest::{run_backtest, BacktestConfig};
use bandtrader::domain::cache::DataCache;
use bandtrader::domain::cancel::CancelToken;
use bandtrader::domain::candle::{merge_candles, normalize_candles, Candle};
use bandtrader::domain::fetcher::{FetchConfig, HistoricalDataFetcher, Termination};
use bandtrader::domain::indicator::{BollingerBand, BollingerParams, TimeframeSeries};
use bandtrader::domain::metrics::Metrics;
use bandtrader::domain::position::ExitReason;
use bandtrader::domain::signal::{TimeframeWeights, WeightTable};
use bandtrader::domain::timeframe::Timeframe;
use common::*;
use proptest::prelude::*;

fn single_tf_weights() -> WeightTable {
    BTreeMap::from([(Timeframe::M15, TimeframeWeights::new(3, 1, -3, -1))])
}

fn scenario_points() -> Vec<AlignedPoint> {
    let acquired = vec![Acquired {
        timeframe: Timeframe::M15,
        candles: series(0, M15, &dip_and_spike()),
        origin: CandleOrigin::Fetched,
    }];
    prepare_points("SOL-USDT-SWAP", Timeframe::M15, acquired, BollingerParams::default()).unwrap()
}

#[test]
fn dip_and_spike_produces_one_trade() {
    let points = scenario_points();
    assert_eq!(points.len(), 21);

    let config = BacktestConfig::with_weights(single_tf_weights());
    let result = run_backtest(&points, &config);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_relative_eq!(trade.entry_price, 80.0);
    assert_relative_eq!(trade.exit_price, 130.0);
    assert_eq!(trade.entry_time, 25 * M15);
    assert_eq!(trade.exit_time, 33 * M15);
    assert_eq!(trade.exit_reason, ExitReason::Signal);

    let size = config.initial_capital * config.leverage / 80.0;
    assert_relative_eq!(trade.size, size);
    assert_relative_eq!(trade.pnl, (130.0 - 80.0) * size, epsilon = 1e-9);
    assert!(result.open_position.is_none());
    assert_relative_eq!(result.final_capital, 100.0 + 6_250.0, epsilon = 1e-9);
}

fn band(lower: f64, middle: f64, upper: f64) -> BollingerBand {
    BollingerBand {
        middle,
        upper,
        lower,
    }
}

fn point(timestamp: i64, price: f64, b: BollingerBand) -> AlignedPoint {
    AlignedPoint {
        timestamp,
        price,
        bands: BTreeMap::from([(Timeframe::M15, b)]),
    }
}

#[test]
fn losing_trade_records_drawdown() {
    let config = BacktestConfig {
        initial_capital: 1_000.0,
        leverage: 1.0,
        entry_threshold: 3,
        exit_threshold: -3,
        stop_loss_pct: -14.0,
        weights: single_tf_weights(),
    };
    let points = vec![
        point(0, 100.0, band(100.0, 105.0, 110.0)),
        point(M15, 95.0, band(90.0, 100.0, 110.0)),
        point(2 * M15, 85.0, band(90.0, 100.0, 110.0)),
    ];

    let result = run_backtest(&points, &config);

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    assert_relative_eq!(result.final_capital, 850.0, epsilon = 1e-9);
    assert!(result.max_drawdown >= 0.15 - 1e-12);

    let metrics = Metrics::compute(&result);
    assert_eq!(metrics.trades_lost, 1);
    assert_relative_eq!(metrics.max_drawdown, result.max_drawdown);
}

#[test]
fn backtest_is_deterministic() {
    let points = scenario_points();
    let config = BacktestConfig::with_weights(single_tf_weights());
    let market = MarketSettings {
        symbol: "SOL-USDT-SWAP".into(),
        timeframes: vec![Timeframe::M15],
        base: Timeframe::M15,
        history_days: 1,
    };

    let first = run_backtest(&points, &config);
    let second = run_backtest(&points, &config);
    assert_eq!(first, second);
    assert_eq!(Metrics::compute(&first), Metrics::compute(&second));

    let acquired = || {
        vec![Acquired {
            timeframe: Timeframe::M15,
            candles: series(0, M15, &dip_and_spike()),
            origin: CandleOrigin::Cache,
        }]
    };
    let a = backtest_report(&market, BollingerParams::default(), &config, acquired()).unwrap();
    let b = backtest_report(&market, BollingerParams::default(), &config, acquired()).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

fn pipeline_source(now: i64) -> HistorySource {
    let start = now - 3 * DAY;
    let m15 = series(start, M15, &wave((3 * DAY / M15) as usize));
    let h1 = series(start, H1, &wave((3 * DAY / H1) as usize));
    HistorySource::new()
        .with_series(Timeframe::M15, m15)
        .with_series(Timeframe::H1, h1)
}

#[test]
fn pipeline_fetches_once_then_reads_cache() {
    let now = fixed_now();
    let market = MarketSettings {
        symbol: "SOL-USDT-SWAP".into(),
        timeframes: vec![Timeframe::M15, Timeframe::H1],
        base: Timeframe::M15,
        history_days: 2,
    };
    let fetcher = HistoricalDataFetcher::new(
        pipeline_source(now.timestamp_millis()),
        endpoints(),
        FetchConfig::default().without_delays(),
    );
    let cache = DataCache::with_defaults(MemoryCacheAdapter::new());
    let acquisition = Acquisition::new(&fetcher, &cache);
    let since = market.horizon(now);
    let cancel = CancelToken::new();

    let first = acquisition
        .acquire_all(&market.symbol, &market.timeframes, since, now, &cancel)
        .unwrap();
    assert!(first.iter().all(|a| a.origin == CandleOrigin::Fetched));
    assert_eq!(first[0].candles.len(), (2 * DAY / M15) as usize);
    assert_eq!(first[0].candles[0].timestamp, since);
    assert_eq!(cache.port().len(), 2);
    let calls = fetcher.source().calls();

    let second = acquisition
        .acquire_all(&market.symbol, &market.timeframes, since, now, &cancel)
        .unwrap();
    assert!(second.iter().all(|a| a.origin == CandleOrigin::Cache));
    assert_eq!(fetcher.source().calls(), calls);

    let config = BacktestConfig::with_weights(
        market
            .timeframes
            .iter()
            .map(|&tf| (tf, TimeframeWeights::default_for(tf)))
            .collect(),
    );
    let report =
        backtest_report(&market, BollingerParams::default(), &config, second).unwrap();
    assert_eq!(report.timeframes, vec!["15m", "1h"]);
    assert!(report.points > 0);
    assert_eq!(report.metrics.total_trades, report.trades.len());
}

#[test]
fn rerun_off_bar_boundary_reads_cache() {
    let now = fixed_now() + chrono::Duration::minutes(7);
    let market = MarketSettings {
        symbol: "SOL-USDT-SWAP".into(),
        timeframes: vec![Timeframe::M15, Timeframe::H1],
        base: Timeframe::M15,
        history_days: 2,
    };
    let fetcher = HistoricalDataFetcher::new(
        pipeline_source(fixed_now().timestamp_millis()),
        endpoints(),
        FetchConfig::default().without_delays(),
    );
    let cache = DataCache::with_defaults(MemoryCacheAdapter::new());
    let acquisition = Acquisition::new(&fetcher, &cache);
    let since = market.horizon(now);
    let cancel = CancelToken::new();

    let first = acquisition
        .acquire_all(&market.symbol, &market.timeframes, since, now, &cancel)
        .unwrap();
    assert!(first.iter().all(|a| a.origin == CandleOrigin::Fetched));
    assert!(first.iter().all(|a| a.candles[0].timestamp > since));
    let calls = fetcher.source().calls();

    let second = acquisition
        .acquire_all(&market.symbol, &market.timeframes, since, now, &cancel)
        .unwrap();
    let origins: Vec<CandleOrigin> = second.iter().map(|a| a.origin).collect();
    assert_eq!(origins, vec![CandleOrigin::Cache, CandleOrigin::Cache]);
    assert_eq!(fetcher.source().calls(), calls);
}

#[test]
fn parallel_acquisition_matches_sequential() {
    let now = fixed_now();
    let tfs = [Timeframe::M15, Timeframe::H1];
    let since = now.timestamp_millis() - 2 * DAY;
    let cancel = CancelToken::new();

    let run = |parallel: bool| {
        let fetcher = HistoricalDataFetcher::new(
            pipeline_source(now.timestamp_millis()),
            endpoints(),
            FetchConfig::default().without_delays(),
        );
        let cache = DataCache::with_defaults(MemoryCacheAdapter::new());
        let acquisition = Acquisition::new(&fetcher, &cache);
        let out = if parallel {
            acquisition.acquire_all_parallel("X", &tfs, since, now, &cancel)
        } else {
            acquisition.acquire_all("X", &tfs, since, now, &cancel)
        };
        out.unwrap()
            .into_iter()
            .map(|a| (a.timeframe, a.candles))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(true), run(false));
}

fn candles_strategy() -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((0i64..60, 1.0f64..500.0), 0..80).prop_map(|raw| {
        raw.into_iter()
            .map(|(slot, close)| candle(slot * M15, close))
            .collect()
    })
}

proptest! {
    #[test]
    fn merge_is_idempotent(candles in candles_strategy(), a in 0usize..80, b in 0usize..80) {
        let normalized = normalize_candles(candles);
        prop_assert_eq!(&merge_candles(&normalized, &normalized), &normalized);

        let (lo, hi) = (a.min(b).min(normalized.len()), a.max(b).min(normalized.len()));
        let subset = &normalized[lo..hi];
        prop_assert_eq!(&merge_candles(&normalized, subset), &normalized);
        prop_assert_eq!(&merge_candles(subset, &normalized), &normalized);
    }

    #[test]
    fn fetch_stops_after_empty_pages(n in 0usize..400, page_size in 1usize..=100) {
        let start = 1_700_000_000_000i64;
        let history = series(start, M15, &vec![100.0; n]);
        let until = start + n as i64 * M15;
        let fetcher = HistoricalDataFetcher::new(
            HistorySource::new().with_series(Timeframe::M15, history),
            endpoints(),
            FetchConfig { page_size, ..FetchConfig::default().without_delays() },
        );

        let fetched = fetcher
            .fetch("X", Timeframe::M15, 0, until, &CancelToken::new())
            .unwrap();

        prop_assert_eq!(fetched.termination, Termination::HistoryExhausted);
        prop_assert_eq!(fetched.candles.len(), n);
        prop_assert_eq!(fetched.requests, n.div_ceil(page_size) + 3);
    }

    #[test]
    fn aligned_points_strictly_increase(
        base_len in 20usize..120,
        other_len in 20usize..40,
        offset in 0i64..8,
    ) {
        let params = BollingerParams::default();
        let base = TimeframeSeries::new("X", Timeframe::M15, series(0, M15, &wave(base_len)), params);
        let other = TimeframeSeries::new(
            "X",
            Timeframe::H1,
            series(offset * M15, H1, &wave(other_len)),
            params,
        );

        let points = align(&base, &[other]);
        for w in points.windows(2) {
            prop_assert!(w[0].timestamp < w[1].timestamp);
        }
        for p in &points {
            prop_assert!(p.bands.contains_key(&Timeframe::M15));
            prop_assert!(p.bands.contains_key(&Timeframe::H1));
        }
    }
}
