//! Cross-timeframe alignment.
//!
//! Every base candle with a defined band is paired with the latest defined
//! band of each other timeframe whose candle timestamp is at or before the
//! base timestamp. Points where any timeframe has nothing yet are dropped.
//! A higher-timeframe bar takes part from its open time, so its band already
//! includes that bar's final close.

use std::collections::BTreeMap;

use crate::domain::indicator::{BollingerBand, TimeframeSeries};
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPoint {
    pub timestamp: i64,
    pub price: f64,
    pub bands: BTreeMap<Timeframe, BollingerBand>,
}

/// Index of the rightmost candle with `timestamp <= at`, if any.
fn rightmost_at_or_before(series: &TimeframeSeries, at: i64) -> Option<usize> {
    let upper = series.candles.partition_point(|c| c.timestamp <= at);
    upper.checked_sub(1)
}

/// Latest defined band at or before `at`. Bands are defined on a contiguous
/// suffix, so an undefined entry at the rightmost index means none earlier is
/// defined either.
fn band_at_or_before(series: &TimeframeSeries, at: i64) -> Option<BollingerBand> {
    let idx = rightmost_at_or_before(series, at)?;
    series.bands.get(idx).copied().flatten()
}

pub fn align(base: &TimeframeSeries, others: &[TimeframeSeries]) -> Vec<AlignedPoint> {
    let mut points = Vec::with_capacity(base.defined_count());
    let mut last_ts: Option<i64> = None;

    'candles: for (candle, band) in base.candles.iter().zip(base.bands.iter()) {
        let Some(base_band) = band else {
            continue;
        };
        if last_ts.is_some_and(|prev| candle.timestamp <= prev) {
            continue;
        }

        let mut bands = BTreeMap::new();
        bands.insert(base.timeframe, *base_band);

        for other in others {
            match band_at_or_before(other, candle.timestamp) {
                Some(b) => {
                    bands.insert(other.timeframe, b);
                }
                None => continue 'candles,
            }
        }

        last_ts = Some(candle.timestamp);
        points.push(AlignedPoint {
            timestamp: candle.timestamp,
            price: candle.close,
            bands,
        });
    }

    points
}
