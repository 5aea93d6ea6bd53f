//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (k × StdDev)
//! - Lower: Middle - (k × StdDev)
//!
//! StdDev divides by N over the same window as the SMA.
//! Default parameters: period=20, k=2.0
//! Warmup: first (period-1) entries are `None`.

use super::{sma, stddev, BollingerBand};

pub fn bollinger(prices: &[f64], period: usize, k: f64) -> Vec<Option<BollingerBand>> {
    let middle = sma(prices, period);
    let sigma = stddev(prices, period, &middle);

    middle
        .iter()
        .zip(sigma.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(BollingerBand {
                middle: *m,
                upper: m + k * s,
                lower: m - k * s,
            }),
            _ => None,
        })
        .collect()
}
