//! Standard deviation over a trailing window.
//!
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//!
//! The mean is taken from a previously computed SMA so the two series stay
//! consistent; entries where the SMA is undefined stay undefined.

pub fn stddev(prices: &[f64], period: usize, sma: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            let mean = sma.get(i).copied().flatten()?;
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &prices[i + 1 - period..=i];
            let variance = window
                .iter()
                .map(|p| {
                    let diff = p - mean;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;
            Some(variance.sqrt())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::sma;

    #[test]
    fn stddev_warmup() {
        let prices = [10.0, 20.0, 30.0, 40.0, 50.0];
        let out = stddev(&prices, 3, &sma(&prices, 3));
        assert!(out[0].is_none());
        assert!(out[1].is_none());
        assert!(out[2].is_some());
        assert!(out[4].is_some());
    }

    #[test]
    fn stddev_constant_values() {
        let prices = [100.0; 5];
        let out = stddev(&prices, 3, &sma(&prices, 3));
        assert!((out[2].unwrap() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stddev_known_values() {
        let prices = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = stddev(&prices, 8, &sma(&prices, 8));
        assert!((out[7].unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn stddev_follows_undefined_sma() {
        let prices = [1.0, 2.0, 3.0];
        let out = stddev(&prices, 2, &[None, None, None]);
        assert_eq!(out, vec![None, None, None]);
    }
}
