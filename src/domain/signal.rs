//! Weighted multi-timeframe Bollinger signal.
//!
//! Each timeframe contributes one integer weight depending on where the price
//! sits relative to that timeframe's band. Checks run outer band first, so a
//! price exactly on `lower` scores the lower weight and a price exactly on
//! `upper` scores the upper weight.

use std::collections::BTreeMap;

use crate::domain::alignment::AlignedPoint;
use crate::domain::indicator::BollingerBand;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeframeWeights {
    pub lower: i32,
    pub middle_support: i32,
    pub upper: i32,
    pub middle_resistance: i32,
}

impl TimeframeWeights {
    pub fn new(lower: i32, middle_support: i32, upper: i32, middle_resistance: i32) -> Self {
        Self {
            lower,
            middle_support,
            upper,
            middle_resistance,
        }
    }

    /// Default weight for a timeframe; timeframes above four hours reuse the
    /// four-hour weights and those below fifteen minutes reuse fifteen-minute.
    pub fn default_for(timeframe: Timeframe) -> Self {
        match timeframe {
            Timeframe::M1 | Timeframe::M5 | Timeframe::M15 => Self::new(2, 1, -2, -1),
            Timeframe::M30 | Timeframe::H1 | Timeframe::H2 => Self::new(4, 2, -4, -2),
            Timeframe::H4 | Timeframe::D1 => Self::new(6, 3, -6, -3),
        }
    }

    fn scoped(self, scope: SignalScope) -> Self {
        match scope {
            SignalScope::Net => self,
            SignalScope::Support => Self {
                upper: 0,
                middle_resistance: 0,
                ..self
            },
            SignalScope::Resistance => Self {
                lower: 0,
                middle_support: 0,
                ..self
            },
        }
    }
}

pub type WeightTable = BTreeMap<Timeframe, TimeframeWeights>;

pub fn default_weights(timeframes: &[Timeframe]) -> WeightTable {
    timeframes
        .iter()
        .map(|&tf| (tf, TimeframeWeights::default_for(tf)))
        .collect()
}

/// Which side of the weight table takes part in a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalScope {
    Net,
    /// Lower and middle-support weights only; gates entries.
    Support,
    /// Upper and middle-resistance weights only; gates exits.
    Resistance,
}

/// Where a price sits against one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandZone {
    AtOrBelowLower,
    AtOrBelowMiddle,
    AtOrAboveUpper,
    AboveMiddle,
}

pub fn classify(price: f64, band: &BollingerBand) -> BandZone {
    if price <= band.lower {
        BandZone::AtOrBelowLower
    } else if price <= band.middle {
        BandZone::AtOrBelowMiddle
    } else if price >= band.upper {
        BandZone::AtOrAboveUpper
    } else {
        BandZone::AboveMiddle
    }
}

fn weight_for(zone: BandZone, weights: &TimeframeWeights) -> i32 {
    match zone {
        BandZone::AtOrBelowLower => weights.lower,
        BandZone::AtOrBelowMiddle => weights.middle_support,
        BandZone::AtOrAboveUpper => weights.upper,
        BandZone::AboveMiddle => weights.middle_resistance,
    }
}

pub fn score(point: &AlignedPoint, weights: &WeightTable, scope: SignalScope) -> i32 {
    point
        .bands
        .iter()
        .filter_map(|(tf, band)| {
            let w = weights.get(tf)?.scoped(scope);
            Some(weight_for(classify(point.price, band), &w))
        })
        .sum()
}
