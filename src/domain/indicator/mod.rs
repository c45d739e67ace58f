//! Technical indicator implementations.
//!
//! Each indicator exists in two forms that must agree bar for bar:
//! - an incremental calculator (`Sma`, `Ema`, `Atr`) fed one bar at a time by the
//!   backtest loop, and
//! - a batch function (`calculate_sma`, ...) that recomputes a whole
//!   `IndicatorSeries` from scratch.
//!
//! Readings are causal: a snapshot only ever depends on bars up to and including
//! its own timestamp.

pub mod atr;
pub mod ema;
pub mod sma;

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::error::IndicatorError;
use crate::domain::ohlcv::Bar;

pub use atr::{Atr, calculate_atr};
pub use ema::{Ema, calculate_ema};
pub use sma::{Sma, calculate_sma};

pub const SMA_SHORT: usize = 20;
pub const SMA_MEDIUM: usize = 50;
pub const SMA_LONG: usize = 200;
pub const EMA_PERIOD: usize = 20;
pub const ATR_PERIOD: usize = 14;

/// A computed value, or the reason it is not available yet.
pub type Reading = Result<f64, IndicatorError>;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Atr(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// The value at `index`, or `InsufficientHistory` if it was still warming up.
    pub fn reading(&self, index: usize) -> Reading {
        match self.values.get(index) {
            Some(point) if point.valid => Ok(point.value),
            _ => Err(self.indicator_type.not_ready(index + 1)),
        }
    }
}

impl IndicatorType {
    pub fn period(&self) -> usize {
        match self {
            IndicatorType::Sma(p) | IndicatorType::Ema(p) | IndicatorType::Atr(p) => *p,
        }
    }

    pub(crate) fn not_ready(&self, have: usize) -> IndicatorError {
        IndicatorError::InsufficientHistory {
            indicator: self.to_string(),
            have,
            need: self.period(),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

/// Indicator values for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub sma20: Reading,
    pub sma50: Reading,
    pub sma200: Reading,
    pub ema20: Reading,
    pub atr14: Reading,
}

impl IndicatorSnapshot {
    /// ATR as a percentage of `price`, when ATR is ready.
    pub fn atr_pct_of(&self, price: f64) -> Option<f64> {
        match &self.atr14 {
            Ok(atr) if price > 0.0 => Some(atr / price * 100.0),
            _ => None,
        }
    }
}

/// Rolling indicator state for one symbol.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    sma20: Sma,
    sma50: Sma,
    sma200: Sma,
    ema20: Ema,
    atr14: Atr,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        IndicatorEngine {
            sma20: Sma::new(SMA_SHORT),
            sma50: Sma::new(SMA_MEDIUM),
            sma200: Sma::new(SMA_LONG),
            ema20: Ema::new(EMA_PERIOD),
            atr14: Atr::new(ATR_PERIOD),
        }
    }

    pub fn update(&mut self, bar: &Bar) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: bar.timestamp,
            sma20: self.sma20.update(bar.close),
            sma50: self.sma50.update(bar.close),
            sma200: self.sma200.update(bar.close),
            ema20: self.ema20.update(bar.close),
            atr14: self.atr14.update(bar),
        }
    }
}

/// Recompute the snapshot for the last bar of `bars` from scratch.
///
/// Returns `None` for an empty slice.
pub fn recompute_snapshot(bars: &[Bar]) -> Option<IndicatorSnapshot> {
    let last = bars.last()?;
    let index = bars.len() - 1;
    Some(IndicatorSnapshot {
        timestamp: last.timestamp,
        sma20: calculate_sma(bars, SMA_SHORT).reading(index),
        sma50: calculate_sma(bars, SMA_MEDIUM).reading(index),
        sma200: calculate_sma(bars, SMA_LONG).reading(index),
        ema20: calculate_ema(bars, EMA_PERIOD).reading(index),
        atr14: calculate_atr(bars, ATR_PERIOD).reading(index),
    })
}


#[cfg(test)]
mod tests {
    use super::test_bars::bar_at;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorType::Ema(20).to_string(), "EMA(20)");
        assert_eq!(IndicatorType::Atr(14).to_string(), "ATR(14)");
    }

    #[test]
    fn engine_reports_not_ready_during_warmup() {
        let mut engine = IndicatorEngine::new();
        let snap = engine.update(&bar_at(0, 10.0, 11.0, 9.0, 10.0));
        assert!(matches!(
            snap.sma20,
            Err(IndicatorError::InsufficientHistory { have: 1, need: 20, .. })
        ));
        assert!(snap.atr14.is_err());
        assert!(snap.atr_pct_of(10.0).is_none());
    }

    #[test]
    fn engine_becomes_ready_after_period() {
        let mut engine = IndicatorEngine::new();
        let mut snap = None;
        for i in 0..20 {
            snap = Some(engine.update(&bar_at(i, 10.0, 11.0, 9.0, 10.0)));
        }
        let snap = snap.unwrap();
        assert!((snap.sma20.clone().unwrap() - 10.0).abs() < 1e-12);
        assert!((snap.ema20.clone().unwrap() - 10.0).abs() < 1e-12);
        assert!((snap.atr14.clone().unwrap() - 2.0).abs() < 1e-12);
        assert!(snap.sma50.is_err());
        assert!((snap.atr_pct_of(10.0).unwrap() - 20.0).abs() < 1e-9);
    }

    fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
        prop::collection::vec((50.0f64..150.0, 0.0f64..5.0, 0.0f64..5.0, 0.0f64..1.0), 1..230)
            .prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (mid, up, down, pos))| {
                        let high = mid + up;
                        let low = mid - down;
                        let close = low + (high - low) * pos;
                        bar_at(i, mid, high, low, close)
                    })
                    .collect()
            })
    }

    fn same(a: &Reading, b: &Reading) -> bool {
        match (a, b) {
            (Ok(x), Ok(y)) => (x - y).abs() <= 1e-9 * x.abs().max(1.0),
            (Err(_), Err(_)) => true,
            _ => false,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn incremental_matches_recompute(bars in arb_bars()) {
            let mut engine = IndicatorEngine::new();
            for i in 0..bars.len() {
                let incremental = engine.update(&bars[i]);
                let batch = recompute_snapshot(&bars[..=i]).unwrap();
                prop_assert!(same(&incremental.sma20, &batch.sma20));
                prop_assert!(same(&incremental.sma50, &batch.sma50));
                prop_assert!(same(&incremental.sma200, &batch.sma200));
                prop_assert!(same(&incremental.ema20, &batch.ema20));
                prop_assert!(same(&incremental.atr14, &batch.atr14));
            }
        }
    }
}
