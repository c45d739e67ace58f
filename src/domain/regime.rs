//! Market regime derived from a benchmark index series.
//!
//! The regime is computed per bar and handed to the scanners through their
//! evaluation context; nothing here is global.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::Sma;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Bull,
    Bear,
    Unknown,
}

/// Bull while the benchmark closes above its SMA, bear below it.
#[derive(Debug, Clone)]
pub struct RegimeFilter {
    sma: Sma,
    current: Regime,
}

impl RegimeFilter {
    pub fn new(period: usize) -> Self {
        RegimeFilter {
            sma: Sma::new(period),
            current: Regime::Unknown,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Regime {
        self.current = match self.sma.update(bar.close) {
            Ok(avg) if bar.close > avg => Regime::Bull,
            Ok(_) => Regime::Bear,
            Err(_) => Regime::Unknown,
        };
        self.current
    }

    pub fn current(&self) -> Regime {
        self.current
    }
}
