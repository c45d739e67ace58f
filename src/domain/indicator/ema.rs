//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, Reading};
use crate::domain::ohlcv::Bar;

/// Incremental EMA with the same seeding as `calculate_ema`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    count: usize,
    seed_sum: f64,
    ema: f64,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "period must be >= 1");
        Ema {
            period,
            k: 2.0 / (period as f64 + 1.0),
            count: 0,
            seed_sum: 0.0,
            ema: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) -> Reading {
        self.count += 1;
        if self.count < self.period {
            self.seed_sum += value;
        } else if self.count == self.period {
            self.seed_sum += value;
            self.ema = self.seed_sum / self.period as f64;
        } else {
            self.ema = value * self.k + self.ema * (1.0 - self.k);
        }
        self.value()
    }

    pub fn value(&self) -> Reading {
        if self.count < self.period {
            return Err(IndicatorType::Ema(self.period).not_ready(self.count));
        }
        Ok(self.ema)
    }
}

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < period - 1 {
            sum += bar.close;
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: 0.0,
            });
        } else if i == period - 1 {
            sum += bar.close;
            ema = sum / period as f64;
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: ema,
            });
        } else {
            ema = bar.close * k + ema * (1.0 - k);
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: ema,
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}
