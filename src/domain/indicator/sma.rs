//! Simple Moving Average indicator.
//!
//! SMA[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are invalid.

use std::collections::VecDeque;

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, Reading};
use crate::domain::ohlcv::Bar;

/// Incremental SMA over the last `period` values.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "period must be >= 1");
        Sma {
            period,
            window: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn update(&mut self, value: f64) -> Reading {
        self.window.push_back(value);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        self.value()
    }

    pub fn value(&self) -> Reading {
        if self.window.len() < self.period {
            return Err(IndicatorType::Sma(self.period).not_ready(self.window.len()));
        }
        // Summed oldest-first so the result matches `calculate_sma` exactly.
        Ok(self.window.iter().sum::<f64>() / self.period as f64)
    }
}

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values: Vec::new(),
        };
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i + 1 < period {
                IndicatorPoint {
                    timestamp: bar.timestamp,
                    valid: false,
                    value: 0.0,
                }
            } else {
                let sum: f64 = bars[i + 1 - period..=i].iter().map(|b| b.close).sum();
                IndicatorPoint {
                    timestamp: bar.timestamp,
                    valid: true,
                    value: sum / period as f64,
                }
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
