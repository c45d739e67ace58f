//! Average True Range with Wilder smoothing.
//!
//! TR[0] = H[0] - L[0], TR[i] = true range against the previous close.
//! Seed = mean of the first n TRs, then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, Reading};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    count: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    atr: f64,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "period must be >= 1");
        Atr {
            period,
            count: 0,
            prev_close: None,
            seed_sum: 0.0,
            atr: 0.0,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Reading {
        let tr = match self.prev_close {
            Some(prev) => bar.true_range(prev),
            None => bar.high - bar.low,
        };
        self.prev_close = Some(bar.close);
        self.count += 1;

        if self.count < self.period {
            self.seed_sum += tr;
        } else if self.count == self.period {
            self.seed_sum += tr;
            self.atr = self.seed_sum / self.period as f64;
        } else {
            self.atr = (self.atr * (self.period - 1) as f64 + tr) / self.period as f64;
        }
        self.value()
    }

    pub fn value(&self) -> Reading {
        if self.count < self.period {
            return Err(IndicatorType::Atr(self.period).not_ready(self.count));
        }
        Ok(self.atr)
    }
}

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values: vec![],
        };
    }

    let mut values: Vec<IndicatorPoint> = Vec::with_capacity(bars.len());
    let mut seed_sum = 0.0;
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        if i + 1 < period {
            seed_sum += tr;
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: 0.0,
            });
            continue;
        }

        if i + 1 == period {
            seed_sum += tr;
            atr = seed_sum / period as f64;
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
        }
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: atr,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
