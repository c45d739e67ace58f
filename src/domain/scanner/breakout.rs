//! Base breakout scanner.
//!
//! Fires long when, on the same bar: the trend is aligned near the 52-week
//! high, a tight base precedes the bar, the close clears the base high, and
//! volume expands.

use super::{ScanContext, ScanOutcome, mean_volume, trailing_return};
use crate::domain::journal::NoTradeReason;
use crate::domain::ohlcv::Bar;
use crate::domain::regime::Regime;
use crate::domain::signal::{Direction, SetupGrade, Signal, SignalContext, capped_score};

pub const TREND_CAP: f64 = 3.0;
pub const VOLUME_CAP: f64 = 2.0;
pub const BASE_CAP: f64 = 3.0;
pub const RS_CAP: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BreakoutParams {
    /// Bars in the 52-week high lookback.
    pub high_lookback: usize,
    pub max_distance_from_high_pct: f64,
    pub min_base_days: usize,
    pub max_base_days: usize,
    pub max_base_volatility_pct: f64,
    pub volume_lookback: usize,
    pub volume_ratio: f64,
    pub rs_lookback: usize,
    /// Outperformance of the benchmark that earns full relative-strength credit.
    pub rs_full_credit_pct: f64,
    pub require_bull_regime: bool,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        BreakoutParams {
            high_lookback: 252,
            max_distance_from_high_pct: 10.0,
            min_base_days: 10,
            max_base_days: 60,
            max_base_volatility_pct: 12.0,
            volume_lookback: 50,
            volume_ratio: 1.5,
            rs_lookback: 63,
            rs_full_credit_pct: 10.0,
            require_bull_regime: false,
        }
    }
}

/// A consolidation immediately preceding the current bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Base {
    pub length: usize,
    pub high: f64,
    pub low: f64,
    pub volatility_pct: f64,
}

/// The longest base in `[min_days, max_days]` ending at the last bar of `prior`
/// whose range over its midpoint stays within `max_volatility_pct`.
pub fn find_base(
    prior: &[Bar],
    min_days: usize,
    max_days: usize,
    max_volatility_pct: f64,
) -> Option<Base> {
    let longest = max_days.min(prior.len());
    (min_days.max(1)..=longest).rev().find_map(|length| {
        let window = &prior[prior.len() - length..];
        let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let mid = (high + low) / 2.0;
        if mid <= 0.0 {
            return None;
        }
        let volatility_pct = (high - low) / mid * 100.0;
        (volatility_pct <= max_volatility_pct).then_some(Base {
            length,
            high,
            low,
            volatility_pct,
        })
    })
}

#[derive(Debug, Clone)]
pub struct BreakoutScanner {
    params: BreakoutParams,
    trend_valid: Option<bool>,
}

impl BreakoutScanner {
    pub fn new(params: BreakoutParams) -> Self {
        BreakoutScanner {
            params,
            trend_valid: None,
        }
    }

    pub fn begin_session(&mut self) {
        self.trend_valid = None;
    }

    pub fn session_context(&self) -> SignalContext {
        SignalContext {
            trend_valid: self.trend_valid,
            ..SignalContext::default()
        }
    }

    pub fn evaluate(&mut self, ctx: &ScanContext<'_>) -> ScanOutcome {
        let mut trend_valid = None;
        let outcome = match self.scan(ctx, &mut trend_valid) {
            Ok(signal) => ScanOutcome::Signal(signal),
            Err(reason) => ScanOutcome::NoSignal(reason),
        };
        if trend_valid.is_some() {
            self.trend_valid = trend_valid;
        }
        outcome
    }

    fn scan(
        &self,
        ctx: &ScanContext<'_>,
        trend_valid: &mut Option<bool>,
    ) -> Result<Signal, NoTradeReason> {
        let p = &self.params;
        let bar = ctx.bar().ok_or(NoTradeReason::NotReady)?;
        let snap = ctx.indicators;
        let (sma20, sma50, atr) = match (&snap.sma20, &snap.sma50, &snap.atr14) {
            (Ok(s20), Ok(s50), Ok(atr)) if *atr > 0.0 => (*s20, *s50, *atr),
            _ => return Err(NoTradeReason::NotReady),
        };

        let n = ctx.history.len();
        let year = &ctx.history[n.saturating_sub(p.high_lookback)..];
        let high_52w = year.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let distance_pct = (high_52w - bar.close) / high_52w * 100.0;
        let trend_ok =
            bar.close > sma20 && sma20 > sma50 && distance_pct <= p.max_distance_from_high_pct;
        *trend_valid = Some(trend_ok);
        if !trend_ok {
            return Err(NoTradeReason::TrendFilter);
        }

        let prior = &ctx.history[..n - 1];
        if prior.len() < p.volume_lookback {
            return Err(NoTradeReason::NotReady);
        }
        let base = find_base(
            prior,
            p.min_base_days,
            p.max_base_days,
            p.max_base_volatility_pct,
        )
        .ok_or(NoTradeReason::NoSignal)?;
        if bar.close <= base.high {
            return Err(NoTradeReason::NoSignal);
        }

        let avg_volume = mean_volume(&prior[prior.len() - p.volume_lookback..])
            .filter(|v| *v > 0.0)
            .ok_or(NoTradeReason::NotReady)?;
        let volume_ratio = bar.volume as f64 / avg_volume;
        if volume_ratio < p.volume_ratio {
            return Err(NoTradeReason::NoSignal);
        }

        let score = self.score(ctx, distance_pct, volume_ratio, &base);
        let grade = SetupGrade::from_score(score);
        if p.require_bull_regime && ctx.regime != Regime::Bull {
            return Err(NoTradeReason::RegimeFilter);
        }

        Ok(Signal {
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            direction: Direction::Long,
            score,
            grade,
            reference_price: bar.close,
            atr,
            session_scoped: false,
            context: SignalContext {
                trend_valid: Some(true),
                ..SignalContext::default()
            },
        })
    }

    fn score(
        &self,
        ctx: &ScanContext<'_>,
        distance_pct: f64,
        volume_ratio: f64,
        base: &Base,
    ) -> f64 {
        let p = &self.params;

        let proximity = if p.max_distance_from_high_pct > 0.0 {
            1.0 - distance_pct / p.max_distance_from_high_pct
        } else {
            1.0
        };
        let trend = 1.5 + 1.5 * proximity.clamp(0.0, 1.0);

        // Full credit at twice the required ratio.
        let volume = VOLUME_CAP * volume_ratio / (2.0 * p.volume_ratio);

        let tightness = if p.max_base_volatility_pct > 0.0 {
            1.0 - base.volatility_pct / p.max_base_volatility_pct
        } else {
            1.0
        };
        let length = if p.max_base_days > p.min_base_days {
            (base.length - p.min_base_days) as f64 / (p.max_base_days - p.min_base_days) as f64
        } else {
            1.0
        };
        let base_quality = 2.0 * tightness + length;

        let rs = relative_strength_pct(ctx.history, ctx.benchmark, p.rs_lookback)
            .map(|rs| {
                if p.rs_full_credit_pct > 0.0 {
                    RS_CAP * (rs / p.rs_full_credit_pct).clamp(0.0, 1.0)
                } else if rs > 0.0 {
                    RS_CAP
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);

        capped_score(&[
            (trend, TREND_CAP),
            (volume, VOLUME_CAP),
            (base_quality, BASE_CAP),
            (rs, RS_CAP),
        ])
    }
}

/// Symbol return minus benchmark return over `lookback` bars, in percent.
/// Without a benchmark the raw symbol return is used.
pub fn relative_strength_pct(history: &[Bar], benchmark: &[Bar], lookback: usize) -> Option<f64> {
    let own = trailing_return(history, lookback)?;
    let bench = if benchmark.is_empty() {
        0.0
    } else {
        trailing_return(benchmark, lookback)?
    };
    Some((own - bench) * 100.0)
}
