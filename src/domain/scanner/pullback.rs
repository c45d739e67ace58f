//! Intraday pullback-reversal scanner.
//!
//! Per session: the open must clear the daily trend average, then inside the
//! entry window the scanner waits for a close below EMA20 (pullback), a strong
//! close back above it (reversal), and a follow-through close above it on the
//! next bar (confirmation). One signal per session at most.

use chrono::{NaiveDate, NaiveTime};

use super::{ScanContext, ScanOutcome, mean_volume};
use crate::domain::indicator::Reading;
use crate::domain::journal::NoTradeReason;
use crate::domain::ohlcv::Bar;
use crate::domain::regime::Regime;
use crate::domain::signal::{Direction, SetupGrade, Signal, SignalContext, capped_score};

#[derive(Debug, Clone, PartialEq)]
pub struct PullbackParams {
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    /// A reversal bar must close strictly above this fraction of its range.
    pub min_close_location: f64,
    /// Sessions in the daily trend average the open must clear.
    pub trend_sma_period: usize,
    /// Reversal volume, relative to the session average so far, that earns full credit.
    pub full_volume_ratio: f64,
    pub require_bull_regime: bool,
}

impl Default for PullbackParams {
    fn default() -> Self {
        PullbackParams {
            window_start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            window_end: NaiveTime::from_hms_opt(11, 30, 0).unwrap_or_default(),
            min_close_location: 0.60,
            trend_sma_period: 200,
            full_volume_ratio: 2.0,
            require_bull_regime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PullbackState {
    /// Session gate failed or not evaluable.
    Disabled(NoTradeReason),
    AwaitingPullback,
    AwaitingReversal,
    AwaitingConfirmation {
        close_location: f64,
        volume_ratio: Option<f64>,
    },
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct PullbackScanner {
    params: PullbackParams,
    state: PullbackState,
    session: Option<NaiveDate>,
    trend_valid: Option<bool>,
    reversal_strength_ok: Option<bool>,
    confirmation_time: Option<NaiveTime>,
}

impl PullbackScanner {
    pub fn new(params: PullbackParams) -> Self {
        PullbackScanner {
            params,
            state: PullbackState::Disabled(NoTradeReason::NotReady),
            session: None,
            trend_valid: None,
            reversal_strength_ok: None,
            confirmation_time: None,
        }
    }

    pub fn state(&self) -> PullbackState {
        self.state
    }

    /// Discard the previous session and apply the open-above-trend gate.
    pub fn begin_session(
        &mut self,
        session: NaiveDate,
        open: f64,
        daily_trend: Option<Reading>,
    ) {
        self.session = Some(session);
        self.reversal_strength_ok = None;
        self.confirmation_time = None;
        match daily_trend {
            Some(Ok(average)) => {
                let valid = open > average;
                self.trend_valid = Some(valid);
                self.state = if valid {
                    PullbackState::AwaitingPullback
                } else {
                    PullbackState::Disabled(NoTradeReason::TrendFilter)
                };
            }
            Some(Err(_)) | None => {
                self.trend_valid = None;
                self.state = PullbackState::Disabled(NoTradeReason::NotReady);
            }
        }
    }

    pub fn session_context(&self) -> SignalContext {
        SignalContext {
            trend_valid: self.trend_valid,
            reversal_strength_ok: self.reversal_strength_ok,
            confirmation_time: self.confirmation_time,
        }
    }

    pub fn evaluate(&mut self, ctx: &ScanContext<'_>) -> ScanOutcome {
        let Some(bar) = ctx.bar() else {
            return ScanOutcome::NoSignal(NoTradeReason::NotReady);
        };
        match self.state {
            PullbackState::Disabled(reason) => return ScanOutcome::NoSignal(reason),
            PullbackState::Confirmed => return ScanOutcome::NoSignal(NoTradeReason::NoSignal),
            _ => {}
        }
        if self.session != Some(bar.session()) {
            return ScanOutcome::NoSignal(NoTradeReason::NotReady);
        }
        let time = bar.time();
        if time < self.params.window_start || time > self.params.window_end {
            return ScanOutcome::NoSignal(NoTradeReason::OutsideWindow);
        }
        let Ok(ema) = ctx.indicators.ema20.clone() else {
            return ScanOutcome::NoSignal(NoTradeReason::NotReady);
        };

        match self.state {
            PullbackState::AwaitingPullback => {
                if bar.close < ema {
                    self.state = PullbackState::AwaitingReversal;
                }
            }
            PullbackState::AwaitingReversal => {
                if bar.close > ema {
                    let location = bar.close_location().unwrap_or(0.0);
                    let strong = location > self.params.min_close_location;
                    self.reversal_strength_ok = Some(strong);
                    self.state = if strong {
                        PullbackState::AwaitingConfirmation {
                            close_location: location,
                            volume_ratio: session_volume_ratio(ctx.history),
                        }
                    } else {
                        PullbackState::AwaitingPullback
                    };
                }
            }
            PullbackState::AwaitingConfirmation {
                close_location,
                volume_ratio,
            } => {
                if bar.close <= ema {
                    self.state = PullbackState::AwaitingPullback;
                    return ScanOutcome::NoSignal(NoTradeReason::NoSignal);
                }
                let atr = match &ctx.indicators.atr14 {
                    Ok(atr) if *atr > 0.0 => *atr,
                    _ => {
                        self.state = PullbackState::AwaitingPullback;
                        return ScanOutcome::NoSignal(NoTradeReason::NotReady);
                    }
                };
                self.state = PullbackState::Confirmed;
                self.confirmation_time = Some(time);
                if self.params.require_bull_regime && ctx.regime != Regime::Bull {
                    return ScanOutcome::NoSignal(NoTradeReason::RegimeFilter);
                }
                let score = self.score(close_location, volume_ratio, bar.close - ema, atr);
                return ScanOutcome::Signal(Signal {
                    symbol: bar.symbol.clone(),
                    timestamp: bar.timestamp,
                    direction: Direction::Long,
                    score,
                    grade: SetupGrade::from_score(score),
                    reference_price: bar.close,
                    atr,
                    session_scoped: true,
                    context: self.session_context(),
                });
            }
            PullbackState::Disabled(_) | PullbackState::Confirmed => {}
        }
        ScanOutcome::NoSignal(NoTradeReason::NoSignal)
    }

    fn score(
        &self,
        close_location: f64,
        volume_ratio: Option<f64>,
        follow_through: f64,
        atr: f64,
    ) -> f64 {
        let p = &self.params;
        let trend = 3.0;

        let headroom = 1.0 - p.min_close_location;
        let strength = if headroom > 0.0 {
            (close_location - p.min_close_location) / headroom
        } else {
            1.0
        };
        let reversal = 1.5 + 1.5 * strength.clamp(0.0, 1.0);

        let confirmation = 1.0 + (follow_through / atr).clamp(0.0, 1.0);

        let volume = match volume_ratio {
            Some(ratio) if p.full_volume_ratio > 1.0 => {
                2.0 * ((ratio - 1.0) / (p.full_volume_ratio - 1.0)).clamp(0.0, 1.0)
            }
            _ => 0.0,
        };

        capped_score(&[
            (trend, 3.0),
            (reversal, 3.0),
            (confirmation, 2.0),
            (volume, 2.0),
        ])
    }
}

/// Volume of the last bar over the mean of the earlier bars in its session.
fn session_volume_ratio(history: &[Bar]) -> Option<f64> {
    let (bar, earlier) = history.split_last()?;
    let session = bar.session();
    let start = earlier
        .iter()
        .rposition(|b| b.session() != session)
        .map_or(0, |i| i + 1);
    let avg = mean_volume(&earlier[start..]).filter(|v| *v > 0.0)?;
    Some(bar.volume as f64 / avg)
}
