//! Entry scanners.
//!
//! A scanner looks at one symbol's history up to the current bar and either
//! emits a [`Signal`] or explains why it did not. Scanners are stateful per
//! symbol; the backtest keeps one instance per symbol.

pub mod breakout;
pub mod pullback;

use chrono::NaiveDate;

use crate::domain::indicator::{IndicatorSnapshot, Reading};
use crate::domain::journal::NoTradeReason;
use crate::domain::ohlcv::Bar;
use crate::domain::regime::Regime;
use crate::domain::signal::{Signal, SignalContext};

pub use breakout::{BreakoutParams, BreakoutScanner};
pub use pullback::{PullbackParams, PullbackScanner, PullbackState};

/// Inputs for one scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// The symbol's bars through the current bar, inclusive.
    pub history: &'a [Bar],
    pub indicators: &'a IndicatorSnapshot,
    pub regime: Regime,
    /// Benchmark bars up to the current timestamp; empty when none is configured.
    pub benchmark: &'a [Bar],
}

impl ScanContext<'_> {
    pub fn bar(&self) -> Option<&Bar> {
        self.history.last()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Signal(Signal),
    NoSignal(NoTradeReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScannerConfig {
    Breakout(BreakoutParams),
    PullbackReversal(PullbackParams),
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig::Breakout(BreakoutParams::default())
    }
}

impl ScannerConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ScannerConfig::Breakout(_) => "breakout",
            ScannerConfig::PullbackReversal(_) => "pullback",
        }
    }

    /// Period of the daily trend average, for scanners gated on one.
    pub fn daily_trend_period(&self) -> Option<usize> {
        match self {
            ScannerConfig::Breakout(_) => None,
            ScannerConfig::PullbackReversal(p) => Some(p.trend_sma_period),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Scanner {
    Breakout(BreakoutScanner),
    PullbackReversal(PullbackScanner),
}

impl Scanner {
    pub fn new(config: &ScannerConfig) -> Self {
        match config {
            ScannerConfig::Breakout(p) => Scanner::Breakout(BreakoutScanner::new(p.clone())),
            ScannerConfig::PullbackReversal(p) => {
                Scanner::PullbackReversal(PullbackScanner::new(p.clone()))
            }
        }
    }

    /// Reset per-session state. `daily_trend` is the daily trend average over
    /// prior sessions; `None` for scanners without a daily gate.
    pub fn begin_session(
        &mut self,
        session: NaiveDate,
        open: f64,
        daily_trend: Option<Reading>,
    ) {
        match self {
            Scanner::Breakout(s) => s.begin_session(),
            Scanner::PullbackReversal(s) => s.begin_session(session, open, daily_trend),
        }
    }

    pub fn evaluate(&mut self, ctx: &ScanContext<'_>) -> ScanOutcome {
        match self {
            Scanner::Breakout(s) => s.evaluate(ctx),
            Scanner::PullbackReversal(s) => s.evaluate(ctx),
        }
    }

    /// Diagnostic fields for the journal row of the current session.
    pub fn session_context(&self) -> SignalContext {
        match self {
            Scanner::Breakout(s) => s.session_context(),
            Scanner::PullbackReversal(s) => s.session_context(),
        }
    }
}

/// Return over `lookback` bars ending at the last bar, or `None` without enough history.
pub(crate) fn trailing_return(bars: &[Bar], lookback: usize) -> Option<f64> {
    if lookback == 0 || bars.len() <= lookback {
        return None;
    }
    let last = bars.last()?.close;
    let base = bars[bars.len() - 1 - lookback].close;
    if base <= 0.0 {
        return None;
    }
    Some(last / base - 1.0)
}

/// Mean volume over `bars`, `None` when empty.
pub(crate) fn mean_volume(bars: &[Bar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().map(|b| b.volume as f64).sum::<f64>() / bars.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::closes;

    #[test]
    fn trailing_return_needs_lookback_plus_one() {
        let bars = closes(&[100.0, 105.0, 110.0]);
        assert!(trailing_return(&bars, 3).is_none());
        assert!((trailing_return(&bars, 2).unwrap() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn mean_volume_of_empty_is_none() {
        assert!(mean_volume(&[]).is_none());
        let bars = closes(&[1.0, 2.0]);
        assert!((mean_volume(&bars).unwrap() - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn config_names() {
        assert_eq!(ScannerConfig::default().name(), "breakout");
        let pullback = ScannerConfig::PullbackReversal(PullbackParams::default());
        assert_eq!(pullback.name(), "pullback");
        assert_eq!(pullback.daily_trend_period(), Some(200));
    }
}
