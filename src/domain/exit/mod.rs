//! Exit strategy engine.
//!
//! Rules are evaluated once per bar per open position in a fixed priority
//! order; the first rule that fires decides the bar:
//!
//! 1. hard stop
//! 2. scale-out level (scaled variant only)
//! 3. trailing stop
//! 4. moving-average break
//! 5. lower high (single variant only)
//! 6. time stop / session flatten
//! 7. end of test

pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::ohlcv::Bar;
use crate::domain::position::Position;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    HardStop,
    TrailingStop,
    MaBreak,
    LowerHigh,
    TimeStop,
    EndOfTest,
    ScaleOut,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::HardStop => "HARD_STOP",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::MaBreak => "MA_BREAK",
            ExitReason::LowerHigh => "LOWER_HIGH",
            ExitReason::TimeStop => "TIME_STOP",
            ExitReason::EndOfTest => "END_OF_TEST",
            ExitReason::ScaleOut => "SCALE_OUT",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitAction {
    Hold,
    /// Close `fraction` of the original share count for scale level `level`.
    ClosePartial { fraction: f64, level: usize },
    CloseFull,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitDecision {
    pub action: ExitAction,
    pub reason: Option<ExitReason>,
    pub price: f64,
}

impl ExitDecision {
    pub fn hold(price: f64) -> Self {
        ExitDecision {
            action: ExitAction::Hold,
            reason: None,
            price,
        }
    }

    pub fn close(reason: ExitReason, price: f64) -> Self {
        ExitDecision {
            action: ExitAction::CloseFull,
            reason: Some(reason),
            price,
        }
    }

    pub fn partial(fraction: f64, level: usize, price: f64) -> Self {
        ExitDecision {
            action: ExitAction::ClosePartial { fraction, level },
            reason: Some(ExitReason::ScaleOut),
            price,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.action == ExitAction::Hold
    }
}

/// Which price a stop is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Only the bar close can trigger a stop; the fill is the close.
    Close,
    /// The bar low triggers the stop; the fill is the stop level, or the open on a gap.
    IntradayLow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrailDistance {
    AtrMultiple(f64),
    Percent(f64),
}

/// Trailing distance that applies once peak profit reaches `min_profit_pct`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingBracket {
    pub min_profit_pct: f64,
    pub distance: TrailDistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovingAverage {
    Ema20,
    Sma20,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaBreak {
    pub average: MovingAverage,
    /// The break only fires while unrealized profit is below this.
    pub profit_ceiling_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub profit_pct: f64,
    /// Fraction of the original share count closed at this level.
    pub fraction: f64,
}

/// Rules shared by both exit variants.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitRules {
    pub stop_mode: StopMode,
    pub atr_stop_multiple: f64,
    /// Sorted by `min_profit_pct`.
    pub trailing: Vec<TrailingBracket>,
    pub ma_break: Option<MaBreak>,
    pub lower_high_activation_pct: Option<f64>,
    pub max_hold_days: Option<usize>,
    pub flatten_at_session_end: bool,
}

impl Default for ExitRules {
    fn default() -> Self {
        ExitRules {
            stop_mode: StopMode::Close,
            atr_stop_multiple: 1.2,
            trailing: vec![
                TrailingBracket {
                    min_profit_pct: 0.0,
                    distance: TrailDistance::AtrMultiple(3.0),
                },
                TrailingBracket {
                    min_profit_pct: 10.0,
                    distance: TrailDistance::AtrMultiple(2.0),
                },
                TrailingBracket {
                    min_profit_pct: 15.0,
                    distance: TrailDistance::Percent(5.0),
                },
            ],
            ma_break: Some(MaBreak {
                average: MovingAverage::Ema20,
                profit_ceiling_pct: 5.0,
            }),
            lower_high_activation_pct: Some(10.0),
            max_hold_days: Some(20),
            flatten_at_session_end: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitStrategy {
    /// All-or-nothing exit.
    Single(ExitRules),
    /// Progressive scale-out, then the remainder trails.
    Scaled {
        rules: ExitRules,
        /// Sorted by `profit_pct`.
        levels: Vec<ScaleLevel>,
        /// Trailing profile after the first scale-out; empty keeps `rules.trailing`.
        post_scale_trailing: Vec<TrailingBracket>,
    },
}

/// Everything the exit engine may look at for one bar.
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub bar: &'a Bar,
    /// Bars from the entry bar through the current bar, inclusive.
    pub since_entry: &'a [Bar],
    pub indicators: &'a IndicatorSnapshot,
    pub is_session_last_bar: bool,
    pub is_final_bar: bool,
}

impl ExitStrategy {
    pub fn rules(&self) -> &ExitRules {
        match self {
            ExitStrategy::Single(rules) => rules,
            ExitStrategy::Scaled { rules, .. } => rules,
        }
    }

    pub fn decide(&self, position: &Position, ctx: &ExitContext<'_>) -> ExitDecision {
        let bar = ctx.bar;
        match self {
            ExitStrategy::Single(r) => rules::hard_stop(position, bar, r.stop_mode)
                .or_else(|| rules::trailing_stop(position, bar, r.stop_mode, &r.trailing))
                .or_else(|| rules::ma_break(position, bar, ctx.indicators, r.ma_break))
                .or_else(|| {
                    rules::lower_high(position, ctx.since_entry, r.lower_high_activation_pct)
                })
                .or_else(|| rules::time_stop(position, ctx, r))
                .or_else(|| rules::end_of_test(ctx))
                .unwrap_or_else(|| ExitDecision::hold(bar.close)),
            ExitStrategy::Scaled {
                rules: r,
                levels,
                post_scale_trailing,
            } => {
                let trailing = if position.has_scaled_out() && !post_scale_trailing.is_empty() {
                    post_scale_trailing
                } else {
                    &r.trailing
                };
                rules::hard_stop(position, bar, r.stop_mode)
                    .or_else(|| rules::scale_out(position, bar, levels))
                    .or_else(|| rules::trailing_stop(position, bar, r.stop_mode, trailing))
                    .or_else(|| rules::ma_break(position, bar, ctx.indicators, r.ma_break))
                    .or_else(|| rules::time_stop(position, ctx, r))
                    .or_else(|| rules::end_of_test(ctx))
                    .unwrap_or_else(|| ExitDecision::hold(bar.close))
            }
        }
    }

    /// Review the remainder on the bar that just filled a scale-out.
    ///
    /// The breakeven stop and the post-scale trail apply from the next bar on,
    /// so only further levels and the bar-independent closes are checked here.
    pub fn decide_after_scale_out(
        &self,
        position: &Position,
        ctx: &ExitContext<'_>,
    ) -> ExitDecision {
        let bar = ctx.bar;
        match self {
            ExitStrategy::Single(_) => ExitDecision::hold(bar.close),
            ExitStrategy::Scaled {
                rules: r, levels, ..
            } => rules::scale_out(position, bar, levels)
                .or_else(|| rules::time_stop(position, ctx, r))
                .or_else(|| rules::end_of_test(ctx))
                .unwrap_or_else(|| ExitDecision::hold(bar.close)),
        }
    }
}
