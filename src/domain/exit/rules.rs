//! Individual exit rules. Each returns `Some(decision)` when it fires.

use super::{
    ExitContext, ExitDecision, ExitReason, ExitRules, MaBreak, MovingAverage, ScaleLevel, StopMode,
    TrailDistance, TrailingBracket,
};
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::ohlcv::Bar;
use crate::domain::position::Position;

/// Price at which a stop at `level` fills on `bar`, if it is hit.
fn stop_fill(bar: &Bar, level: f64, mode: StopMode) -> Option<f64> {
    match mode {
        StopMode::Close => (bar.close <= level).then_some(bar.close),
        StopMode::IntradayLow => (bar.low <= level).then_some(bar.open.min(level)),
    }
}

pub fn hard_stop(position: &Position, bar: &Bar, mode: StopMode) -> Option<ExitDecision> {
    stop_fill(bar, position.stop_price, mode).map(|price| ExitDecision::close(ExitReason::HardStop, price))
}

/// The first untaken level whose profit target the close has reached.
pub fn scale_out(position: &Position, bar: &Bar, levels: &[ScaleLevel]) -> Option<ExitDecision> {
    let profit_pct = position.unrealized_return(bar.close) * 100.0;
    levels
        .iter()
        .enumerate()
        .find(|(i, level)| {
            !position.scale_levels_taken.contains(i) && profit_pct >= level.profit_pct
        })
        .map(|(i, level)| ExitDecision::partial(level.fraction, i, bar.close))
}

/// Trailing stop level below the highest close so far, if a bracket is active.
///
/// The bracket is chosen by peak profit, so the trail only ever tightens.
pub fn trailing_level(position: &Position, brackets: &[TrailingBracket]) -> Option<f64> {
    let peak_pct = position.unrealized_return(position.highest_close) * 100.0;
    let bracket = brackets
        .iter()
        .rev()
        .find(|b| peak_pct >= b.min_profit_pct)?;
    let distance = match bracket.distance {
        TrailDistance::AtrMultiple(k) => k * position.entry_atr,
        TrailDistance::Percent(p) => position.highest_close * p / 100.0,
    };
    Some(position.highest_close - distance)
}

pub fn trailing_stop(
    position: &Position,
    bar: &Bar,
    mode: StopMode,
    brackets: &[TrailingBracket],
) -> Option<ExitDecision> {
    let level = trailing_level(position, brackets)?;
    stop_fill(bar, level, mode).map(|price| ExitDecision::close(ExitReason::TrailingStop, price))
}

pub fn ma_break(
    position: &Position,
    bar: &Bar,
    indicators: &IndicatorSnapshot,
    rule: Option<MaBreak>,
) -> Option<ExitDecision> {
    let rule = rule?;
    let average = match rule.average {
        MovingAverage::Ema20 => indicators.ema20.as_ref().ok()?,
        MovingAverage::Sma20 => indicators.sma20.as_ref().ok()?,
    };
    let profit_pct = position.unrealized_return(bar.close) * 100.0;
    (bar.close < *average && profit_pct < rule.profit_ceiling_pct)
        .then(|| ExitDecision::close(ExitReason::MaBreak, bar.close))
}

/// Fires on the bar that confirms a swing high lower than the previous swing
/// high since entry, once profit has reached `activation_pct`.
pub fn lower_high(
    position: &Position,
    since_entry: &[Bar],
    activation_pct: Option<f64>,
) -> Option<ExitDecision> {
    let activation_pct = activation_pct?;
    let bar = since_entry.last()?;
    if position.unrealized_return(bar.close) * 100.0 < activation_pct {
        return None;
    }
    let swings = swing_highs(since_entry);
    let (&latest, earlier) = swings.split_last()?;
    if latest != since_entry.len() - 2 {
        return None;
    }
    let previous = *earlier.last()?;
    (since_entry[latest].high < since_entry[previous].high)
        .then(|| ExitDecision::close(ExitReason::LowerHigh, bar.close))
}

/// Indices of bars whose high is strictly above both neighbours.
fn swing_highs(bars: &[Bar]) -> Vec<usize> {
    bars.windows(3)
        .enumerate()
        .filter(|(_, w)| w[1].high > w[0].high && w[1].high > w[2].high)
        .map(|(i, _)| i + 1)
        .collect()
}

pub fn time_stop(
    position: &Position,
    ctx: &ExitContext<'_>,
    rules: &ExitRules,
) -> Option<ExitDecision> {
    let expired = rules
        .max_hold_days
        .is_some_and(|days| position.sessions_held >= days);
    let flatten = rules.flatten_at_session_end && ctx.is_session_last_bar;
    (expired || flatten).then(|| ExitDecision::close(ExitReason::TimeStop, ctx.bar.close))
}

pub fn end_of_test(ctx: &ExitContext<'_>) -> Option<ExitDecision> {
    ctx.is_final_bar
        .then(|| ExitDecision::close(ExitReason::EndOfTest, ctx.bar.close))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{bar, not_ready_snapshot, position};
    use super::*;
    use crate::domain::exit::ExitAction;

    #[test]
    fn intraday_stop_fills_at_open_on_gap() {
        let pos = position();
        let gap = bar(5, 95.0, 96.0, 94.0, 95.5);
        let decision = hard_stop(&pos, &gap, StopMode::IntradayLow).unwrap();
        assert!((decision.price - 95.0).abs() < f64::EPSILON);

        let touch = bar(6, 99.0, 99.5, 97.0, 98.5);
        let decision = hard_stop(&pos, &touch, StopMode::IntradayLow).unwrap();
        assert!((decision.price - 97.6).abs() < 1e-9);
    }

    #[test]
    fn trailing_bracket_by_peak_profit() {
        let mut pos = position();
        let brackets = vec![
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
        ];
        pos.highest_close = 105.0;
        assert!((trailing_level(&pos, &brackets).unwrap() - 99.0).abs() < 1e-9);
        pos.highest_close = 110.0;
        assert!((trailing_level(&pos, &brackets).unwrap() - 106.0).abs() < 1e-9);
        pos.highest_close = 120.0;
        assert!((trailing_level(&pos, &brackets).unwrap() - 114.0).abs() < 1e-9);
    }

    #[test]
    fn trailing_inactive_below_first_bracket() {
        let pos = position();
        let brackets = vec![TrailingBracket {
            min_profit_pct: 5.0,
            distance: TrailDistance::Percent(2.0),
        }];
        assert!(trailing_level(&pos, &brackets).is_none());
    }

    #[test]
    fn scale_out_picks_lowest_untaken_level() {
        let mut pos = position();
        let levels = vec![
            ScaleLevel {
                profit_pct: 8.0,
                fraction: 0.25,
            },
            ScaleLevel {
                profit_pct: 15.0,
                fraction: 0.5,
            },
        ];
        let b = bar(5, 114.0, 116.0, 113.0, 115.5);
        let d = scale_out(&pos, &b, &levels).unwrap();
        assert_eq!(
            d.action,
            ExitAction::ClosePartial {
                fraction: 0.25,
                level: 0
            }
        );
        pos.scale_levels_taken.push(0);
        let d = scale_out(&pos, &b, &levels).unwrap();
        assert_eq!(
            d.action,
            ExitAction::ClosePartial {
                fraction: 0.5,
                level: 1
            }
        );
        pos.scale_levels_taken.push(1);
        assert!(scale_out(&pos, &b, &levels).is_none());
    }

    #[test]
    fn ma_break_respects_profit_ceiling() {
        let pos = position();
        let mut snap = not_ready_snapshot(5);
        snap.ema20 = Ok(104.0);
        let rule = Some(MaBreak {
            average: MovingAverage::Ema20,
            profit_ceiling_pct: 5.0,
        });
        let below = bar(5, 104.0, 104.5, 103.0, 103.5);
        assert!(ma_break(&pos, &below, &snap, rule).is_some());

        snap.ema20 = Ok(108.0);
        let rich = bar(6, 107.0, 107.5, 106.0, 107.0);
        assert!(ma_break(&pos, &rich, &snap, rule).is_none());
        assert!(ma_break(&pos, &below, &not_ready_snapshot(5), rule).is_none());
    }

    #[test]
    fn lower_high_after_activation() {
        let pos = position();
        let history = vec![
            bar(2, 100.0, 101.0, 99.0, 100.5),
            bar(3, 104.0, 115.0, 103.0, 112.0),
            bar(4, 112.0, 113.0, 110.0, 111.0),
            bar(5, 111.0, 114.0, 110.5, 113.0),
            bar(6, 113.0, 113.5, 111.0, 112.0),
        ];
        let d = lower_high(&pos, &history, Some(10.0)).unwrap();
        assert_eq!(d.reason, Some(ExitReason::LowerHigh));
        assert!((d.price - 112.0).abs() < f64::EPSILON);

        assert!(lower_high(&pos, &history, Some(15.0)).is_none());
        assert!(lower_high(&pos, &history[..4], Some(10.0)).is_none());
    }

    #[test]
    fn time_stop_after_max_hold() {
        let mut pos = position();
        let rules = ExitRules {
            max_hold_days: Some(3),
            ..ExitRules::default()
        };
        let b = bar(9, 101.0, 102.0, 100.0, 101.0);
        let snap = not_ready_snapshot(9);
        let history = vec![b.clone()];
        let ctx = ExitContext {
            bar: &b,
            since_entry: &history,
            indicators: &snap,
            is_session_last_bar: false,
            is_final_bar: false,
        };
        pos.sessions_held = 2;
        assert!(time_stop(&pos, &ctx, &rules).is_none());
        pos.sessions_held = 3;
        assert_eq!(
            time_stop(&pos, &ctx, &rules).unwrap().reason,
            Some(ExitReason::TimeStop)
        );
    }
}
