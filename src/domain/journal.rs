//! Trade journal: one row per evaluated symbol-session.
//!
//! Rows are pushed when a symbol's session ends. A row that opened a trade
//! carries the trade id; its outcome columns are filled from the closed
//! position once the run is over, since a trade may span many sessions.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::exit::ExitReason;
use super::position::{Position, PositionId};
use super::signal::{SetupGrade, SignalContext};

/// Label used when an entry time falls outside every configured bucket.
pub const UNBUCKETED: &str = "OTHER";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoTradeReason {
    /// Setup conditions not met.
    NoSignal,
    /// Indicators or history still warming up.
    NotReady,
    TrendFilter,
    OutsideWindow,
    RegimeFilter,
    /// Grade C setups are journaled but never entered.
    GradeTooLow,
    InsufficientCapital,
    MaxPositions,
    DuplicateSymbol,
    /// Session-scoped signal whose entry bar fell in the next session.
    SignalExpired,
    /// Already holding the symbol when the session began.
    PositionOpen,
}

impl fmt::Display for NoTradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoTradeReason::NoSignal => "NO_SIGNAL",
            NoTradeReason::NotReady => "NOT_READY",
            NoTradeReason::TrendFilter => "TREND_FILTER",
            NoTradeReason::OutsideWindow => "OUTSIDE_WINDOW",
            NoTradeReason::RegimeFilter => "REGIME_FILTER",
            NoTradeReason::GradeTooLow => "GRADE_TOO_LOW",
            NoTradeReason::InsufficientCapital => "INSUFFICIENT_CAPITAL",
            NoTradeReason::MaxPositions => "MAX_POSITIONS",
            NoTradeReason::DuplicateSymbol => "DUPLICATE_SYMBOL",
            NoTradeReason::SignalExpired => "SIGNAL_EXPIRED",
            NoTradeReason::PositionOpen => "POSITION_OPEN",
        };
        f.write_str(label)
    }
}

/// Named time-of-day window, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucket {
    pub label: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeBucket {
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalConfig {
    pub time_buckets: Vec<TimeBucket>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        let bucket = |label: &str, start: (u32, u32), end: (u32, u32)| TimeBucket {
            label: label.to_string(),
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or_default(),
        };
        JournalConfig {
            time_buckets: vec![
                bucket("EARLY", (9, 30), (10, 30)),
                bucket("MIDDAY", (10, 30), (14, 0)),
                bucket("LATE", (14, 0), (16, 0)),
            ],
        }
    }
}

impl JournalConfig {
    pub fn bucket_for(&self, timestamp: NaiveDateTime) -> String {
        let time = timestamp.time();
        self.time_buckets
            .iter()
            .find(|b| b.contains(time))
            .map_or_else(|| UNBUCKETED.to_string(), |b| b.label.clone())
    }
}

/// One journal row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub entered: bool,
    pub trade_id: Option<PositionId>,
    pub setup_grade: Option<SetupGrade>,
    pub score: Option<f64>,
    pub entry_time: Option<NaiveDateTime>,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub risk_per_share: Option<f64>,
    pub shares: Option<u64>,
    pub exit_time: Option<NaiveDateTime>,
    /// Share-weighted across all tranches.
    pub exit_price: Option<f64>,
    /// Reason on the final tranche.
    pub exit_reason: Option<ExitReason>,
    pub partial_exits: usize,
    pub r_multiple: Option<f64>,
    pub mae_r: Option<f64>,
    pub mfe_r: Option<f64>,
    pub entry_bucket: Option<String>,
    pub atr_pct_of_price: Option<f64>,
    pub gross_pnl: Option<f64>,
    pub net_pnl: Option<f64>,
    pub hold_days: Option<usize>,
    pub no_trade_reason: Option<NoTradeReason>,
    pub trend_valid: Option<bool>,
    pub reversal_strength_ok: Option<bool>,
    pub confirmation_time: Option<NaiveTime>,
}

impl TradeRecord {
    fn blank(symbol: &str, trade_date: NaiveDate, context: &SignalContext) -> Self {
        TradeRecord {
            symbol: symbol.to_string(),
            trade_date,
            entered: false,
            trade_id: None,
            setup_grade: None,
            score: None,
            entry_time: None,
            entry_price: None,
            stop_price: None,
            risk_per_share: None,
            shares: None,
            exit_time: None,
            exit_price: None,
            exit_reason: None,
            partial_exits: 0,
            r_multiple: None,
            mae_r: None,
            mfe_r: None,
            entry_bucket: None,
            atr_pct_of_price: None,
            gross_pnl: None,
            net_pnl: None,
            hold_days: None,
            no_trade_reason: None,
            trend_valid: context.trend_valid,
            reversal_strength_ok: context.reversal_strength_ok,
            confirmation_time: context.confirmation_time,
        }
    }

    pub fn no_trade(
        symbol: &str,
        trade_date: NaiveDate,
        reason: NoTradeReason,
        context: &SignalContext,
    ) -> Self {
        TradeRecord {
            no_trade_reason: Some(reason),
            ..Self::blank(symbol, trade_date, context)
        }
    }

    /// Row for the session a position was opened in. Outcome columns stay
    /// empty until [`complete`](Self::complete).
    pub fn entered(
        trade_date: NaiveDate,
        position: &Position,
        atr_pct_of_price: Option<f64>,
        entry_bucket: String,
    ) -> Self {
        TradeRecord {
            entered: true,
            trade_id: Some(position.id),
            setup_grade: Some(position.grade),
            score: Some(position.score),
            entry_time: Some(position.entry_time),
            entry_price: Some(position.entry_price),
            stop_price: Some(position.initial_stop),
            risk_per_share: Some(position.risk_per_share),
            shares: Some(position.initial_shares),
            entry_bucket: Some(entry_bucket),
            atr_pct_of_price,
            ..Self::blank(&position.symbol, trade_date, &position.context)
        }
    }

    /// Fill outcome columns from a closed position.
    pub fn complete(&mut self, position: &Position) {
        let final_fill = position.final_fill();
        self.exit_time = final_fill.map(|f| f.timestamp);
        self.exit_reason = final_fill.map(|f| f.reason);
        self.exit_price = position.average_exit_price();
        self.partial_exits = position.fills.len().saturating_sub(1);
        self.r_multiple = Some(position.r_multiple());
        self.mae_r = Some(position.mae_r());
        self.mfe_r = Some(position.mfe_r());
        self.gross_pnl = Some(position.gross_pnl());
        self.net_pnl = Some(position.net_pnl());
        self.hold_days = Some(position.sessions_held);
    }

    /// Net P&L of zero or less counts as a loss.
    pub fn is_loss(&self) -> bool {
        self.entered && self.net_pnl.is_some_and(|pnl| pnl <= 0.0)
    }

    pub fn is_win(&self) -> bool {
        self.entered && self.net_pnl.is_some_and(|pnl| pnl > 0.0)
    }
}

/// Fill every entered row's outcome from the matching closed position.
pub fn complete_records(records: &mut [TradeRecord], closed: &[Position]) {
    let by_id: BTreeMap<PositionId, &Position> = closed.iter().map(|p| (p.id, p)).collect();
    for record in records.iter_mut().filter(|r| r.entered) {
        if let Some(position) = record.trade_id.and_then(|id| by_id.get(&id)) {
            record.complete(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{Direction, Signal};

    fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn closed_position() -> Position {
        let signal = Signal {
            symbol: "QQQ".into(),
            timestamp: ts(6, 9, 50),
            direction: Direction::Long,
            score: 7.7,
            grade: SetupGrade::A,
            reference_price: 100.0,
            atr: 2.0,
            session_scoped: true,
            context: SignalContext {
                trend_valid: Some(true),
                reversal_strength_ok: Some(true),
                confirmation_time: NaiveTime::from_hms_opt(9, 50, 0),
            },
        };
        let mut pos = Position::new(7, &signal, 100.0, 100, ts(6, 9, 55), 1.2, 1.0);
        pos.activate();
        pos.close_shares(25, 108.0, ts(7, 10, 0), ExitReason::ScaleOut, 1.0);
        pos.sessions_held = 2;
        pos.close_shares(75, 104.0, ts(8, 15, 0), ExitReason::TrailingStop, 1.0);
        pos
    }

    #[test]
    fn bucket_lookup() {
        let config = JournalConfig::default();
        assert_eq!(config.bucket_for(ts(6, 9, 30)), "EARLY");
        assert_eq!(config.bucket_for(ts(6, 10, 30)), "MIDDAY");
        assert_eq!(config.bucket_for(ts(6, 15, 59)), "LATE");
        assert_eq!(config.bucket_for(ts(6, 0, 0)), UNBUCKETED);
    }

    #[test]
    fn no_trade_row_keeps_context() {
        let context = SignalContext {
            trend_valid: Some(false),
            ..SignalContext::default()
        };
        let row = TradeRecord::no_trade(
            "QQQ",
            ts(6, 0, 0).date(),
            NoTradeReason::TrendFilter,
            &context,
        );
        assert!(!row.entered);
        assert_eq!(row.no_trade_reason, Some(NoTradeReason::TrendFilter));
        assert_eq!(row.trend_valid, Some(false));
        assert!(!row.is_loss());
        assert!(!row.is_win());
    }

    #[test]
    fn completes_from_closed_position() {
        let pos = closed_position();
        let mut rows = vec![TradeRecord::entered(
            ts(6, 0, 0).date(),
            &pos,
            Some(2.0),
            "EARLY".into(),
        )];
        complete_records(&mut rows, std::slice::from_ref(&pos));
        let row = &rows[0];

        assert_eq!(row.trade_id, Some(7));
        assert_eq!(row.exit_reason, Some(ExitReason::TrailingStop));
        assert_eq!(row.exit_time, Some(ts(8, 15, 0)));
        assert_eq!(row.partial_exits, 1);
        // 25 * 8 + 75 * 4 = 500 gross, 3 commissions
        assert!((row.gross_pnl.unwrap() - 500.0).abs() < 1e-9);
        assert!((row.net_pnl.unwrap() - 497.0).abs() < 1e-9);
        assert!((row.exit_price.unwrap() - 105.0).abs() < 1e-9);
        assert_eq!(row.hold_days, Some(2));
        assert_eq!(row.reversal_strength_ok, Some(true));
        assert!(row.is_win());
    }

    #[test]
    fn reason_labels_match_serde() {
        assert_eq!(NoTradeReason::GradeTooLow.to_string(), "GRADE_TOO_LOW");
        assert_eq!(
            serde_json::to_string(&NoTradeReason::SignalExpired).unwrap(),
            "\"SIGNAL_EXPIRED\""
        );
    }
}
