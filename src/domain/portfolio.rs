//! Portfolio state: cash, open positions, sizing, and the equity curve.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::execution::ExecutionConfig;
use super::exit::{ExitAction, ExitDecision};
use super::journal::NoTradeReason;
use super::ohlcv::Bar;
use super::position::{ExitFill, Position, PositionId};
use super::signal::{SetupGrade, Signal};

/// What position sizes are a fraction of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizingBase {
    #[default]
    StartingCapital,
    CurrentEquity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingConfig {
    /// Fraction of the sizing base committed per position.
    pub position_size: f64,
    pub base: SizingBase,
    pub max_positions: usize,
    /// Per-grade overrides of `position_size`.
    pub grade_fractions: BTreeMap<SetupGrade, f64>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig {
            position_size: 0.25,
            base: SizingBase::StartingCapital,
            max_positions: 4,
            grade_fractions: BTreeMap::new(),
        }
    }
}

impl SizingConfig {
    pub fn fraction_for(&self, grade: SetupGrade) -> f64 {
        self.grade_fractions
            .get(&grade)
            .copied()
            .unwrap_or(self.position_size)
    }
}

/// Why a signal could not be turned into a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("a position in this symbol is already open")]
    DuplicateSymbol,
    #[error("maximum concurrent positions reached")]
    MaxPositions,
    #[error("insufficient capital for one share")]
    InsufficientCapital,
}

impl From<RejectReason> for NoTradeReason {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::DuplicateSymbol => NoTradeReason::DuplicateSymbol,
            RejectReason::MaxPositions => NoTradeReason::MaxPositions,
            RejectReason::InsufficientCapital => NoTradeReason::InsufficientCapital,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_capital: f64,
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub closed: Vec<Position>,
    pub equity_curve: Vec<EquityPoint>,
    sizing: SizingConfig,
    last_prices: BTreeMap<String, f64>,
    next_id: PositionId,
}

impl Portfolio {
    pub fn new(initial_capital: f64, sizing: SizingConfig) -> Self {
        Portfolio {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            closed: Vec::new(),
            equity_curve: Vec::new(),
            sizing,
            last_prices: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Cash plus open positions at their last marked price.
    pub fn equity(&self) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = self
                    .last_prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Size and open a position for `signal` at `market_price`.
    ///
    /// Rejections are checked in order: duplicate symbol, position cap, capital.
    pub fn open(
        &mut self,
        signal: &Signal,
        market_price: f64,
        timestamp: NaiveDateTime,
        execution: &ExecutionConfig,
        atr_stop_multiple: f64,
    ) -> Result<PositionId, RejectReason> {
        if self.has_position(&signal.symbol) {
            return Err(RejectReason::DuplicateSymbol);
        }
        if self.positions.len() >= self.sizing.max_positions {
            return Err(RejectReason::MaxPositions);
        }

        let fill_price = execution.entry_price(market_price);
        let base = match self.sizing.base {
            SizingBase::StartingCapital => self.initial_capital,
            SizingBase::CurrentEquity => self.equity(),
        };
        let budget = base * self.sizing.fraction_for(signal.grade);
        let shares = (budget / fill_price).floor();
        if !shares.is_finite() || shares < 1.0 {
            return Err(RejectReason::InsufficientCapital);
        }
        let shares = shares as u64;

        let cost = shares as f64 * fill_price;
        let commission = execution.commission(cost);
        if cost + commission > self.cash {
            return Err(RejectReason::InsufficientCapital);
        }
        self.cash -= cost + commission;

        let id = self.next_id;
        self.next_id += 1;
        let mut position = Position::new(
            id,
            signal,
            fill_price,
            shares,
            timestamp,
            atr_stop_multiple,
            commission,
        );
        position.activate();
        self.last_prices.insert(signal.symbol.clone(), market_price);
        self.positions.insert(signal.symbol.clone(), position);
        Ok(id)
    }

    /// Apply an exit decision to the open position in `symbol`.
    ///
    /// Returns `None` for a hold or when no position is open.
    pub fn apply_exit(
        &mut self,
        symbol: &str,
        decision: &ExitDecision,
        timestamp: NaiveDateTime,
        execution: &ExecutionConfig,
    ) -> Option<ExitFill> {
        let reason = decision.reason?;
        let position = self.positions.get_mut(symbol)?;

        let shares = match decision.action {
            ExitAction::Hold => return None,
            ExitAction::CloseFull => position.remaining_shares,
            ExitAction::ClosePartial { fraction, level } => {
                let first_scale = !position.has_scaled_out();
                position.scale_levels_taken.push(level);
                if first_scale {
                    position.stop_price = position.stop_price.max(position.entry_price);
                }
                // Nearest whole share, never zero.
                let tranche =
                    (position.initial_shares as f64 * fraction).round().max(1.0) as u64;
                tranche.min(position.remaining_shares)
            }
        };

        let price = execution.exit_price(decision.price);
        let proceeds = shares as f64 * price;
        let commission = execution.commission(proceeds);
        let fill = position.close_shares(shares, price, timestamp, reason, commission);
        self.cash += proceeds - commission;

        if position.is_closed()
            && let Some(closed) = self.positions.remove(symbol)
        {
            self.closed.push(closed);
        }
        Some(fill)
    }

    /// Update marks for every open position with a bar; returns total unrealized P&L.
    pub fn mark_to_market(&mut self, bars: &[&Bar]) -> f64 {
        for bar in bars {
            if let Some(position) = self.positions.get_mut(&bar.symbol) {
                position.mark(bar);
                self.last_prices.insert(bar.symbol.clone(), bar.close);
            }
        }
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    pub fn track_excursion(&mut self, bar: &Bar) {
        if let Some(position) = self.positions.get_mut(&bar.symbol) {
            position.track_excursion(bar);
        }
    }

    pub fn begin_session(&mut self, symbol: &str, session: chrono::NaiveDate) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.begin_session(session);
        }
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime) {
        let equity = self.equity();
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit::ExitReason;
    use crate::domain::position::PositionStatus;
    use crate::domain::signal::{Direction, SignalContext};
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn signal(symbol: &str, grade: SetupGrade) -> Signal {
        Signal {
            symbol: symbol.into(),
            timestamp: ts(2),
            direction: Direction::Long,
            score: 7.0,
            grade,
            reference_price: 100.0,
            atr: 2.0,
            session_scoped: false,
            context: SignalContext::default(),
        }
    }

    fn bar(symbol: &str, day: u32, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            timestamp: ts(day),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    fn portfolio() -> Portfolio {
        Portfolio::new(100_000.0, SizingConfig::default())
    }

    #[test]
    fn opens_fixed_fraction_of_start() {
        let mut pf = portfolio();
        let exec = ExecutionConfig::default();
        let id = pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        let pos = pf.get_position("QQQ").unwrap();
        assert_eq!(id, 1);
        assert_eq!(pos.initial_shares, 250);
        assert_eq!(pos.status, PositionStatus::Open);
        assert!((pf.cash - 75_000.0).abs() < 1e-9);
        assert!((pf.equity() - 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn rejections_in_order() {
        let mut pf = Portfolio::new(
            1_000.0,
            SizingConfig {
                max_positions: 1,
                ..SizingConfig::default()
            },
        );
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        assert_eq!(
            pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2),
            Err(RejectReason::DuplicateSymbol)
        );
        assert_eq!(
            pf.open(&signal("SPY", SetupGrade::A), 100.0, ts(3), &exec, 1.2),
            Err(RejectReason::MaxPositions)
        );

        let mut small = Portfolio::new(50.0, SizingConfig::default());
        assert_eq!(
            small.open(&signal("SPY", SetupGrade::A), 100.0, ts(3), &exec, 1.2),
            Err(RejectReason::InsufficientCapital)
        );
    }

    #[test]
    fn grade_table_overrides_fraction() {
        let mut fractions = BTreeMap::new();
        fractions.insert(SetupGrade::APlus, 0.5);
        let mut pf = Portfolio::new(
            100_000.0,
            SizingConfig {
                grade_fractions: fractions,
                ..SizingConfig::default()
            },
        );
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::APlus), 100.0, ts(3), &exec, 1.2).unwrap();
        pf.open(&signal("SPY", SetupGrade::B), 100.0, ts(3), &exec, 1.2).unwrap();
        assert_eq!(pf.get_position("QQQ").unwrap().initial_shares, 500);
        assert_eq!(pf.get_position("SPY").unwrap().initial_shares, 250);
    }

    #[test]
    fn current_equity_sizing_follows_pnl() {
        let mut pf = Portfolio::new(
            100_000.0,
            SizingConfig {
                base: SizingBase::CurrentEquity,
                ..SizingConfig::default()
            },
        );
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        pf.mark_to_market(&[&bar("QQQ", 4, 140.0, 100.0, 140.0)]);
        // equity 110_000 → 27_500 budget
        pf.open(&signal("SPY", SetupGrade::A), 100.0, ts(4), &exec, 1.2).unwrap();
        assert_eq!(pf.get_position("SPY").unwrap().initial_shares, 275);
    }

    #[test]
    fn partial_exit_moves_stop_to_breakeven() {
        let mut pf = portfolio();
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        let fill = pf
            .apply_exit("QQQ", &ExitDecision::partial(0.25, 0, 108.0), ts(5), &exec)
            .unwrap();
        assert_eq!(fill.shares, 63);
        assert_eq!(fill.reason, ExitReason::ScaleOut);
        let pos = pf.get_position("QQQ").unwrap();
        assert!((pos.stop_price - 100.0).abs() < f64::EPSILON);
        assert_eq!(pos.remaining_shares + pos.closed_shares, pos.initial_shares);
        assert_eq!(pos.status, PositionStatus::PartiallyClosed);
    }

    #[test]
    fn tiny_partial_sells_one_share() {
        let mut pf = portfolio();
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        let fill = pf
            .apply_exit("QQQ", &ExitDecision::partial(0.001, 0, 108.0), ts(5), &exec)
            .unwrap();
        assert_eq!(fill.shares, 1);
        assert_eq!(pf.get_position("QQQ").unwrap().remaining_shares, 249);
    }

    #[test]
    fn oversized_partial_becomes_full_close() {
        let mut pf = portfolio();
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        pf.apply_exit("QQQ", &ExitDecision::partial(0.75, 0, 108.0), ts(5), &exec);
        pf.apply_exit("QQQ", &ExitDecision::partial(0.5, 1, 115.0), ts(6), &exec);
        assert!(!pf.has_position("QQQ"));
        assert_eq!(pf.closed.len(), 1);
        assert_eq!(pf.closed[0].closed_shares, 250);
    }

    #[test]
    fn full_exit_returns_cash_net_of_commission() {
        let mut pf = portfolio();
        let exec = ExecutionConfig {
            commission_per_trade: 5.0,
            ..Default::default()
        };
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        let decision = ExitDecision::close(ExitReason::HardStop, 97.6);
        pf.apply_exit("QQQ", &decision, ts(4), &exec).unwrap();
        // 100_000 - 25_000 - 5 + 24_400 - 5
        assert!((pf.cash - 99_390.0).abs() < 1e-6);
        assert!((pf.closed[0].net_pnl() - (-610.0)).abs() < 1e-6);
    }

    #[test]
    fn hold_is_a_no_op() {
        let mut pf = portfolio();
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        assert!(pf.apply_exit("QQQ", &ExitDecision::hold(101.0), ts(4), &exec).is_none());
        let close = ExitDecision::close(ExitReason::EndOfTest, 1.0);
        assert!(pf.apply_exit("SPY", &close, ts(4), &exec).is_none());
    }

    #[test]
    fn equity_curve_records_marks() {
        let mut pf = portfolio();
        let exec = ExecutionConfig::default();
        pf.open(&signal("QQQ", SetupGrade::A), 100.0, ts(3), &exec, 1.2).unwrap();
        let unrealized = pf.mark_to_market(&[&bar("QQQ", 3, 102.0, 99.0, 101.0)]);
        pf.record_equity(ts(3));
        assert!((unrealized - 250.0).abs() < 1e-9);
        assert!((pf.equity_curve[0].equity - 100_250.0).abs() < 1e-9);
    }
}
