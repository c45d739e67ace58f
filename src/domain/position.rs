//! Position tracking with partial exits.
//!
//! A position is owned by the [`Portfolio`](super::portfolio::Portfolio); the exit
//! engine reads it and returns decisions but never mutates it.

use chrono::{NaiveDate, NaiveDateTime};

use super::exit::ExitReason;
use super::ohlcv::Bar;
use super::signal::{SetupGrade, Signal, SignalContext};

pub type PositionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Pending,
    Open,
    PartiallyClosed,
    Closed,
}

/// One closed tranche.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitFill {
    pub timestamp: NaiveDateTime,
    pub shares: u64,
    pub price: f64,
    pub reason: ExitReason,
    /// Price P&L of the tranche, before commissions.
    pub gross_pnl: f64,
    pub commission: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub symbol: String,
    pub grade: SetupGrade,
    pub score: f64,
    pub context: SignalContext,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub initial_shares: u64,
    pub remaining_shares: u64,
    pub closed_shares: u64,
    pub cost_basis: f64,
    pub entry_commission: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub highest_close: f64,
    pub highest_high: f64,
    pub lowest_low: f64,
    /// ATR at entry. Stop distances never refloat with later ATR values.
    pub entry_atr: f64,
    pub initial_stop: f64,
    /// Active hard stop; moves to breakeven after the first scale-out.
    pub stop_price: f64,
    pub risk_per_share: f64,
    pub sessions_held: usize,
    pub last_session: NaiveDate,
    pub scale_levels_taken: Vec<usize>,
    pub fills: Vec<ExitFill>,
    pub status: PositionStatus,
}

impl Position {
    /// A pending position sized at `shares`, stop `atr_stop_multiple` ATRs below the fill.
    pub fn new(
        id: PositionId,
        signal: &Signal,
        fill_price: f64,
        shares: u64,
        timestamp: NaiveDateTime,
        atr_stop_multiple: f64,
        entry_commission: f64,
    ) -> Self {
        let stop = fill_price - atr_stop_multiple * signal.atr;
        Position {
            id,
            symbol: signal.symbol.clone(),
            grade: signal.grade,
            score: signal.score,
            context: signal.context.clone(),
            entry_time: timestamp,
            entry_price: fill_price,
            initial_shares: shares,
            remaining_shares: shares,
            closed_shares: 0,
            cost_basis: shares as f64 * fill_price,
            entry_commission,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            highest_close: fill_price,
            highest_high: fill_price,
            lowest_low: fill_price,
            entry_atr: signal.atr,
            initial_stop: stop,
            stop_price: stop,
            risk_per_share: fill_price - stop,
            sessions_held: 0,
            last_session: timestamp.date(),
            scale_levels_taken: Vec::new(),
            fills: Vec::new(),
            status: PositionStatus::Pending,
        }
    }

    pub fn activate(&mut self) {
        if self.status == PositionStatus::Pending {
            self.status = PositionStatus::Open;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }

    pub fn has_scaled_out(&self) -> bool {
        !self.scale_levels_taken.is_empty()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.remaining_shares as f64 * price
    }

    /// (price - entry) / entry
    pub fn unrealized_return(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price
    }

    /// Count a new trading session while the position is held.
    pub fn begin_session(&mut self, session: NaiveDate) {
        if session > self.last_session {
            self.sessions_held += 1;
            self.last_session = session;
        }
    }

    /// Update excursion marks and unrealized P&L with a completed bar.
    pub fn mark(&mut self, bar: &Bar) {
        self.highest_close = self.highest_close.max(bar.close);
        self.track_excursion(bar);
        self.unrealized_pnl = self.remaining_shares as f64 * (bar.close - self.entry_price);
    }

    /// Widen the high/low excursion marks only; the highest close is left alone
    /// so a bar can be reviewed for exits before it is marked.
    pub fn track_excursion(&mut self, bar: &Bar) {
        self.highest_high = self.highest_high.max(bar.high);
        self.lowest_low = self.lowest_low.min(bar.low);
    }

    /// Close `shares` (capped at what remains) and return the fill.
    pub fn close_shares(
        &mut self,
        shares: u64,
        price: f64,
        timestamp: NaiveDateTime,
        reason: ExitReason,
        commission: f64,
    ) -> ExitFill {
        let shares = shares.min(self.remaining_shares);
        let gross_pnl = shares as f64 * (price - self.entry_price);

        self.remaining_shares -= shares;
        self.closed_shares += shares;
        self.realized_pnl += gross_pnl;
        self.unrealized_pnl = self.remaining_shares as f64 * (price - self.entry_price);
        self.status = if self.remaining_shares == 0 {
            PositionStatus::Closed
        } else {
            PositionStatus::PartiallyClosed
        };

        let fill = ExitFill {
            timestamp,
            shares,
            price,
            reason,
            gross_pnl,
            commission,
        };
        self.fills.push(fill.clone());
        fill
    }

    pub fn gross_pnl(&self) -> f64 {
        self.fills.iter().map(|f| f.gross_pnl).sum()
    }

    /// Gross P&L less entry and exit commissions.
    pub fn net_pnl(&self) -> f64 {
        let exit_commissions: f64 = self.fills.iter().map(|f| f.commission).sum();
        self.gross_pnl() - self.entry_commission - exit_commissions
    }

    /// Gross P&L per initial share in units of initial risk.
    pub fn r_multiple(&self) -> f64 {
        self.in_r(self.gross_pnl() / self.initial_shares as f64)
    }

    /// Worst excursion below entry, in R (zero or negative).
    pub fn mae_r(&self) -> f64 {
        self.in_r(self.lowest_low - self.entry_price).min(0.0)
    }

    /// Best excursion above entry, in R (zero or positive).
    pub fn mfe_r(&self) -> f64 {
        self.in_r(self.highest_high - self.entry_price).max(0.0)
    }

    /// Share-weighted average exit price.
    pub fn average_exit_price(&self) -> Option<f64> {
        if self.closed_shares == 0 {
            return None;
        }
        let notional: f64 = self.fills.iter().map(|f| f.shares as f64 * f.price).sum();
        Some(notional / self.closed_shares as f64)
    }

    pub fn final_fill(&self) -> Option<&ExitFill> {
        self.fills.last()
    }

    fn in_r(&self, per_share: f64) -> f64 {
        if self.risk_per_share <= 0.0 || self.initial_shares == 0 {
            return 0.0;
        }
        per_share / self.risk_per_share
    }
}
