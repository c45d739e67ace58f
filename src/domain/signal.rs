//! Entry signals produced by the scanners.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const GRADE_A_PLUS_MIN: f64 = 9.0;
pub const GRADE_A_MIN: f64 = 7.0;
pub const GRADE_B_MIN: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
}

/// Setup grade derived from the quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SetupGrade {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl SetupGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= GRADE_A_PLUS_MIN {
            SetupGrade::APlus
        } else if score >= GRADE_A_MIN {
            SetupGrade::A
        } else if score >= GRADE_B_MIN {
            SetupGrade::B
        } else {
            SetupGrade::C
        }
    }

    /// C setups are never entered.
    pub fn is_tradeable(&self) -> bool {
        *self != SetupGrade::C
    }
}

impl fmt::Display for SetupGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SetupGrade::APlus => "A+",
            SetupGrade::A => "A",
            SetupGrade::B => "B",
            SetupGrade::C => "C",
        };
        f.write_str(label)
    }
}

/// Strategy-specific context carried from the scanner into the journal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalContext {
    pub trend_valid: Option<bool>,
    pub reversal_strength_ok: Option<bool>,
    pub confirmation_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub direction: Direction,
    pub score: f64,
    pub grade: SetupGrade,
    /// Close of the bar that produced the signal.
    pub reference_price: f64,
    /// ATR at the signal bar; frozen into the position as its entry ATR.
    pub atr: f64,
    /// Intraday signals expire if the next bar opens a new session.
    pub session_scoped: bool,
    pub context: SignalContext,
}

impl Signal {
    pub fn session(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Admission order for signals competing for capital on the same bar:
/// higher score first, then the earlier signal, then symbol for a total order.
pub fn admission_order(a: &Signal, b: &Signal) -> std::cmp::Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Sum of component scores, each clipped to `[0, cap]`.
pub fn capped_score(components: &[(f64, f64)]) -> f64 {
    components
        .iter()
        .map(|&(value, cap)| value.clamp(0.0, cap))
        .sum()
}
