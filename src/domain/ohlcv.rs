//! OHLCV bar representation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// One price bar. Daily bars carry a midnight timestamp; the session a bar
/// belongs to is the calendar date of its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    pub fn session(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Where the close sits inside the bar's range: 0 at the low, 1 at the high.
    /// `None` for a zero-range bar.
    pub fn close_location(&self) -> Option<f64> {
        let range = self.high - self.low;
        if range <= 0.0 {
            return None;
        }
        Some((self.close - self.low) / range)
    }
}
