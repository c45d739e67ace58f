//! Per-symbol bar series and the unified replay timeline.

use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub timestamp_index: HashMap<NaiveDateTime, usize>,
}

impl SymbolData {
    /// Bars are sorted by timestamp; later duplicates of a timestamp are dropped.
    pub fn new(symbol: String, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|bar| bar.timestamp);
        bars.dedup_by_key(|bar| bar.timestamp);
        let timestamp_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.timestamp, i))
            .collect();
        Self {
            symbol,
            bars,
            timestamp_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, timestamp: NaiveDateTime) -> Option<&Bar> {
        self.timestamp_index.get(&timestamp).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, timestamp: NaiveDateTime) -> Option<usize> {
        self.timestamp_index.get(&timestamp).copied()
    }

    /// Number of distinct sessions in the series.
    pub fn session_count(&self) -> usize {
        let mut sessions: Vec<_> = self.bars.iter().map(Bar::session).collect();
        sessions.dedup();
        sessions.len()
    }

    /// Whether the bar at `index` is the last one of its session.
    pub fn is_session_last(&self, index: usize) -> bool {
        match (self.bars.get(index), self.bars.get(index + 1)) {
            (Some(bar), Some(next)) => next.session() != bar.session(),
            (Some(_), None) => true,
            _ => false,
        }
    }
}

pub fn build_unified_timeline(symbols: &[SymbolData]) -> Vec<NaiveDateTime> {
    let unique: BTreeSet<NaiveDateTime> = symbols
        .iter()
        .flat_map(|sd| sd.bars.iter().map(|bar| bar.timestamp))
        .collect();
    unique.into_iter().collect()
}
