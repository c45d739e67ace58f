//! Symbol universe: parses the configured symbol list and loads each symbol's
//! bars, skipping symbols without enough data.

use crate::domain::error::PulltraderError;
use crate::domain::symbol_data::SymbolData;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

pub const MIN_BARS: usize = 30;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl From<UniverseError> for PulltraderError {
    fn from(err: UniverseError) -> Self {
        PulltraderError::invalid("backtest", "symbols", err.to_string())
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

pub struct Universe {
    pub symbols: Vec<SymbolData>,
    pub skipped: Vec<SkippedSymbol>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.symbols.len()
    }
}

/// Load every symbol in the date range. Symbols without data or with fewer
/// than [`MIN_BARS`] bars are skipped with a warning; it is an error only when
/// nothing is left.
pub fn load_universe(
    data_port: &dyn DataPort,
    symbols: &[String],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Universe, PulltraderError> {
    let mut loaded = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        let bars = match data_port.fetch_bars(symbol, start_date, end_date) {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                warn!(%symbol, "skipping: no bars in range");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
            Err(PulltraderError::NoData { .. }) => {
                warn!(%symbol, "skipping: no data file");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        if bars.len() < MIN_BARS {
            warn!(%symbol, bars = bars.len(), minimum = MIN_BARS, "skipping: insufficient bars");
            skipped.push(SkippedSymbol {
                symbol: symbol.clone(),
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        info!(%symbol, bars = bars.len(), "loaded");
        loaded.push(SymbolData::new(symbol.clone(), bars));
    }

    if loaded.is_empty() {
        let bars = skipped
            .iter()
            .map(|s| match s.reason {
                SkipReason::InsufficientBars { bars } => bars,
                SkipReason::NoData => 0,
            })
            .max()
            .unwrap_or(0);
        return Err(PulltraderError::InsufficientData {
            symbol: "all".to_string(),
            bars,
            minimum: MIN_BARS,
        });
    }

    if !skipped.is_empty() {
        info!(
            loaded = loaded.len(),
            requested = symbols.len(),
            "backtesting a reduced universe"
        );
    }

    Ok(Universe {
        symbols: loaded,
        skipped,
    })
}
