#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use pulltrader::domain::error::PulltraderError;
pub use pulltrader::domain::ohlcv::Bar;
use pulltrader::domain::scanner::{BreakoutParams, PullbackParams, ScannerConfig};
use pulltrader::domain::strategy::StrategyConfig;
use pulltrader::domain::symbol_data::SymbolData;
use pulltrader::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, PulltraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PulltraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).ok_or_else(|| PulltraderError::NoData {
            symbol: symbol.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| start_date.is_none_or(|s| b.session() >= s))
            .filter(|b| end_date.is_none_or(|e| b.session() <= e))
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, PulltraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Midnight of 2024-01-01 plus `i` days.
pub fn day(i: usize) -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap() + Duration::days(i as i64)
}

pub fn daily_bar(symbol: &str, i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp: day(i),
        open,
        high,
        low,
        close,
        volume: 1000,
    }
}

/// Five-minute bar in session `session` (counted from 2024-03-04).
pub fn intraday_bar(
    symbol: &str,
    session: usize,
    hour: u32,
    minute: u32,
    (open, high, low, close): (f64, f64, f64, f64),
) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp: (date(2024, 3, 4) + Duration::days(session as i64))
            .and_hms_opt(hour, minute, 0)
            .unwrap(),
        open,
        high,
        low,
        close,
        volume: 1000,
    }
}

pub fn flat_bars(symbol: &str, count: usize, price: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| daily_bar(symbol, i, price, price + 1.0, price - 1.0, price))
        .collect()
}

/// 40 rising bars, a 20-bar base at 99..101, then a volume breakout to 103 on bar 60.
pub fn breakout_bars(symbol: &str) -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..40)
        .map(|i| {
            let close = 40.0 + 1.5 * i as f64;
            daily_bar(symbol, i, close, close + 3.0, close - 3.0, close)
        })
        .collect();
    bars.extend((40..60).map(|i| daily_bar(symbol, i, 100.0, 101.0, 99.0, 100.0)));
    let mut breakout = daily_bar(symbol, 60, 100.5, 103.5, 100.0, 103.0);
    breakout.volume = 3000;
    bars.push(breakout);
    bars
}

/// [`breakout_bars`] followed by `tail` as (open, high, low, close) from bar 61.
pub fn breakout_with_tail(symbol: &str, tail: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    let mut bars = breakout_bars(symbol);
    for (k, &(o, h, l, c)) in tail.iter().enumerate() {
        bars.push(daily_bar(symbol, 61 + k, o, h, l, c));
    }
    bars
}

pub fn symbol_data(symbol: &str, bars: Vec<Bar>) -> SymbolData {
    SymbolData::new(symbol.to_string(), bars)
}

pub fn breakout_strategy() -> StrategyConfig {
    StrategyConfig {
        scanner: ScannerConfig::Breakout(BreakoutParams {
            max_base_volatility_pct: 5.0,
            ..BreakoutParams::default()
        }),
        ..StrategyConfig::default()
    }
}

pub fn pullback_strategy() -> StrategyConfig {
    StrategyConfig {
        scanner: ScannerConfig::PullbackReversal(PullbackParams {
            trend_sma_period: 2,
            ..PullbackParams::default()
        }),
        ..StrategyConfig::default()
    }
}

/// Two quiet sessions of 21 five-minute bars at 100, enough to warm up EMA20,
/// ATR14 and a two-session trend average.
pub fn quiet_sessions(symbol: &str) -> Vec<Bar> {
    let mut bars = Vec::new();
    for session in 0..2 {
        for k in 0..21u32 {
            let minutes = 30 + 5 * k;
            bars.push(intraday_bar(
                symbol,
                session,
                9 + minutes / 60,
                minutes % 60,
                (100.0, 100.5, 99.5, 100.0),
            ));
        }
    }
    bars
}

/// Open above trend, pullback below EMA20, strong reversal, confirmation at 09:45.
pub fn pullback_session(symbol: &str, session: usize) -> Vec<Bar> {
    vec![
        intraday_bar(symbol, session, 9, 30, (101.0, 101.2, 100.8, 101.0)),
        intraday_bar(symbol, session, 9, 35, (100.5, 100.6, 98.8, 99.0)),
        intraday_bar(symbol, session, 9, 40, (99.0, 101.0, 98.5, 100.8)),
        intraday_bar(symbol, session, 9, 45, (100.8, 101.2, 100.6, 101.0)),
    ]
}

pub fn write_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}
