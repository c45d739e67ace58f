//! CSV file data adapter.
//!
//! One file per symbol, `<data_dir>/<SYMBOL>.csv`, with header
//! `timestamp,open,high,low,close,volume`. Timestamps are `YYYY-MM-DD` for
//! daily bars or `YYYY-MM-DD HH:MM[:SS]` for intraday bars.

use crate::domain::error::PulltraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn field<T: FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<T, PulltraderError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| PulltraderError::Data {
        reason: format!("line {line}: missing {name} column"),
    })?;
    raw.trim().parse().map_err(|e| PulltraderError::Data {
        reason: format!("line {line}: invalid {name} value '{raw}': {e}"),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, PulltraderError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Err(PulltraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let raw_ts = record.get(0).ok_or_else(|| PulltraderError::Data {
                reason: format!("line {line}: missing timestamp column"),
            })?;
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| PulltraderError::Data {
                reason: format!("line {line}: invalid timestamp '{raw_ts}'"),
            })?;

            let session = timestamp.date();
            if start_date.is_some_and(|s| session < s) || end_date.is_some_and(|e| session > e) {
                continue;
            }

            let bar = Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: field(&record, 1, "open", line)?,
                high: field(&record, 2, "high", line)?,
                low: field(&record, 3, "low", line)?,
                close: field(&record, 4, "close", line)?,
                volume: field(&record, 5, "volume", line)?,
            };
            if bar.high < bar.low || bar.close > bar.high || bar.close < bar.low {
                return Err(PulltraderError::Data {
                    reason: format!("line {line}: inconsistent OHLC values for {symbol}"),
                });
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PulltraderError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv")
                && let Some(stem) = path.file_stem()
            {
                symbols.push(stem.to_string_lossy().to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}
