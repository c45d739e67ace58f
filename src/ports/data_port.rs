//! Data access port trait.

use crate::domain::error::PulltraderError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` whose session falls inside the optional date range,
    /// sorted by timestamp.
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, PulltraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, PulltraderError>;
}
