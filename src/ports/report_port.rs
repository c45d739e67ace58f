//! Journal and summary output port.

use std::path::Path;

use crate::domain::error::PulltraderError;
use crate::domain::journal::TradeRecord;
use crate::domain::metrics::Summary;

/// Port for persisting backtest results and reading journals back for analysis.
pub trait ReportPort {
    fn write_journal(&self, records: &[TradeRecord], path: &Path) -> Result<(), PulltraderError>;

    fn write_summary(&self, summary: &Summary, path: &Path) -> Result<(), PulltraderError>;

    fn read_journal(&self, path: &Path) -> Result<Vec<TradeRecord>, PulltraderError>;
}
