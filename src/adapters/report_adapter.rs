//! File report adapter: journal as CSV, summary as JSON.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::error::PulltraderError;
use crate::domain::journal::TradeRecord;
use crate::domain::metrics::Summary;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct FileReportAdapter;

impl FileReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Serialize `records` as CSV with a header row.
pub fn write_journal_to<W: Write>(
    records: &[TradeRecord],
    writer: W,
) -> Result<(), PulltraderError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Pretty JSON; undefined statistics (NaN) are written as `null`.
pub fn summary_json(summary: &Summary) -> Result<String, PulltraderError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

impl ReportPort for FileReportAdapter {
    fn write_journal(&self, records: &[TradeRecord], path: &Path) -> Result<(), PulltraderError> {
        let file = fs::File::create(path)?;
        write_journal_to(records, file)
    }

    fn write_summary(&self, summary: &Summary, path: &Path) -> Result<(), PulltraderError> {
        let mut json = summary_json(summary)?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }

    fn read_journal(&self, path: &Path) -> Result<Vec<TradeRecord>, PulltraderError> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            records.push(result?);
        }
        Ok(records)
    }
}
