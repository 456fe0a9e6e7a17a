//! Commodity raw file: `Date,Open,High,Low,Close,Adj Close,Volume`.

use std::path::Path;

use tracing::debug;

use super::{finish, fmt_price, parse_cell, parse_date, read_records, write_text, DATE_FORMAT};
use crate::domain::{DailyBar, Series, TimePoint};
use crate::error::PipelineError;

pub const COMMODITY_COLUMNS: [&str; 7] =
    ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

const FILE_LABEL: &str = "Gold CSV";

/// Render bars as commodity CSV text. `NaN` prices become empty cells.
pub fn render_commodity_csv(bars: &[DailyBar], path: &Path) -> Result<String, PipelineError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(COMMODITY_COLUMNS)
        .map_err(|e| PipelineError::csv(path, e))?;
    for b in bars {
        wtr.write_record([
            b.date.format(DATE_FORMAT).to_string(),
            fmt_price(b.open),
            fmt_price(b.high),
            fmt_price(b.low),
            fmt_price(b.close),
            fmt_price(b.adj_close),
            b.volume.to_string(),
        ])
        .map_err(|e| PipelineError::csv(path, e))?;
    }
    finish(wtr, path)
}

pub fn write_commodity_csv(path: &Path, bars: &[DailyBar]) -> Result<(), PipelineError> {
    let text = render_commodity_csv(bars, path)?;
    write_text(path, &text)
}

/// Load the closing price column of a commodity file as a series named `name`.
///
/// Rows without a parseable date are dropped; this covers the ticker row some
/// providers write under the header (`,GC=F,GC=F,...`). Each row prices off
/// `Adj Close` when that cell parses and `Close` otherwise. Rows are sorted and
/// the first row wins on a repeated date.
pub fn load_commodity_close(path: &Path, name: &str) -> Result<Series, PipelineError> {
    let (header, records) = read_records(path)?;
    let date_col = header.positions(FILE_LABEL, &["Date"])?[0];
    let adj_col = header.position("Adj Close");
    let close_col = header.position("Close");
    if adj_col.is_none() && close_col.is_none() {
        return Err(PipelineError::SchemaViolation {
            file: FILE_LABEL.to_string(),
            missing: vec!["Adj Close".to_string(), "Close".to_string()],
            present: header.names().to_vec(),
        });
    }

    let cell = |rec: &csv::StringRecord, col: Option<usize>| {
        col.and_then(|c| rec.get(c)).and_then(parse_cell)
    };

    let total = records.len();
    let points: Vec<TimePoint> = records
        .iter()
        .filter_map(|rec| {
            let date = rec.get(date_col).and_then(parse_date)?;
            let value = cell(rec, adj_col).or_else(|| cell(rec, close_col));
            Some(TimePoint { date, value })
        })
        .collect();
    debug!(
        path = %path.display(),
        kept = points.len(),
        dropped = total - points.len(),
        "loaded commodity file"
    );
    Ok(Series::from_unsorted_dedup(name, points))
}
