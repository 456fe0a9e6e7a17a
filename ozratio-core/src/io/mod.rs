//! Flat-file codecs for the files handed between pipeline stages.
//!
//! Every writer renders the whole file into memory first and only then touches
//! the filesystem, so a failed render leaves no partial file behind. Readers are
//! lenient about row content (unparseable dates drop the row, unparseable
//! numbers become missing) and strict about the header.

pub mod commodity;
pub mod index;
pub mod merged;
pub mod metrics;
pub mod schema;

use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::error::PipelineError;

pub use commodity::{load_commodity_close, render_commodity_csv, write_commodity_csv};
pub use index::{load_index_csv, render_index_csv, write_index_csv};
pub use merged::{load_merged_csv, render_merged_csv, write_merged_csv, MergedLayout, GOLD_CLOSE};
pub use metrics::{render_metrics_csv, write_metrics_csv};
pub use schema::{require_columns, Header};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Empty cell for missing, shortest round-trip text otherwise.
pub(crate) fn fmt_cell(v: Option<f64>) -> String {
    match v {
        Some(x) => x.to_string(),
        None => String::new(),
    }
}

/// Like [`fmt_cell`] but a `NaN` is also written as an empty cell.
pub(crate) fn fmt_price(x: f64) -> String {
    if x.is_nan() {
        String::new()
    } else {
        x.to_string()
    }
}

/// Coerce a cell to a number; anything unparseable is missing, and so is a
/// literal `NaN`. Infinities are kept.
pub(crate) fn parse_cell(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse the leading `YYYY-MM-DD` of a cell, ignoring any time suffix.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// Read a CSV file into its header and raw records.
pub(crate) fn read_records(path: &Path) -> Result<(Header, Vec<StringRecord>), PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;
    let header = Header::new(
        rdr.headers()
            .map_err(|e| PipelineError::csv(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect(),
    );
    let records = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::csv(path, e))?;
    Ok((header, records))
}

/// Finish an in-memory CSV writer into text.
pub(crate) fn finish(
    wtr: csv::Writer<Vec<u8>>,
    path: &Path,
) -> Result<String, PipelineError> {
    let data = wtr
        .into_inner()
        .map_err(|e| PipelineError::io(path, e.into_error()))?;
    String::from_utf8(data).map_err(|e| PipelineError::InvalidRow {
        path: path.to_path_buf(),
        row: 0,
        reason: e.to_string(),
    })
}

/// Write rendered text to `path`, creating parent directories.
pub fn write_text(path: &Path, text: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    std::fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}
