//! Merged file: `Date,<symbols...>,Gold_Close,<label>_per_oz_gold...`.

use std::path::{Path, PathBuf};

use super::{finish, fmt_cell, parse_cell, parse_date, read_records, write_text, DATE_FORMAT};
use crate::domain::MergedRow;
use crate::error::PipelineError;
use crate::metrics::ratio_column;

pub const GOLD_CLOSE: &str = "Gold_Close";

const FILE_LABEL: &str = "Merged CSV";

/// Column layout of a merged file: one index symbol and ratio label per index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLayout {
    pub symbols: Vec<String>,
    pub labels: Vec<String>,
}

impl MergedLayout {
    pub fn new(symbols: Vec<String>, labels: Vec<String>) -> Self {
        debug_assert_eq!(symbols.len(), labels.len());
        Self { symbols, labels }
    }

    pub fn ratio_columns(&self) -> Vec<String> {
        self.labels.iter().map(|l| ratio_column(l)).collect()
    }

    pub fn header(&self) -> Vec<String> {
        let mut h = vec!["Date".to_string()];
        h.extend(self.symbols.iter().cloned());
        h.push(GOLD_CLOSE.to_string());
        h.extend(self.ratio_columns());
        h
    }
}

pub fn render_merged_csv(
    layout: &MergedLayout,
    rows: &[MergedRow],
    path: &Path,
) -> Result<String, PipelineError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(layout.header())
        .map_err(|e| PipelineError::csv(path, e))?;
    for r in rows {
        let mut rec = vec![r.date.format(DATE_FORMAT).to_string()];
        rec.extend(r.index_levels.iter().map(|v| fmt_cell(*v)));
        rec.push(r.gold_close.to_string());
        rec.extend(r.ratios.iter().map(|v| fmt_cell(*v)));
        wtr.write_record(&rec)
            .map_err(|e| PipelineError::csv(path, e))?;
    }
    finish(wtr, path)
}

pub fn write_merged_csv(
    path: &Path,
    layout: &MergedLayout,
    rows: &[MergedRow],
) -> Result<(), PipelineError> {
    let text = render_merged_csv(layout, rows, path)?;
    write_text(path, &text)
}

/// Load a merged file. A row with an unreadable `Gold_Close` is rejected,
/// since the merge stage never writes one.
pub fn load_merged_csv(path: &Path, layout: &MergedLayout) -> Result<Vec<MergedRow>, PipelineError> {
    let (header, records) = read_records(path)?;
    let names = layout.header();
    let required: Vec<&str> = names.iter().map(String::as_str).collect();
    let cols = header.positions(FILE_LABEL, &required)?;

    let n = layout.symbols.len();
    let date_col = cols[0];
    let level_cols = &cols[1..=n];
    let gold_col = cols[n + 1];
    let ratio_cols = &cols[n + 2..];

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let Some(date) = rec.get(date_col).and_then(parse_date) else {
            continue;
        };
        let gold_close = rec
            .get(gold_col)
            .and_then(parse_cell)
            .ok_or_else(|| invalid(path, i + 2, "Gold_Close is missing or not a number"))?;
        let read = |c: &usize| rec.get(*c).and_then(parse_cell);
        rows.push(MergedRow {
            date,
            index_levels: level_cols.iter().map(read).collect(),
            gold_close,
            ratios: ratio_cols.iter().map(read).collect(),
        });
    }
    rows.sort_by_key(|r| r.date);
    rows.dedup_by_key(|r| r.date);
    Ok(rows)
}

fn invalid(path: &Path, row: usize, reason: &str) -> PipelineError {
    PipelineError::InvalidRow {
        path: PathBuf::from(path),
        row,
        reason: reason.to_string(),
    }
}
