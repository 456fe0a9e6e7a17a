//! Index raw file: `Date,<symbol_1>,<symbol_2>,...`.

use std::path::Path;

use super::{finish, fmt_cell, parse_cell, parse_date, read_records, write_text, DATE_FORMAT};
use crate::domain::{IndexColumn, IndexTable, Series, TimePoint};
use crate::error::PipelineError;

const FILE_LABEL: &str = "Index CSV";

pub fn render_index_csv(table: &IndexTable, path: &Path) -> Result<String, PipelineError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["Date".to_string()];
    header.extend(table.columns.iter().map(|c| c.symbol.clone()));
    wtr.write_record(&header)
        .map_err(|e| PipelineError::csv(path, e))?;

    for (i, date) in table.dates.iter().enumerate() {
        let mut row = vec![date.format(DATE_FORMAT).to_string()];
        row.extend(table.columns.iter().map(|c| fmt_cell(c.values[i])));
        wtr.write_record(&row)
            .map_err(|e| PipelineError::csv(path, e))?;
    }
    finish(wtr, path)
}

pub fn write_index_csv(path: &Path, table: &IndexTable) -> Result<(), PipelineError> {
    let text = render_index_csv(table, path)?;
    write_text(path, &text)
}

/// Load the named symbol columns of an index file.
///
/// The result keeps the order of `symbols`, sorted by date with the first row
/// kept on a repeated date. Rows with an unparseable date are dropped.
pub fn load_index_csv(path: &Path, symbols: &[&str]) -> Result<IndexTable, PipelineError> {
    let (header, records) = read_records(path)?;
    let mut required = vec!["Date"];
    required.extend_from_slice(symbols);
    let cols = header.positions(FILE_LABEL, &required)?;

    // Route through Series so sorting and de-duplication match the other loaders.
    let per_symbol: Vec<Series> = cols[1..]
        .iter()
        .zip(symbols)
        .map(|(&col, sym)| {
            let points = records
                .iter()
                .filter_map(|rec| {
                    let date = rec.get(cols[0]).and_then(parse_date)?;
                    let value = rec.get(col).and_then(parse_cell);
                    Some(TimePoint { date, value })
                })
                .collect();
            Series::from_unsorted_dedup(*sym, points)
        })
        .collect();

    let dates = match per_symbol.first() {
        Some(s) => s.dates(),
        None => {
            let points = records
                .iter()
                .filter_map(|rec| rec.get(cols[0]).and_then(parse_date))
                .map(TimePoint::missing)
                .collect();
            Series::from_unsorted_dedup("Date", points).dates()
        }
    };
    let columns = per_symbol
        .into_iter()
        .map(|s| IndexColumn {
            symbol: s.name().to_string(),
            values: s.values(),
        })
        .collect();
    Ok(IndexTable { dates, columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table() -> IndexTable {
        IndexTable {
            dates: vec![d("2024-01-05"), d("2024-01-08")],
            columns: vec![
                IndexColumn {
                    symbol: "^DJI".into(),
                    values: vec![Some(37_466.11), Some(37_683.01)],
                },
                IndexColumn {
                    symbol: "^IXIC".into(),
                    values: vec![None, Some(14_843.77)],
                },
            ],
        }
    }

    #[test]
    fn render_layout() {
        let text = render_index_csv(&table(), Path::new("idx.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Date,^DJI,^IXIC");
        assert_eq!(lines[1], "2024-01-05,37466.11,");
        assert_eq!(lines[2], "2024-01-08,37683.01,14843.77");
    }

    #[test]
    fn write_then_load_selected_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("idx.csv");
        write_index_csv(&path, &table()).unwrap();

        let loaded = load_index_csv(&path, &["^IXIC", "^DJI"]).unwrap();
        assert_eq!(loaded.dates, vec![d("2024-01-05"), d("2024-01-08")]);
        assert_eq!(loaded.symbols(), vec!["^IXIC", "^DJI"]);
        assert_eq!(loaded.columns[0].values, vec![None, Some(14_843.77)]);
    }

    #[test]
    fn load_sorts_and_drops_bad_dates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.csv");
        std::fs::write(
            &path,
            "Date,^DJI,^IXIC\n2024-01-08,2,x\nnot-a-date,9,9\n2024-01-05,1,3\n",
        )
        .unwrap();
        let loaded = load_index_csv(&path, &["^DJI", "^IXIC"]).unwrap();
        assert_eq!(loaded.dates, vec![d("2024-01-05"), d("2024-01-08")]);
        assert_eq!(loaded.columns[0].values, vec![Some(1.0), Some(2.0)]);
        assert_eq!(loaded.columns[1].values, vec![Some(3.0), None]);
    }

    #[test]
    fn missing_symbol_column_is_schema_violation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.csv");
        std::fs::write(&path, "Date,^DJI\n2024-01-05,1\n").unwrap();
        let err = load_index_csv(&path, &["^DJI", "^IXIC"]).unwrap_err();
        assert!(err.to_string().contains("Index CSV missing columns"));
    }
}
