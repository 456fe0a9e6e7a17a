//! Per-index metrics file: `Date,ratio,ma_<short>,ma_<long>,z`.

use std::path::Path;

use super::{finish, fmt_cell, write_text, DATE_FORMAT};
use crate::domain::RollingMetricRow;
use crate::error::PipelineError;
use crate::metrics::RollingConfig;

pub fn metrics_header(cfg: &RollingConfig) -> Vec<String> {
    vec![
        "Date".to_string(),
        "ratio".to_string(),
        format!("ma_{}", cfg.short_window),
        format!("ma_{}", cfg.long_window),
        "z".to_string(),
    ]
}

pub fn render_metrics_csv(
    cfg: &RollingConfig,
    rows: &[RollingMetricRow],
    path: &Path,
) -> Result<String, PipelineError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(metrics_header(cfg))
        .map_err(|e| PipelineError::csv(path, e))?;
    for r in rows {
        wtr.write_record([
            r.date.format(DATE_FORMAT).to_string(),
            fmt_cell(r.ratio),
            fmt_cell(r.ma_short),
            fmt_cell(r.ma_long),
            fmt_cell(r.z_score),
        ])
        .map_err(|e| PipelineError::csv(path, e))?;
    }
    finish(wtr, path)
}

pub fn write_metrics_csv(
    path: &Path,
    cfg: &RollingConfig,
    rows: &[RollingMetricRow],
) -> Result<(), PipelineError> {
    let text = render_metrics_csv(cfg, rows, path)?;
    write_text(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn header_names_follow_windows() {
        assert_eq!(
            metrics_header(&RollingConfig::default()),
            vec!["Date", "ratio", "ma_50", "ma_200", "z"]
        );
    }

    #[test]
    fn warmup_cells_are_empty_and_nan_z_is_written() {
        let row = |day: u32, z: Option<f64>| RollingMetricRow {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            ratio: Some(20.0),
            ma_short: None,
            ma_long: None,
            z_mean: None,
            z_std: None,
            z_score: z,
        };
        let text = render_metrics_csv(
            &RollingConfig::default(),
            &[row(5, None), row(8, Some(f64::NAN))],
            Path::new("metrics.csv"),
        )
        .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "2024-01-05,20,,,");
        assert_eq!(lines[2], "2024-01-08,20,,,NaN");
    }
}
