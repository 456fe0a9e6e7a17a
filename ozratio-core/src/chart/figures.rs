//! The figures the pipeline draws.

use super::svg::{Axis, Band, Chart, LineSeries, Panel};
use crate::domain::{RollingMetricRow, Series};
use crate::metrics::RollingConfig;

const GOLD: &str = "#c9a227";
const RATIO: &str = "#1f77b4";
const MA_SHORT: &str = "#ff7f0e";
const MA_LONG: &str = "#2ca02c";
const ENVELOPE: &str = "#7f7f7f";

fn line_points(series: &Series) -> Vec<(chrono::NaiveDate, Option<f64>)> {
    series.points().iter().map(|p| (p.date, p.value)).collect()
}

/// Index level in USD (left) against the same index priced in gold (right).
pub fn usd_vs_gold_chart(name: &str, level: &Series, ratio: &Series) -> Chart {
    let usd = format!("{name} (USD)");
    let oz = format!("{name} (oz of gold)");
    Chart::new().panel(
        Panel::new(format!("{name}: USD (left) vs Per-Ounce-of-Gold (right)"), usd.clone())
            .right_label(oz.clone())
            .line(LineSeries::new(usd, GOLD, Axis::Left, line_points(level)))
            .line(LineSeries::new(oz, RATIO, Axis::Right, line_points(ratio))),
    )
}

/// Ratio, both moving averages, and the ±1σ/±2σ envelope of the z window.
///
/// The envelope is only drawn where the z-score statistics are defined.
pub fn metrics_panel(
    title: impl Into<String>,
    rows: &[RollingMetricRow],
    cfg: &RollingConfig,
    axis: Axis,
) -> Panel {
    let series = |f: fn(&RollingMetricRow) -> Option<f64>| {
        rows.iter().map(|r| (r.date, f(r))).collect::<Vec<_>>()
    };
    let band = |k: f64, opacity: f64, label: &str| Band {
        label: Some(label.to_string()),
        color: ENVELOPE,
        opacity,
        axis,
        points: rows.iter().map(|r| (r.date, r.envelope(k))).collect(),
    };

    Panel::new(title, "oz of gold")
        .band(band(2.0, 0.08, "±2σ"))
        .band(band(1.0, 0.16, "±1σ"))
        .line(LineSeries::new("ratio", RATIO, axis, series(|r| r.ratio)))
        .line(LineSeries::new(
            format!("MA{}", cfg.short_window),
            MA_SHORT,
            axis,
            series(|r| r.ma_short),
        ))
        .line(LineSeries::new(
            format!("MA{}", cfg.long_window),
            MA_LONG,
            axis,
            series(|r| r.ma_long),
        ))
}

/// Per-index figure: USD level on the left, ratio statistics on the right.
pub fn metrics_chart(
    name: &str,
    level: &Series,
    rows: &[RollingMetricRow],
    cfg: &RollingConfig,
) -> Chart {
    let usd = format!("{name} (USD)");
    let panel = metrics_panel(format!("{name}/Gold with rolling statistics"), rows, cfg, Axis::Right);
    let panel = Panel {
        left_label: usd.clone(),
        right_label: Some(format!("{name} (oz of gold)")),
        ..panel
    }
    .line(LineSeries::new(usd, GOLD, Axis::Left, line_points(level)).dashed());
    Chart::new().panel(panel)
}

/// One metrics panel per index, stacked.
pub fn dashboard(panels: Vec<Panel>) -> Chart {
    panels.into_iter().fold(Chart::new(), Chart::panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimePoint;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn rows() -> Vec<RollingMetricRow> {
        (1..=4)
            .map(|day| RollingMetricRow {
                date: d(day),
                ratio: Some(20.0 + day as f64),
                ma_short: (day >= 2).then_some(21.0),
                ma_long: (day >= 3).then_some(21.5),
                z_mean: (day >= 3).then_some(22.0),
                z_std: (day >= 3).then_some(1.0),
                z_score: (day >= 3).then_some(0.5),
            })
            .collect()
    }

    #[test]
    fn usd_vs_gold_titles() {
        let level = Series::new("^DJI", vec![TimePoint::new(d(5), 37_000.0)]).unwrap();
        let ratio = Series::new("DJI_per_oz_gold", vec![TimePoint::new(d(5), 18.0)]).unwrap();
        let svg = usd_vs_gold_chart("DJIA", &level, &ratio).render();
        assert!(svg.contains("DJIA: USD (left) vs Per-Ounce-of-Gold (right)"));
        assert!(svg.contains("DJIA (oz of gold)"));
    }

    #[test]
    fn metrics_panel_lines_and_bands() {
        let panel = metrics_panel("Dow/Gold", &rows(), &RollingConfig::default(), Axis::Left);
        let labels: Vec<&str> = panel.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["ratio", "MA50", "MA200"]);
        assert_eq!(panel.bands.len(), 2);
        assert_eq!(panel.bands[1].points[0].1, None);
        assert_eq!(panel.bands[1].points[3].1, Some((21.0, 23.0)));
    }

    #[test]
    fn dashboard_stacks_panels() {
        let cfg = RollingConfig::default();
        let chart = dashboard(vec![
            metrics_panel("Dow/Gold", &rows(), &cfg, Axis::Left),
            metrics_panel("Nasdaq/Gold", &rows(), &cfg, Axis::Left),
        ]);
        assert_eq!(chart.panels.len(), 2);
        let svg = chart.render();
        assert!(svg.contains("Dow/Gold"));
        assert!(svg.contains("Nasdaq/Gold"));
    }

    #[test]
    fn metrics_chart_puts_level_on_the_left() {
        let level = Series::new(
            "^IXIC",
            (1..=4).map(|day| TimePoint::new(d(day), 15_000.0)).collect(),
        )
        .unwrap();
        let chart = metrics_chart("NASDAQ", &level, &rows(), &RollingConfig::default());
        let panel = &chart.panels[0];
        assert_eq!(panel.left_label, "NASDAQ (USD)");
        assert_eq!(panel.lines.last().map(|l| l.axis), Some(Axis::Left));
        assert!(panel.lines[..3].iter().all(|l| l.axis == Axis::Right));
    }
}
