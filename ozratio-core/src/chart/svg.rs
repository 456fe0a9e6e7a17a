//! Minimal SVG line-chart renderer with dual y-axes and shaded bands.
//!
//! The x axis is calendar time shared by every panel of a chart. Each panel
//! scales its left and right axes independently. Missing and non-finite points
//! break a line into separate runs instead of being drawn.

use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::error::PipelineError;

const WIDTH: f64 = 960.0;
const PANEL_HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 76.0;
const MARGIN_RIGHT: f64 = 76.0;
const MARGIN_TOP: f64 = 36.0;
const MARGIN_BOTTOM: f64 = 40.0;
const Y_TICKS: usize = 5;
const MAX_DATE_LABELS: usize = 12;
const GRID_COLOR: &str = "#dddddd";
const AXIS_COLOR: &str = "#333333";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Left,
    Right,
}

/// One line on a panel.
#[derive(Debug, Clone)]
pub struct LineSeries {
    pub label: String,
    pub color: &'static str,
    pub axis: Axis,
    pub dashed: bool,
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl LineSeries {
    pub fn new(
        label: impl Into<String>,
        color: &'static str,
        axis: Axis,
        points: Vec<(NaiveDate, Option<f64>)>,
    ) -> Self {
        Self {
            label: label.into(),
            color,
            axis,
            dashed: false,
            points,
        }
    }

    pub fn dashed(mut self) -> Self {
        self.dashed = true;
        self
    }
}

/// Shaded region between a lower and upper bound.
#[derive(Debug, Clone)]
pub struct Band {
    pub label: Option<String>,
    pub color: &'static str,
    pub opacity: f64,
    pub axis: Axis,
    pub points: Vec<(NaiveDate, Option<(f64, f64)>)>,
}

/// One stacked plot area.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    pub title: String,
    pub left_label: String,
    pub right_label: Option<String>,
    pub lines: Vec<LineSeries>,
    pub bands: Vec<Band>,
}

impl Panel {
    pub fn new(title: impl Into<String>, left_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            left_label: left_label.into(),
            ..Self::default()
        }
    }

    pub fn right_label(mut self, label: impl Into<String>) -> Self {
        self.right_label = Some(label.into());
        self
    }

    pub fn line(mut self, line: LineSeries) -> Self {
        self.lines.push(line);
        self
    }

    pub fn band(mut self, band: Band) -> Self {
        self.bands.push(band);
        self
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.lines
            .iter()
            .flat_map(|l| l.points.iter().map(|(d, _)| *d))
            .chain(self.bands.iter().flat_map(|b| b.points.iter().map(|(d, _)| *d)))
    }

    /// Finite value range drawn against `axis`, bands included.
    fn extent(&self, axis: Axis) -> Option<(f64, f64)> {
        let line_values = self
            .lines
            .iter()
            .filter(|l| l.axis == axis)
            .flat_map(|l| l.points.iter().filter_map(|(_, v)| *v));
        let band_values = self
            .bands
            .iter()
            .filter(|b| b.axis == axis)
            .flat_map(|b| b.points.iter().filter_map(|(_, v)| *v))
            .flat_map(|(lo, hi)| [lo, hi]);
        let (min, max) = line_values
            .chain(band_values)
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        if min == max {
            let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.1 };
            return Some((min - pad, max + pad));
        }
        let pad = (max - min) * 0.05;
        Some((min - pad, max + pad))
    }
}

/// A figure of one or more panels sharing the time axis.
#[derive(Debug, Clone, Default)]
pub struct Chart {
    pub panels: Vec<Panel>,
}

impl Chart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn height(&self) -> f64 {
        PANEL_HEIGHT * self.panels.len().max(1) as f64
    }

    pub fn render(&self) -> String {
        let height = self.height();
        let mut svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:11px;fill:#444}}</style><rect width="100%" height="100%" fill="#ffffff"/>"##,
            w = WIDTH,
            h = height
        );

        let time = TimeScale::from_dates(self.panels.iter().flat_map(|p| p.dates()));
        for (i, panel) in self.panels.iter().enumerate() {
            let frame = Frame {
                left: MARGIN_LEFT,
                right: WIDTH - MARGIN_RIGHT,
                top: i as f64 * PANEL_HEIGHT + MARGIN_TOP,
                bottom: (i + 1) as f64 * PANEL_HEIGHT - MARGIN_BOTTOM,
            };
            render_panel(&mut svg, panel, &frame, time.as_ref());
        }

        svg.push_str("</svg>");
        svg
    }

    /// Render and write to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        crate::io::write_text(path, &self.render())
    }
}

struct Frame {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Frame {
    fn y(&self, value: f64, (min, max): (f64, f64)) -> f64 {
        let norm = (value - min) / (max - min);
        self.bottom - norm * (self.bottom - self.top)
    }
}

struct TimeScale {
    first: NaiveDate,
    last: NaiveDate,
}

impl TimeScale {
    fn from_dates(dates: impl Iterator<Item = NaiveDate>) -> Option<Self> {
        let (first, last) = dates.fold(None, |acc: Option<(NaiveDate, NaiveDate)>, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })?;
        Some(Self { first, last })
    }

    fn x(&self, date: NaiveDate, frame: &Frame) -> f64 {
        let span = (self.last - self.first).num_days();
        if span == 0 {
            return (frame.left + frame.right) / 2.0;
        }
        let offset = (date - self.first).num_days() as f64 / span as f64;
        frame.left + offset * (frame.right - frame.left)
    }

    /// First day of each month in range, thinned to at most `MAX_DATE_LABELS`.
    fn month_ticks(&self) -> Vec<NaiveDate> {
        let mut months = Vec::new();
        let mut cursor = NaiveDate::from_ymd_opt(self.first.year(), self.first.month(), 1);
        while let Some(m) = cursor {
            if m > self.last {
                break;
            }
            if m >= self.first {
                months.push(m);
            }
            cursor = m.checked_add_months(chrono::Months::new(1));
        }
        let step = months.len().div_ceil(MAX_DATE_LABELS).max(1);
        months.into_iter().step_by(step).collect()
    }
}

fn render_panel(svg: &mut String, panel: &Panel, frame: &Frame, time: Option<&TimeScale>) {
    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" font-size="14" font-weight="bold">{title}</text>"#,
        x = (frame.left + frame.right) / 2.0,
        y = frame.top - 12.0,
        title = escape(&panel.title)
    ));

    let Some(time) = time else {
        push_no_data(svg, frame);
        return;
    };
    let left = panel.extent(Axis::Left);
    let right = panel.extent(Axis::Right);
    if left.is_none() && right.is_none() {
        push_no_data(svg, frame);
        return;
    }

    if let Some(ext) = left {
        push_y_axis(svg, frame, ext, Axis::Left, &panel.left_label);
    }
    if let (Some(ext), Some(label)) = (right, panel.right_label.as_deref()) {
        push_y_axis(svg, frame, ext, Axis::Right, label);
    }
    push_time_axis(svg, frame, time);

    for band in &panel.bands {
        let Some(ext) = extent_for(band.axis, left, right) else {
            continue;
        };
        for run in runs(&band.points, |v| v.filter(|(lo, hi)| lo.is_finite() && hi.is_finite())) {
            let upper = run.iter().map(|(d, (_, hi))| (time.x(*d, frame), frame.y(*hi, ext)));
            let lower = run
                .iter()
                .rev()
                .map(|(d, (lo, _))| (time.x(*d, frame), frame.y(*lo, ext)));
            svg.push_str(&format!(
                r#"<polygon fill="{color}" fill-opacity="{op}" stroke="none" points="{pts}" />"#,
                color = band.color,
                op = band.opacity,
                pts = coords(upper.chain(lower))
            ));
        }
    }

    for line in &panel.lines {
        let Some(ext) = extent_for(line.axis, left, right) else {
            continue;
        };
        let dash = if line.dashed { "6 4" } else { "0" };
        for run in runs(&line.points, |v| v.filter(|x| x.is_finite())) {
            let pts: Vec<(f64, f64)> = run
                .iter()
                .map(|(d, v)| (time.x(*d, frame), frame.y(*v, ext)))
                .collect();
            if let [(x, y)] = pts.as_slice() {
                svg.push_str(&format!(
                    r#"<circle cx="{x:.2}" cy="{y:.2}" r="1.5" fill="{color}" />"#,
                    color = line.color
                ));
            } else {
                svg.push_str(&format!(
                    r#"<polyline fill="none" stroke="{color}" stroke-width="1.5" stroke-dasharray="{dash}" points="{pts}" />"#,
                    color = line.color,
                    pts = coords(pts.into_iter())
                ));
            }
        }
    }

    push_legend(svg, frame, panel);
}

fn extent_for(
    axis: Axis,
    left: Option<(f64, f64)>,
    right: Option<(f64, f64)>,
) -> Option<(f64, f64)> {
    match axis {
        Axis::Left => left,
        Axis::Right => right,
    }
}

/// Split points into maximal runs where `keep` yields a value.
fn runs<T: Copy, U>(
    points: &[(NaiveDate, Option<T>)],
    keep: impl Fn(Option<T>) -> Option<U>,
) -> Vec<Vec<(NaiveDate, U)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (d, v) in points {
        match keep(*v) {
            Some(u) => current.push((*d, u)),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn coords(points: impl Iterator<Item = (f64, f64)>) -> String {
    points
        .map(|(x, y)| format!("{x:.2},{y:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_no_data(svg: &mut String, frame: &Frame) {
    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">no data</text>"#,
        x = (frame.left + frame.right) / 2.0,
        y = (frame.top + frame.bottom) / 2.0
    ));
}

fn push_y_axis(svg: &mut String, frame: &Frame, ext: (f64, f64), axis: Axis, label: &str) {
    let (x, anchor, label_x) = match axis {
        Axis::Left => (frame.left, "end", frame.left - 58.0),
        Axis::Right => (frame.right, "start", frame.right + 58.0),
    };
    let tick_dx = if axis == Axis::Left { -6.0 } else { 6.0 };

    svg.push_str(&format!(
        r#"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="{AXIS_COLOR}" stroke-width="1" />"#,
        y1 = frame.top,
        y2 = frame.bottom
    ));
    for i in 0..Y_TICKS {
        let value = ext.0 + (ext.1 - ext.0) * i as f64 / (Y_TICKS - 1) as f64;
        let y = frame.y(value, ext);
        if axis == Axis::Left {
            svg.push_str(&format!(
                r#"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{GRID_COLOR}" stroke-width="0.5" />"#,
                x1 = frame.left,
                x2 = frame.right
            ));
        }
        svg.push_str(&format!(
            r#"<text x="{tx:.2}" y="{ty:.2}" text-anchor="{anchor}">{label}</text>"#,
            tx = x + tick_dx,
            ty = y + 4.0,
            label = format_tick(value, ext.1 - ext.0)
        ));
    }
    let cy = (frame.top + frame.bottom) / 2.0;
    svg.push_str(&format!(
        r#"<text x="{label_x:.2}" y="{cy:.2}" text-anchor="middle" transform="rotate(-90 {label_x:.2} {cy:.2})">{label}</text>"#,
        label = escape(label)
    ));
}

fn push_time_axis(svg: &mut String, frame: &Frame, time: &TimeScale) {
    svg.push_str(&format!(
        r#"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{AXIS_COLOR}" stroke-width="1" />"#,
        x1 = frame.left,
        x2 = frame.right,
        y = frame.bottom
    ));
    for tick in time.month_ticks() {
        let x = time.x(tick, frame);
        svg.push_str(&format!(
            r#"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="{GRID_COLOR}" stroke-width="0.5" />"#,
            y1 = frame.top,
            y2 = frame.bottom
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
            y = frame.bottom + 16.0,
            label = tick.format("%Y-%m")
        ));
    }
}

fn push_legend(svg: &mut String, frame: &Frame, panel: &Panel) {
    let mut y = frame.top + 16.0;
    let x = frame.left + 10.0;
    let band_entries = panel
        .bands
        .iter()
        .filter_map(|b| b.label.as_ref().map(|l| (l, b.color)));
    for (label, color) in band_entries {
        svg.push_str(&format!(
            r#"<rect x="{x:.2}" y="{ry:.2}" width="20" height="8" fill="{color}" fill-opacity="0.3" />"#,
            ry = y - 8.0
        ));
        push_legend_label(svg, x, y, label);
        y += 16.0;
    }
    for line in &panel.lines {
        svg.push_str(&format!(
            r#"<line x1="{x:.2}" y1="{ly:.2}" x2="{x2:.2}" y2="{ly:.2}" stroke="{color}" stroke-width="2" stroke-dasharray="{dash}" />"#,
            ly = y - 4.0,
            x2 = x + 20.0,
            color = line.color,
            dash = if line.dashed { "6 4" } else { "0" }
        ));
        push_legend_label(svg, x, y, &line.label);
        y += 16.0;
    }
}

fn push_legend_label(svg: &mut String, x: f64, y: f64, label: &str) {
    svg.push_str(&format!(
        r#"<text x="{tx:.2}" y="{y:.2}" text-anchor="start">{label}</text>"#,
        tx = x + 26.0,
        label = escape(label)
    ));
}

/// Tick text with precision matched to the axis span.
fn format_tick(value: f64, span: f64) -> String {
    if span >= 100.0 {
        format!("{value:.0}")
    } else if span >= 1.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.4}")
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
