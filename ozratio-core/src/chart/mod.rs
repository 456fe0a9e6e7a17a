//! Static chart rendering (SVG).

pub mod figures;
pub mod svg;

pub use figures::{dashboard, metrics_chart, metrics_panel, usd_vs_gold_chart};
pub use svg::{Axis, Band, Chart, LineSeries, Panel};
