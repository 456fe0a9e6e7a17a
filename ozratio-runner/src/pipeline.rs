//! The four pipeline stages.
//!
//! Each stage is a separate invocation: it reads the files earlier stages left
//! in the output directory, never modifies them, and writes its own. A stage
//! renders all of its outputs before writing any, so a failing stage leaves
//! nothing behind.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use ozratio_core::chart::{self, Axis};
use ozratio_core::data::{
    fetch_series, fetch_with_fallback, filter_mon_fri, merge_index_gold, union_align,
    DataProvider, FetchContext, Pause,
};
use ozratio_core::domain::{close_series, level_series, ratio_series};
use ozratio_core::io::{self, GOLD_CLOSE};
use ozratio_core::metrics::{compute_rolling_metrics, ratio_column};
use ozratio_core::PipelineError;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, PipelineConfig};

/// Errors from a pipeline stage.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    FetchGold,
    FetchIndices,
    Merge,
    Metrics,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::FetchGold => "fetch-gold",
            Stage::FetchIndices => "fetch-indices",
            Stage::Merge => "merge",
            Stage::Metrics => "metrics",
        })
    }
}

/// What a stage did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
    /// Rows in the main output file.
    pub rows: usize,
    /// Gold symbol actually used (fetch-gold only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_used: Option<String>,
    /// First and last date of the main output file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl StageReport {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            written: Vec::new(),
            rows: 0,
            symbol_used: None,
            date_range: None,
        }
    }
}

fn date_range(dates: &[NaiveDate]) -> Option<(NaiveDate, NaiveDate)> {
    Some((*dates.first()?, *dates.last()?))
}

/// Rendered outputs waiting to be written.
#[derive(Default)]
struct Outputs(Vec<(PathBuf, String)>);

impl Outputs {
    fn add(&mut self, path: PathBuf, text: String) {
        self.0.push((path, text));
    }

    fn write_all(self, report: &mut StageReport) -> Result<(), PipelineError> {
        for (path, text) in self.0 {
            io::write_text(&path, &text)?;
            info!(stage = %report.stage, path = %path.display(), "wrote");
            report.written.push(path);
        }
        Ok(())
    }
}

/// Fetch the gold series, trying each configured symbol in order, and write
/// the commodity raw file named after the symbol that answered.
pub fn fetch_gold<R: Rng>(
    cfg: &PipelineConfig,
    provider: &dyn DataProvider,
    pause: &dyn Pause,
    rng: &mut R,
) -> Result<StageReport, RunError> {
    cfg.validate()?;
    let policy = cfg.fetch.retry_policy();
    let mut ctx = FetchContext {
        provider,
        policy: &policy,
        pause,
        rng,
    };

    let (used, bars) = fetch_with_fallback(&mut ctx, &cfg.gold.symbols, cfg.start, cfg.end)?;
    info!("gold source used: {used}");

    let path = cfg.gold_raw_path(&used);
    let mut out = Outputs::default();
    out.add(path.clone(), io::render_commodity_csv(&bars, &path)?);

    let mut report = StageReport::new(Stage::FetchGold);
    report.rows = bars.len();
    report.symbol_used = Some(used);
    report.date_range = date_range(&bars.iter().map(|b| b.date).collect::<Vec<_>>());
    out.write_all(&mut report)?;
    Ok(report)
}

/// Fetch every configured index, keep Monday/Friday closes, and write them
/// side by side in the index raw file.
pub fn fetch_indices<R: Rng>(
    cfg: &PipelineConfig,
    provider: &dyn DataProvider,
    pause: &dyn Pause,
    rng: &mut R,
) -> Result<StageReport, RunError> {
    cfg.validate()?;
    let policy = cfg.fetch.retry_policy();
    let mut ctx = FetchContext {
        provider,
        policy: &policy,
        pause,
        rng,
    };

    let mut closes = Vec::with_capacity(cfg.indices.len());
    for (i, idx) in cfg.indices.iter().enumerate() {
        if i > 0 {
            pause.pause(cfg.fetch.pause_between());
        }
        let bars = fetch_series(&mut ctx, &idx.symbol, cfg.start, cfg.end)?;
        let filtered = filter_mon_fri(&close_series(idx.symbol.as_str(), &bars));
        info!(symbol = %idx.symbol, fetched = bars.len(), kept = filtered.len(), "filtered to Mon/Fri");
        closes.push(filtered);
    }

    let table = union_align(&closes);
    let path = cfg.index_raw_path();
    let mut out = Outputs::default();
    out.add(path.clone(), io::render_index_csv(&table, &path)?);

    let mut report = StageReport::new(Stage::FetchIndices);
    report.rows = table.len();
    report.date_range = date_range(&table.dates);
    out.write_all(&mut report)?;
    Ok(report)
}

/// Join gold onto the index dates, derive the ratios, and write the merged
/// file plus one USD-vs-gold chart per index.
pub fn merge(cfg: &PipelineConfig) -> Result<StageReport, RunError> {
    cfg.validate()?;
    let index_path = cfg.index_raw_path();
    let table = io::load_index_csv(&index_path, &cfg.index_symbols())?;

    let candidates = cfg.gold_csv_candidates();
    let gold_path = candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| PipelineError::InputNotFound {
            tried: candidates.clone(),
        })?;
    info!(index = %index_path.display(), gold = %gold_path.display(), "merging");
    let gold = io::load_commodity_close(&gold_path, GOLD_CLOSE)?;

    let rows = merge_index_gold(&table, &gold)?;

    let layout = cfg.merged_layout();
    let merged_path = cfg.merged_path();
    let mut out = Outputs::default();
    out.add(
        merged_path.clone(),
        io::render_merged_csv(&layout, &rows, &merged_path)?,
    );
    for (i, idx) in cfg.indices.iter().enumerate() {
        let level = level_series(idx.symbol.as_str(), &rows, i);
        let ratio = ratio_series(ratio_column(&idx.label), &rows, i);
        let figure = chart::usd_vs_gold_chart(&idx.name, &level, &ratio);
        out.add(cfg.usd_vs_gold_chart_path(idx), figure.render());
    }

    let mut report = StageReport::new(Stage::Merge);
    report.rows = rows.len();
    report.date_range = date_range(&rows.iter().map(|r| r.date).collect::<Vec<_>>());
    out.write_all(&mut report)?;
    Ok(report)
}

/// Rolling statistics per ratio column: one metrics file and one chart per
/// index, plus the stacked dashboard.
pub fn metrics(cfg: &PipelineConfig) -> Result<StageReport, RunError> {
    cfg.validate()?;
    let merged_path = cfg.merged_path();
    let rows = io::load_merged_csv(&merged_path, &cfg.merged_layout())?;
    info!(path = %merged_path.display(), rows = rows.len(), "computing rolling metrics");

    let mut out = Outputs::default();
    let mut panels = Vec::with_capacity(cfg.indices.len());
    for (i, idx) in cfg.indices.iter().enumerate() {
        let ratio = ratio_series(ratio_column(&idx.label), &rows, i);
        let level = level_series(idx.symbol.as_str(), &rows, i);
        let m = compute_rolling_metrics(&ratio, &cfg.rolling);

        let csv_path = cfg.metrics_csv_path(idx);
        out.add(
            csv_path.clone(),
            io::render_metrics_csv(&cfg.rolling, &m, &csv_path)?,
        );
        out.add(
            cfg.metrics_chart_path(idx),
            chart::metrics_chart(&idx.name, &level, &m, &cfg.rolling).render(),
        );
        panels.push(chart::metrics_panel(
            format!("{}/Gold", idx.short_name),
            &m,
            &cfg.rolling,
            Axis::Left,
        ));
    }
    out.add(cfg.dashboard_path(), chart::dashboard(panels).render());

    let mut report = StageReport::new(Stage::Metrics);
    report.rows = rows.len();
    report.date_range = date_range(&rows.iter().map(|r| r.date).collect::<Vec<_>>());
    out.write_all(&mut report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::FetchIndices.to_string(), "fetch-indices");
        assert_eq!(Stage::Metrics.to_string(), "metrics");
    }

    #[test]
    fn report_date_range() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(date_range(&[d(5), d(8), d(12)]), Some((d(5), d(12))));
        assert_eq!(date_range(&[]), None);
    }

    #[test]
    fn invalid_config_fails_before_any_io() {
        let mut cfg = PipelineConfig::default();
        cfg.output_dir = PathBuf::from("/nonexistent/never-created");
        cfg.rolling.short_window = 0;
        assert!(matches!(merge(&cfg), Err(RunError::Config(_))));
        assert!(matches!(metrics(&cfg), Err(RunError::Config(_))));
    }
}
