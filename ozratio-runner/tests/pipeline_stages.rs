//! End-to-end runs of the four stages against a scripted provider.
//!
//! No network: the provider serves synthetic bars, pauses are recorded rather
//! than slept, and every run writes into its own temp directory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Weekday};
use ozratio_core::data::{DataError, DataProvider, FetchResult, RecordingPause};
use ozratio_core::domain::DailyBar;
use ozratio_core::PipelineError;
use ozratio_runner::{
    fetch_gold, fetch_indices, merge, metrics, PipelineConfig, RunError, Stage,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Serves fixed bars per symbol; unknown symbols answer with no data.
struct MockProvider {
    bars: HashMap<String, Vec<DailyBar>>,
    calls: RefCell<Vec<String>>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            bars: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn with(mut self, symbol: &str, bars: Vec<DailyBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    fn calls_for(&self, symbol: &str) -> usize {
        self.calls.borrow().iter().filter(|s| *s == symbol).count()
    }
}

impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError> {
        self.calls.borrow_mut().push(symbol.to_string());
        let bars: Vec<DailyBar> = self
            .bars
            .get(symbol)
            .map(|b| {
                b.iter()
                    .filter(|bar| bar.date >= start && bar.date < end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(DataError::EmptyResponse {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
        })
    }
}

/// Weekday bars from `from` until `to` (exclusive), skipping `holidays`.
fn weekday_bars(from: &str, to: &str, base: f64, step: f64, holidays: &[&str]) -> Vec<DailyBar> {
    let holidays: Vec<NaiveDate> = holidays.iter().map(|h| d(h)).collect();
    d(from)
        .iter_days()
        .take_while(|day| *day < d(to))
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|day| !holidays.contains(day))
        .enumerate()
        .map(|(i, date)| {
            let close = base + step * i as f64;
            DailyBar {
                date,
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                adj_close: close,
                volume: 1_000,
            }
        })
        .collect()
}

fn provider() -> MockProvider {
    // Indices trade on Good Friday here while gold does not.
    let index_holidays = ["2024-01-01", "2024-01-15", "2024-02-19"];
    MockProvider::new()
        .with("MGC=F", weekday_bars("2024-01-02", "2024-04-01", 2_050.0, 1.5, &["2024-03-29"]))
        .with("^DJI", weekday_bars("2024-01-01", "2024-04-01", 37_500.0, 20.0, &index_holidays))
        .with("^IXIC", weekday_bars("2024-01-01", "2024-04-01", 14_800.0, 8.0, &index_holidays))
}

fn config(dir: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.start = d("2024-01-01");
    cfg.end = d("2024-04-01");
    cfg.output_dir = dir.to_path_buf();
    cfg.fetch.jitter_secs = 0.0;
    cfg.rolling.short_window = 3;
    cfg.rolling.long_window = 5;
    cfg.rolling.z_lookback = 10;
    cfg.rolling.z_min_samples = 4;
    cfg
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[test]
fn full_pipeline_with_gold_fallback() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let provider = provider();
    let pause = RecordingPause::new();
    let mut rng = StdRng::seed_from_u64(11);

    // Stage 1: GC=F never answers, MGC=F does.
    let gold = fetch_gold(&cfg, &provider, &pause, &mut rng).unwrap();
    assert_eq!(gold.stage, Stage::FetchGold);
    assert_eq!(gold.symbol_used.as_deref(), Some("MGC=F"));
    assert_eq!(provider.calls_for("GC=F"), 4);
    assert_eq!(provider.calls_for("MGC=F"), 1);
    assert_eq!(
        pause.recorded(),
        vec![
            Duration::from_secs(2),
            Duration::from_millis(3200),
            cfg.fetch.retry_policy().backoff(2),
        ]
    );
    let gold_path = dir.path().join("gold_raw_MGCF_2024-01-01_2024-04-01.csv");
    assert_eq!(gold.written, vec![gold_path.clone()]);
    assert_eq!(
        read_lines(&gold_path)[0],
        "Date,Open,High,Low,Close,Adj Close,Volume"
    );

    // Stage 2: one fixed pause between the two index requests.
    let pause = RecordingPause::new();
    let idx = fetch_indices(&cfg, &provider, &pause, &mut rng).unwrap();
    assert_eq!(pause.recorded(), vec![Duration::from_millis(2500)]);
    let index_lines = read_lines(&cfg.index_raw_path());
    assert_eq!(index_lines[0], "Date,^DJI,^IXIC");
    for line in &index_lines[1..] {
        let date = d(&line[..10]);
        assert!(matches!(date.weekday(), Weekday::Mon | Weekday::Fri), "{line}");
    }
    assert!(!index_lines.iter().any(|l| l.starts_with("2024-01-01")));
    assert_eq!(idx.rows, index_lines.len() - 1);

    // Stage 3: Good Friday has no gold. The carry only sees index rows, so
    // the previous index row's gold close (Monday 2024-03-25) fills it.
    let merged = merge(&cfg).unwrap();
    assert_eq!(merged.rows, idx.rows);
    assert_eq!(merged.written.len(), 3);
    let usd_chart = std::fs::read_to_string(dir.path().join("chart_dji_usd_vs_gold.svg")).unwrap();
    assert!(usd_chart.starts_with("<svg") && usd_chart.ends_with("</svg>"));
    assert!(dir.path().join("chart_ixic_usd_vs_gold.svg").is_file());

    let merged_lines = read_lines(&cfg.merged_path());
    assert_eq!(
        merged_lines[0],
        "Date,^DJI,^IXIC,Gold_Close,DJI_per_oz_gold,IXIC_per_oz_gold"
    );
    let good_friday = merged_lines
        .iter()
        .find(|l| l.starts_with("2024-03-29"))
        .expect("Good Friday row kept from the index calendar");
    let gold_bars = weekday_bars("2024-01-02", "2024-04-01", 2_050.0, 1.5, &["2024-03-29"]);
    let monday = gold_bars
        .iter()
        .find(|b| b.date == d("2024-03-25"))
        .unwrap()
        .close;
    let cells: Vec<&str> = good_friday.split(',').collect();
    assert_eq!(cells[3].parse::<f64>().unwrap(), monday);

    // Stage 4
    let m = metrics(&cfg).unwrap();
    assert_eq!(m.stage, Stage::Metrics);
    for name in [
        "metrics_dji.csv",
        "metrics_ixic.csv",
        "metrics_dji.svg",
        "metrics_ixic.svg",
        "metrics_dashboard.svg",
    ] {
        assert!(dir.path().join(name).is_file(), "missing {name}");
    }
    let metric_lines = read_lines(&dir.path().join("metrics_dji.csv"));
    assert_eq!(metric_lines[0], "Date,ratio,ma_3,ma_5,z");
    assert_eq!(metric_lines.len(), merged_lines.len());
    // MA3 is empty for the first two rows only.
    assert!(metric_lines[1].contains(",,"));
    let fourth: Vec<&str> = metric_lines[4].split(',').collect();
    assert!(!fourth[2].is_empty());
    let dashboard = std::fs::read_to_string(dir.path().join("metrics_dashboard.svg")).unwrap();
    assert!(dashboard.contains("Dow/Gold"));
    assert!(dashboard.contains("Nasdaq/Gold"));
}

#[test]
fn all_gold_symbols_failing_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let provider = MockProvider::new();
    let pause = RecordingPause::new();
    let mut rng = StdRng::seed_from_u64(1);

    match fetch_gold(&cfg, &provider, &pause, &mut rng).unwrap_err() {
        RunError::Pipeline(PipelineError::DataUnavailable { symbols, attempts, .. }) => {
            assert_eq!(symbols, vec!["GC=F", "MGC=F"]);
            assert_eq!(attempts, 8);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn leading_gold_gap_aborts_merge() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    // Gold starts after the first index row.
    let provider = provider()
        .with("GC=F", weekday_bars("2024-01-09", "2024-04-01", 2_050.0, 1.0, &[]));
    let pause = RecordingPause::new();
    let mut rng = StdRng::seed_from_u64(2);

    fetch_gold(&cfg, &provider, &pause, &mut rng).unwrap();
    fetch_indices(&cfg, &provider, &pause, &mut rng).unwrap();

    match merge(&cfg).unwrap_err() {
        RunError::Pipeline(PipelineError::UnresolvableGap { column, missing_rows }) => {
            assert_eq!(column, "Gold_Close");
            // Fri 5th and Mon 8th precede the first gold bar.
            assert_eq!(missing_rows, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!cfg.merged_path().exists());
    assert!(!dir.path().join("chart_dji_usd_vs_gold.svg").exists());
}

#[test]
fn merge_without_gold_file_reports_candidates() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let pause = RecordingPause::new();
    let mut rng = StdRng::seed_from_u64(3);
    fetch_indices(&cfg, &provider(), &pause, &mut rng).unwrap();

    match merge(&cfg).unwrap_err() {
        RunError::Pipeline(PipelineError::InputNotFound { tried }) => {
            assert_eq!(tried, cfg.gold_csv_candidates());
            assert_eq!(tried.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn explicit_gold_csv_is_used() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path());
    let pause = RecordingPause::new();
    let mut rng = StdRng::seed_from_u64(4);
    fetch_indices(&cfg, &provider(), &pause, &mut rng).unwrap();

    let gold_path = dir.path().join("my_gold.csv");
    let mut text = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n,GC=F,GC=F,GC=F,GC=F,GC=F,GC=F\n");
    text.push_str("2024-01-05,1,1,1,2000,2000,1\n");
    std::fs::write(&gold_path, text).unwrap();
    cfg.gold.csv = Some(gold_path);

    let report = merge(&cfg).unwrap();
    assert!(report.rows > 0);
    let lines = read_lines(&cfg.merged_path());
    // A single gold observation carries through every row.
    assert!(lines[1..].iter().all(|l| l.split(',').nth(3) == Some("2000")));
}

#[test]
fn index_file_missing_a_column_is_schema_violation() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    std::fs::write(cfg.index_raw_path(), "Date,^DJI\n2024-01-05,37500\n").unwrap();

    match merge(&cfg).unwrap_err() {
        RunError::Pipeline(PipelineError::SchemaViolation { file, missing, present }) => {
            assert_eq!(file, "Index CSV");
            assert_eq!(missing, vec!["^IXIC"]);
            assert_eq!(present, vec!["Date", "^DJI"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn metrics_without_merged_file_fails() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    assert!(matches!(
        metrics(&cfg),
        Err(RunError::Pipeline(PipelineError::Csv { .. }))
    ));
}
