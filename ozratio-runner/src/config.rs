//! Pipeline configuration (TOML).
//!
//! Every section is optional: anything left out falls back to the defaults,
//! which reproduce the reference run (2024-01-01 to 2025-10-20, `GC=F` with
//! `MGC=F` fallback, `^DJI` and `^IXIC`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use ozratio_core::data::RetryPolicy;
use ozratio_core::io::MergedLayout;
use ozratio_core::metrics::RollingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for all pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// First day requested (inclusive).
    pub start: NaiveDate,
    /// Day after the last day requested (exclusive).
    pub end: NaiveDate,
    /// Directory every stage reads from and writes to.
    pub output_dir: PathBuf,
    pub gold: GoldConfig,
    pub indices: Vec<IndexSpec>,
    pub files: FileNames,
    pub fetch: FetchConfig,
    pub rolling: RollingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldConfig {
    /// Symbols tried in order; the first that yields data is used.
    pub symbols: Vec<String>,
    /// Explicit commodity file for the merge stage. When unset, the merge
    /// stage looks for the templated file of each symbol in order.
    pub csv: Option<PathBuf>,
}

/// One equity index taking part in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Provider ticker, also the column name in the index file.
    pub symbol: String,
    /// Short label used in derived column and file names (`DJI_per_oz_gold`).
    pub label: String,
    /// Name shown on per-index charts.
    pub name: String,
    /// Name shown on the dashboard panel title (`<short_name>/Gold`).
    pub short_name: String,
}

impl IndexSpec {
    fn new(symbol: &str, label: &str, name: &str, short_name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            label: label.to_string(),
            name: name.to_string(),
            short_name: short_name.to_string(),
        }
    }
}

/// File name templates. `{start}` and `{end}` expand to ISO dates, `{symbol}`
/// to the gold symbol with `=` removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub gold_raw: String,
    pub index_raw: String,
    pub merged: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Fixed pause between consecutive index requests.
    pub pause_between_secs: f64,
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub multiplier: f64,
    pub jitter_secs: f64,
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start: ymd(2024, 1, 1),
            end: ymd(2025, 10, 20),
            output_dir: PathBuf::from("."),
            gold: GoldConfig::default(),
            indices: vec![
                IndexSpec::new("^DJI", "DJI", "DJIA", "Dow"),
                IndexSpec::new("^IXIC", "IXIC", "NASDAQ", "Nasdaq"),
            ],
            files: FileNames::default(),
            fetch: FetchConfig::default(),
            rolling: RollingConfig::default(),
        }
    }
}

impl Default for GoldConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["GC=F".to_string(), "MGC=F".to_string()],
            csv: None,
        }
    }
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            gold_raw: "gold_raw_{symbol}_{start}_{end}.csv".to_string(),
            index_raw: "index_closes_mon_fri_{start}_to_{end}.csv".to_string(),
            merged: "merged_indices_gold_mon_fri_{start}_to_{end}.csv".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            pause_between_secs: 2.5,
            max_attempts: 4,
            base_delay_secs: 2.0,
            multiplier: 1.6,
            jitter_secs: 0.75,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs_f64(self.base_delay_secs),
            multiplier: self.multiplier,
            jitter: Duration::from_secs_f64(self.jitter_secs),
        }
    }

    pub fn pause_between(&self) -> Duration {
        Duration::from_secs_f64(self.pause_between_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.end <= self.start {
            return invalid(format!("end {} must be after start {}", self.end, self.start));
        }
        if self.gold.symbols.is_empty() {
            return invalid("gold.symbols must not be empty".into());
        }
        if self.indices.is_empty() {
            return invalid("at least one index is required".into());
        }
        let mut symbols = HashSet::new();
        let mut labels = HashSet::new();
        for idx in &self.indices {
            if idx.symbol.trim().is_empty() || idx.label.trim().is_empty() {
                return invalid("index symbol and label must not be empty".into());
            }
            if !symbols.insert(idx.symbol.as_str()) {
                return invalid(format!("duplicate index symbol {}", idx.symbol));
            }
            if !labels.insert(idx.label.as_str()) {
                return invalid(format!("duplicate index label {}", idx.label));
            }
        }

        let r = &self.rolling;
        if r.short_window == 0 || r.long_window == 0 || r.z_lookback == 0 || r.z_min_samples == 0 {
            return invalid("rolling windows must be positive".into());
        }
        if r.z_min_samples > r.z_lookback {
            return invalid(format!(
                "rolling.z_min_samples ({}) exceeds rolling.z_lookback ({})",
                r.z_min_samples, r.z_lookback
            ));
        }

        let f = &self.fetch;
        let non_negative = [f.pause_between_secs, f.jitter_secs];
        if non_negative.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return invalid("fetch pause and jitter must be non-negative".into());
        }
        if !(f.base_delay_secs.is_finite() && f.base_delay_secs > 0.0) {
            return invalid("fetch.base_delay_secs must be positive".into());
        }
        if !(f.multiplier.is_finite() && f.multiplier > 0.0) {
            return invalid("fetch.multiplier must be positive".into());
        }
        if f.max_attempts == 0 {
            return invalid("fetch.max_attempts must be at least 1".into());
        }
        Ok(())
    }

    fn render(&self, template: &str, symbol: Option<&str>) -> PathBuf {
        let mut name = template
            .replace("{start}", &self.start.to_string())
            .replace("{end}", &self.end.to_string());
        if let Some(sym) = symbol {
            name = name.replace("{symbol}", &sym.replace('=', ""));
        }
        self.output_dir.join(name)
    }

    /// Commodity raw file for a given gold symbol.
    pub fn gold_raw_path(&self, symbol: &str) -> PathBuf {
        self.render(&self.files.gold_raw, Some(symbol))
    }

    pub fn index_raw_path(&self) -> PathBuf {
        self.render(&self.files.index_raw, None)
    }

    pub fn merged_path(&self) -> PathBuf {
        self.render(&self.files.merged, None)
    }

    /// Candidate commodity files for the merge stage, most preferred first.
    pub fn gold_csv_candidates(&self) -> Vec<PathBuf> {
        match &self.gold.csv {
            Some(path) => vec![path.clone()],
            None => self
                .gold
                .symbols
                .iter()
                .map(|s| self.gold_raw_path(s))
                .collect(),
        }
    }

    pub fn index_symbols(&self) -> Vec<&str> {
        self.indices.iter().map(|i| i.symbol.as_str()).collect()
    }

    pub fn merged_layout(&self) -> MergedLayout {
        MergedLayout::new(
            self.indices.iter().map(|i| i.symbol.clone()).collect(),
            self.indices.iter().map(|i| i.label.clone()).collect(),
        )
    }

    pub fn usd_vs_gold_chart_path(&self, idx: &IndexSpec) -> PathBuf {
        self.output_dir
            .join(format!("chart_{}_usd_vs_gold.svg", idx.label.to_lowercase()))
    }

    pub fn metrics_csv_path(&self, idx: &IndexSpec) -> PathBuf {
        self.output_dir
            .join(format!("metrics_{}.csv", idx.label.to_lowercase()))
    }

    pub fn metrics_chart_path(&self, idx: &IndexSpec) -> PathBuf {
        self.output_dir
            .join(format!("metrics_{}.svg", idx.label.to_lowercase()))
    }

    pub fn dashboard_path(&self) -> PathBuf {
        self.output_dir.join("metrics_dashboard.svg")
    }
}
