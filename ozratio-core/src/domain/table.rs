//! Tabular shapes handed between pipeline stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::series::{Series, TimePoint};

/// Index levels on a shared date axis: one column per index symbol.
///
/// Every column has exactly `dates.len()` entries. `None` marks a date on which
/// that index had no observation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<IndexColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub symbol: String,
    pub values: Vec<Option<f64>>,
}

impl IndexTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.symbol.as_str()).collect()
    }

    pub fn column(&self, symbol: &str) -> Option<&IndexColumn> {
        self.columns.iter().find(|c| c.symbol == symbol)
    }
}

/// One merged row: index levels, the forward-filled gold price, and the ratios.
///
/// `index_levels` and `ratios` are ordered like the index columns they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub date: NaiveDate,
    pub index_levels: Vec<Option<f64>>,
    pub gold_close: f64,
    pub ratios: Vec<Option<f64>>,
}

/// Pull column `i` of the merged ratios out as a series.
pub fn ratio_series(name: impl Into<String>, rows: &[MergedRow], i: usize) -> Series {
    let points = rows
        .iter()
        .map(|r| TimePoint {
            date: r.date,
            value: r.ratios.get(i).copied().flatten(),
        })
        .collect();
    Series::from_unsorted_dedup(name, points)
}

/// Pull index level column `i` out as a series.
pub fn level_series(name: impl Into<String>, rows: &[MergedRow], i: usize) -> Series {
    let points = rows
        .iter()
        .map(|r| TimePoint {
            date: r.date,
            value: r.index_levels.get(i).copied().flatten(),
        })
        .collect();
    Series::from_unsorted_dedup(name, points)
}

/// Rolling statistics for one date of one ratio series.
///
/// Every statistic stays `None` until its window (or minimum-sample floor) is met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingMetricRow {
    pub date: NaiveDate,
    pub ratio: Option<f64>,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub z_mean: Option<f64>,
    pub z_std: Option<f64>,
    pub z_score: Option<f64>,
}

impl RollingMetricRow {
    /// `z_mean ± k * z_std`, when both are defined.
    pub fn envelope(&self, k: f64) -> Option<(f64, f64)> {
        match (self.z_mean, self.z_std) {
            (Some(m), Some(s)) => Some((m - k * s, m + k * s)),
            _ => None,
        }
    }
}
