//! Trailing-window statistics over series with missing values.
//!
//! A window at position `i` covers positions `i + 1 - window ..= i` (clamped
//! at the start). Missing values inside the window are skipped; the statistic
//! is emitted only when at least `min_samples` present values remain.

use serde::{Deserialize, Serialize};

use crate::domain::{RollingMetricRow, Series};

/// Trailing window with a minimum-sample floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    pub window: usize,
    pub min_samples: usize,
}

impl RollingWindow {
    /// Window whose floor equals its length, as moving averages use.
    pub fn full(window: usize) -> Self {
        Self {
            window,
            min_samples: window,
        }
    }

    pub fn with_min_samples(window: usize, min_samples: usize) -> Self {
        Self {
            window,
            min_samples,
        }
    }

    /// Present values of the window ending at `i`, or `None` under the floor.
    fn samples(&self, values: &[Option<f64>], i: usize) -> Option<Vec<f64>> {
        if self.window == 0 {
            return None;
        }
        let from = (i + 1).saturating_sub(self.window);
        let present: Vec<f64> = values[from..=i].iter().flatten().copied().collect();
        (!present.is_empty() && present.len() >= self.min_samples).then_some(present)
    }
}

/// Offsets from the window's first sample. Summing these instead of the raw
/// values keeps a constant window exact: every offset is zero.
fn offsets(xs: &[f64]) -> (f64, Vec<f64>) {
    let x0 = xs.first().copied().unwrap_or(0.0);
    (x0, xs.iter().map(|x| x - x0).collect())
}

fn mean(xs: &[f64]) -> f64 {
    let (x0, dx) = offsets(xs);
    x0 + dx.iter().sum::<f64>() / dx.len() as f64
}

/// Sample standard deviation (`n - 1` denominator). Needs two values.
fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let (_, dx) = offsets(xs);
    let m = dx.iter().sum::<f64>() / dx.len() as f64;
    let ss: f64 = dx.iter().map(|d| (d - m) * (d - m)).sum();
    Some((ss / (dx.len() - 1) as f64).sqrt())
}

/// Rolling mean, one output per input position.
pub fn rolling_mean(values: &[Option<f64>], w: RollingWindow) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| w.samples(values, i).map(|xs| mean(&xs)))
        .collect()
}

/// Rolling sample standard deviation, one output per input position.
pub fn rolling_std(values: &[Option<f64>], w: RollingWindow) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| w.samples(values, i).and_then(|xs| sample_std(&xs)))
        .collect()
}

/// Window lengths for the metrics stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub z_lookback: usize,
    pub z_min_samples: usize,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            short_window: 50,
            long_window: 200,
            z_lookback: 750,
            z_min_samples: 252,
        }
    }
}

/// Moving averages and the lookback z-score for one ratio series.
///
/// `z = (value - mean) / std` over the z window. A flat window has zero
/// deviation, so its z-score is non-finite rather than missing.
pub fn compute_rolling_metrics(series: &Series, cfg: &RollingConfig) -> Vec<RollingMetricRow> {
    let values = series.values();
    let ma_short = rolling_mean(&values, RollingWindow::full(cfg.short_window));
    let ma_long = rolling_mean(&values, RollingWindow::full(cfg.long_window));
    let z_window = RollingWindow::with_min_samples(cfg.z_lookback, cfg.z_min_samples);
    let z_mean = rolling_mean(&values, z_window);
    let z_std = rolling_std(&values, z_window);

    series
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let z_score = match (p.value, z_mean[i], z_std[i]) {
                (Some(v), Some(m), Some(s)) => Some((v - m) / s),
                _ => None,
            };
            RollingMetricRow {
                date: p.date,
                ratio: p.value,
                ma_short: ma_short[i],
                ma_long: ma_long[i],
                z_mean: z_mean[i],
                z_std: z_std[i],
                z_score,
            }
        })
        .collect()
}
