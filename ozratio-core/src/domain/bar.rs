//! DailyBar: one trading day of OHLC + adjusted close + volume.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::series::{Series, TimePoint};

/// Daily price bar as returned by the provider and stored in the commodity raw file.
///
/// Fields the provider left null are `NaN`; they are written back out as empty cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl DailyBar {
    /// Adjusted close when the provider supplied one, otherwise the raw close.
    pub fn pick_close(&self) -> f64 {
        if self.adj_close.is_finite() {
            self.adj_close
        } else {
            self.close
        }
    }
}

/// Turn bars into a close-price series. Non-finite closes become missing values.
pub fn close_series(name: impl Into<String>, bars: &[DailyBar]) -> Series {
    let points = bars
        .iter()
        .map(|b| {
            let c = b.pick_close();
            TimePoint {
                date: b.date,
                value: c.is_finite().then_some(c),
            }
        })
        .collect();
    Series::from_unsorted_dedup(name, points)
}
