//! Weekday calendar filtering.

use chrono::{Datelike, Weekday};

use crate::domain::Series;

/// Keep only points whose date falls on one of `days`.
pub fn filter_weekdays(series: &Series, days: &[Weekday]) -> Series {
    let points = series
        .points()
        .iter()
        .filter(|p| days.contains(&p.date.weekday()))
        .copied()
        .collect();
    Series::from_sorted(series.name(), points)
}

/// Keep only Monday and Friday observations.
pub fn filter_mon_fri(series: &Series) -> Series {
    filter_weekdays(series, &[Weekday::Mon, Weekday::Fri])
}
