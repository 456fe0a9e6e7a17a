//! Series: an ordered, date-unique sequence of observations for one quantity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One dated observation. `None` means the value is missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl TimePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value: Some(value),
        }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self { date, value: None }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("series '{name}' has duplicate date {date}")]
    DuplicateDate { name: String, date: NaiveDate },
}

/// Named series with strictly increasing dates.
///
/// The only way to build one is through a constructor that enforces the
/// ordering invariant, so every consumer can rely on `points` being sorted
/// ascending with no repeated dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    points: Vec<TimePoint>,
}

impl Series {
    /// Build a series, sorting by date. Duplicate dates are rejected.
    pub fn new(name: impl Into<String>, mut points: Vec<TimePoint>) -> Result<Self, SeriesError> {
        let name = name.into();
        points.sort_by_key(|p| p.date);
        if let Some(w) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate {
                name,
                date: w[0].date,
            });
        }
        Ok(Self { name, points })
    }

    /// Build a series from untrusted input: sort (stable) and keep the first
    /// observation seen for each date.
    pub fn from_unsorted_dedup(name: impl Into<String>, mut points: Vec<TimePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            name: name.into(),
            points,
        }
    }

    /// Wrap points already known to be sorted and unique.
    pub(crate) fn from_sorted(name: impl Into<String>, points: Vec<TimePoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Value observed on exactly `date`, if any (binary search).
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .and_then(|i| self.points[i].value)
    }

    /// Same points under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: self.points.clone(),
        }
    }
}
