//! Domain types for ozratio

pub mod bar;
pub mod series;
pub mod table;

pub use bar::{close_series, DailyBar};
pub use series::{Series, SeriesError, TimePoint};
pub use table::{
    level_series, ratio_series, IndexColumn, IndexTable, MergedRow, RollingMetricRow,
};
