//! Data acquisition and alignment

pub mod align;
pub mod calendar;
pub mod fetch;
pub mod provider;
pub mod retry;
pub mod yahoo;

pub use align::{left_join_ffill, merge_index_gold, union_align};
pub use calendar::{filter_mon_fri, filter_weekdays};
pub use fetch::{fetch_series, fetch_with_fallback, FetchContext};
pub use provider::{DataError, DataProvider, FetchResult};
pub use retry::{FetchOutcome, Pause, RecordingPause, RetryPolicy, ThreadPause};
pub use yahoo::YahooProvider;
