//! ozratio core: equity indices priced in ounces of gold.
//!
//! This crate holds everything the pipeline stages share:
//! - Domain types (series, daily bars, index tables, merged and metric rows)
//! - Remote fetching with retry/backoff and symbol fallback
//! - Monday/Friday calendar filter and the gold left-join with forward-fill
//! - Derived ratios and rolling statistics
//! - Flat-file codecs and the SVG chart renderer

pub mod chart;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod metrics;

pub use error::PipelineError;
