//! ozratio runner: configuration and the pipeline stages.
//!
//! This crate builds on `ozratio-core` to provide:
//! - `PipelineConfig`, loaded from TOML with per-section defaults
//! - The stages `fetch_gold`, `fetch_indices`, `merge` and `metrics`, each
//!   reading prior flat files and writing its own

pub mod config;
pub mod pipeline;

pub use config::{ConfigError, FetchConfig, FileNames, GoldConfig, IndexSpec, PipelineConfig};
pub use pipeline::{fetch_gold, fetch_indices, merge, metrics, RunError, Stage, StageReport};
