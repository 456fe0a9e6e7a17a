//! ozratio CLI: one command per pipeline stage.
//!
//! Commands:
//! - `fetch-gold`: fetch the gold series (with symbol fallback) and write the commodity raw file
//! - `fetch-indices`: fetch the indices, keep Monday/Friday closes, write the index raw file
//! - `merge`: join gold onto the index dates, derive ratios, write merged file and charts
//! - `metrics`: rolling statistics per ratio, metrics files, charts and dashboard
//! - `config`: print the effective configuration as TOML

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ozratio_core::data::{ThreadPause, YahooProvider};
use ozratio_runner::{fetch_gold, fetch_indices, merge, metrics, PipelineConfig, StageReport};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ozratio",
    about = "Equity indices priced in ounces of gold",
    version
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the first requested date (YYYY-MM-DD).
    #[arg(long, global = true)]
    start: Option<NaiveDate>,

    /// Override the exclusive end date (YYYY-MM-DD).
    #[arg(long, global = true)]
    end: Option<NaiveDate>,

    /// Override the directory stages read from and write to.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Print the stage report as JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the gold series and write the commodity raw file.
    FetchGold,
    /// Fetch every index, filter to Monday/Friday, write the index raw file.
    FetchIndices,
    /// Merge the index and gold files, derive ratios, draw USD-vs-gold charts.
    Merge {
        /// Commodity file to use instead of the templated candidates.
        #[arg(long)]
        gold_csv: Option<PathBuf>,
    },
    /// Compute rolling statistics and draw the metrics charts.
    Metrics,
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = load_config(&cli)?;

    let report = match cli.command {
        Commands::Config => {
            print!("{}", cfg.to_toml()?);
            return Ok(());
        }
        Commands::FetchGold => {
            let provider = YahooProvider::new(cfg.fetch.timeout())?;
            fetch_gold(&cfg, &provider, &ThreadPause, &mut rand::thread_rng())
                .context("fetch-gold failed")?
        }
        Commands::FetchIndices => {
            let provider = YahooProvider::new(cfg.fetch.timeout())?;
            fetch_indices(&cfg, &provider, &ThreadPause, &mut rand::thread_rng())
                .context("fetch-indices failed")?
        }
        Commands::Merge { gold_csv } => {
            if gold_csv.is_some() {
                cfg.gold.csv = gold_csv;
            }
            merge(&cfg).context("merge failed")?
        }
        Commands::Metrics => metrics(&cfg).context("metrics failed")?,
    };

    print_report(&report, cli.json)
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(start) = cli.start {
        cfg.start = start;
    }
    if let Some(end) = cli.end {
        cfg.end = end;
    }
    if let Some(dir) = &cli.output_dir {
        cfg.output_dir = dir.clone();
    }
    cfg.validate().context("invalid configuration")?;
    info!(start = %cfg.start, end = %cfg.end, output_dir = %cfg.output_dir.display(), "configuration loaded");
    Ok(cfg)
}

fn print_report(report: &StageReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Stage:   {}", report.stage);
    if let Some(sym) = &report.symbol_used {
        println!("Source:  {sym}");
    }
    match report.date_range {
        Some((first, last)) => println!("Rows:    {} ({first} .. {last})", report.rows),
        None => println!("Rows:    {}", report.rows),
    }
    for path in &report.written {
        println!("Wrote:   {}", path.display());
    }
    Ok(())
}
