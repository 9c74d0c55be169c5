//! Command-line parsing for the SMARD ingestion job.
//!
//! The job is config-driven: `smard` with no arguments runs `smard ingest`
//! against `config.yaml`. Flags only exist to point at another config file and
//! to shape the read-only `show` view.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::io::config::DEFAULT_CONFIG_PATH;
use crate::report::DashboardFilter;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "smard", version, about = "SMARD energy time-series ingestion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every configured combination and upsert it into the store.
    Ingest(IngestArgs),
    /// Print stored rows as a table and bar plot (dashboard view).
    Show(ShowArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArg {
    /// YAML configuration document.
    #[arg(long, short = 'c', env = "SMARD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Only rows with this filter label.
    #[arg(long)]
    pub filter: Option<String>,

    /// Only rows for this region.
    #[arg(long)]
    pub region: Option<String>,

    /// Only rows with this resolution.
    #[arg(long)]
    pub resolution: Option<String>,

    /// First date (UTC, inclusive), e.g. 2024-01-01.
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last date (UTC, inclusive).
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Maximum number of table rows (most recent are kept).
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

impl ShowArgs {
    pub fn dashboard_filter(&self) -> DashboardFilter {
        DashboardFilter {
            filter_label: self.filter.clone(),
            region: self.region.clone(),
            resolution: self.resolution.clone(),
            from: self.from,
            to: self.to,
        }
    }
}
