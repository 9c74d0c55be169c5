//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initialises logging
//! - parses CLI arguments
//! - loads the YAML configuration
//! - runs ingestion or renders the dashboard view

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, IngestArgs, ShowArgs};
use crate::error::AppError;
use crate::io::config::load_config;

pub mod pipeline;
pub mod show;

/// Entry point for the `smard` binary.
pub fn run() -> Result<(), AppError> {
    init_tracing();

    // `smard` and `smard --config x.yaml` behave like `smard ingest ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Ingest(args) => handle_ingest(args),
        Command::Show(args) => handle_show(args),
    }
}

/// Progress and diagnostics go to stdout; `RUST_LOG` overrides the `info` default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .compact()
        .try_init();
}

fn handle_ingest(args: IngestArgs) -> Result<(), AppError> {
    let config = load_config(&args.config.config)?;
    pipeline::ingest(&config)?;
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let config = load_config(&args.config.config)?;
    let store = crate::store::open_store(&config.runtime.database_url);
    let opts = show::ShowOptions {
        limit: args.limit,
        width: args.width,
        height: args.height,
    };
    let out = show::render_dashboard(store.as_ref(), &args.dashboard_filter(), opts)?;
    print!("{out}");
    Ok(())
}

/// Rewrite argv so `smard` defaults to `smard ingest`.
///
/// Rules:
/// - `smard`                      -> `smard ingest`
/// - `smard --config x.yaml`      -> `smard ingest --config x.yaml`
/// - `smard --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("ingest".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "ingest" | "show");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "ingest".to_string());
        return argv;
    }

    argv
}
