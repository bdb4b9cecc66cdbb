//! Treesync - Main entry point
//!
//! One-way file tree synchronization between two local directories.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use treesync::config::{Config, LocationSettings};
use treesync::location::LocalLocation;
use treesync::sync::{synchronize, SyncOptions};
use treesync::utils;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source directory (overrides config)
    source: Option<String>,

    /// Target directory (overrides config)
    target: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exclude pattern, repeatable; a leading '!' re-includes
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Diff and report without modifying the target
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    if let Some(source) = args.source {
        config.source = LocationSettings { dir: Some(source) };
    }
    if let Some(target) = args.target {
        config.target = LocationSettings { dir: Some(target) };
    }
    if !args.exclude.is_empty() {
        config.sync.exclude = args.exclude;
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!("Starting treesync v{}", env!("CARGO_PKG_VERSION"));

    let source = Arc::new(LocalLocation::new(&config.source)?);
    let target = Arc::new(LocalLocation::new(&config.target)?);

    tracing::info!(
        "Synchronizing {} -> {}{}",
        source.root().display(),
        target.root().display(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let options = SyncOptions {
        exclude: config.sync.exclude.clone(),
        dry_run: args.dry_run,
    };

    let summary = synchronize(source, target, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "created: {}, updated: {}, removed: {}, mode changed: {}, failed: {}, skipped: {}",
            summary.created,
            summary.updated,
            summary.removed,
            summary.mode_changed,
            summary.failed,
            summary.skipped
        );
    }

    if summary.failed > 0 {
        bail!("{} operation(s) failed", summary.failed);
    }

    Ok(())
}
