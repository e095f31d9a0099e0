//! Listing-Harvest main entry point
//!
//! This is the command-line interface for the Listing-Harvest extractor.

use anyhow::Context;
use clap::Parser;
use listing_harvest::config::{load_config, load_default_config};
use listing_harvest::crawler::crawl;
use listing_harvest::output::print_statistics;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Listing-Harvest: a regional business-listing extractor
///
/// Discovers every region on the listings site, enriches each company with
/// its external website and appends the results to a semicolon-separated
/// file. Without arguments the built-in site and output paths are used.
#[derive(Parser, Debug)]
#[command(name = "listing-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A regional business-listing extractor", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file overriding the defaults
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let start_time = Instant::now();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
        }
        None => load_default_config().context("built-in configuration is invalid")?,
    };

    tracing::info!(
        "Harvesting {} with {} workers into {}",
        config.site.base_url,
        config.crawler.workers,
        config.output.records_path
    );

    let stats = crawl(config).await.context("harvest failed")?;

    if !cli.quiet {
        print_statistics(&stats);
    }
    println!("total: {:.3}", start_time.elapsed().as_secs_f64());

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvest=info,warn"),
            1 => EnvFilter::new("listing_harvest=debug,info"),
            2 => EnvFilter::new("listing_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
