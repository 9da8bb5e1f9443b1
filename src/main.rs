//! # cre_feed
//!
//! Builds one RSS feed out of a handful of commercial real-estate news
//! sites. Some sites are scraped from their HTML listing pages with CSS
//! selectors, others already publish RSS or Atom and are read directly.
//!
//! ## Usage
//!
//! ```sh
//! cre_feed -c sites.yaml -o public/feed.xml
//! ```
//!
//! A scheduled CI job runs this every 30 minutes and publishes `feed.xml`
//! as a static file; the binary itself keeps no state between runs.
//!
//! ## Architecture
//!
//! 1. **Config**: load and validate `sites.yaml` (fatal on error)
//! 2. **Fetching**: one GET per site; failures skip the site
//! 3. **Extraction**: selectors for HTML pages, RSS/Atom decoding for feeds
//! 4. **Merging**: dedupe by link, newest first, cap at `limit`
//! 5. **Output**: render RSS 2.0 and replace the output file

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod merge;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use cli::Cli;
use scrapers::HttpFetcher;
use utils::ensure_writable_parent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "cre_feed starting up");

    let args = Cli::parse();
    debug!(config = %args.config.display(), out = %args.out.display(), "Parsed CLI arguments");

    let config = match config::load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    // Fail before fetching anything if the feed could not be written anyway
    if let Err(e) = ensure_writable_parent(&args.out).await {
        error!(path = %args.out.display(), error = %e, "Output location is not writable");
        return Err(e.into());
    }

    let fetcher = match HttpFetcher::new() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            return Err(e.into());
        }
    };
    let summary = match pipeline::run(&fetcher, &config, &args.out).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(path = %args.out.display(), error = %e, "Failed to write feed");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        items = summary.items,
        failed_sites = summary.failed_sites.len(),
        failed = ?summary.failed_sites,
        path = %args.out.display(),
        "Execution complete"
    );

    Ok(())
}
