//! Command-line interface definitions for the feed builder.
//!
//! Both paths have defaults so a CI job can run the binary from the
//! repository root with no arguments.

use clap::Parser;
use std::path::PathBuf;

/// Merge commercial real-estate news sites into one RSS feed.
///
/// # Examples
///
/// ```sh
/// # Defaults: ./sites.yaml -> ./feed.xml
/// cre_feed
///
/// # Publishing into a static site directory
/// cre_feed -c config/sites.yaml -o public/feed.xml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML site configuration
    #[arg(short, long, default_value = "sites.yaml")]
    pub config: PathBuf,

    /// Path of the RSS file to write (overwritten)
    #[arg(short, long, default_value = "feed.xml")]
    pub out: PathBuf,
}
