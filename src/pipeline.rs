//! One run of the feed builder: fetch every site, merge, write.

use crate::config::{FeedConfig, SiteConfig};
use crate::error::OutputError;
use crate::merge::merge_items;
use crate::models::Harvest;
use crate::outputs::rss;
use crate::scrapers::{DocumentSource, scrape_site};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Sites fetched concurrently. Results are still consumed in config order.
const MAX_IN_FLIGHT: usize = 6;

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// Items written to the feed.
    pub items: usize,
    /// Sites skipped because fetching or extraction failed.
    pub failed_sites: Vec<String>,
}

/// Fetch and extract every site, isolating failures per site.
#[instrument(level = "info", skip_all, fields(sites = sites.len()))]
pub async fn collect_items<S: DocumentSource>(source: &S, sites: &[SiteConfig]) -> Harvest {
    let results: Vec<_> = stream::iter(sites)
        .map(|site| async move { (site, scrape_site(source, site).await) })
        .buffered(MAX_IN_FLIGHT)
        .collect()
        .await;

    let mut harvest = Harvest::default();
    for (site, result) in results {
        match result {
            Ok(items) if items.is_empty() => {
                warn!(site = %site.name, url = %site.url, "No items extracted; check the selectors");
            }
            Ok(items) => {
                info!(site = %site.name, count = items.len(), "Collected items");
                harvest.items.extend(items);
            }
            Err(e) => {
                warn!(site = %site.name, url = %site.url, error = %e, "Skipping site");
                harvest.failed_sites.push(site.name.clone());
            }
        }
    }
    harvest
}

/// Run the whole pipeline and write the feed to `out`.
///
/// Site failures are tolerated; only a failure to write the output is an
/// error.
#[instrument(level = "info", skip_all, fields(out = %out.display()))]
pub async fn run<S: DocumentSource>(source: &S, config: &FeedConfig, out: &Path) -> Result<RunSummary, OutputError> {
    let harvest = collect_items(source, &config.sites).await;
    let collected = harvest.items.len();

    let merged = merge_items(harvest.items, config.limit);
    info!(collected, merged = merged.len(), failed = harvest.failed_sites.len(), "Merged feed");

    rss::write_feed(&config.feed, &merged, out).await?;

    Ok(RunSummary {
        items: merged.len(),
        failed_sites: harvest.failed_sites,
    })
}
