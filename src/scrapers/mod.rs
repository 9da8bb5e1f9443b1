//! Fetching site documents and turning them into [`FeedItem`]s.
//!
//! Every configured site goes through the same two steps:
//!
//! 1. **Fetching**: one GET of the site's URL through a [`DocumentSource`]
//! 2. **Extraction**: [`html`] applies the configured CSS selectors to a
//!    listing page, [`feed`] reads an upstream RSS/Atom document
//!
//! A failure in either step only costs that site; callers log it and move on.

pub mod feed;
pub mod html;

use crate::config::{SiteConfig, SourceKind};
use crate::error::{FetchError, SiteError};
use crate::models::FeedItem;
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const USER_AGENT: &str = "CustomFeedBot/1.0 (+https://example.com)";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can produce the raw document for a site.
pub trait DocumentSource {
    async fn fetch(&self, site: &SiteConfig) -> Result<String, FetchError>;
}

/// Fetches documents over HTTP with a fixed User-Agent and timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl DocumentSource for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(site = %site.name, url = %site.url))]
    async fn fetch(&self, site: &SiteConfig) -> Result<String, FetchError> {
        let response = self.client.get(&site.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: site.url.clone(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched document");
        Ok(body)
    }
}

/// Fetch one site and extract its items according to its kind.
pub async fn scrape_site<S: DocumentSource>(
    source: &S,
    site: &SiteConfig,
) -> Result<Vec<FeedItem>, SiteError> {
    let body = source.fetch(site).await?;

    let extracted = match site.kind {
        SourceKind::Html => html::extract_items(&body, site),
        SourceKind::Feed => feed::parse_feed(&body, site),
    };
    let items = extracted.inspect_err(|e| {
        debug!(
            site = %site.name,
            error = %e,
            preview = %truncate_for_log(&body, 200),
            "Extraction failed"
        )
    })?;
    Ok(items)
}

/// Resolve an `href` against the site's base URL.
///
/// Fragment-only, `javascript:` and `mailto:` links are rejected, as is
/// anything that does not resolve to http(s). Fragments are dropped so the
/// same article linked with different anchors deduplicates.
pub(crate) fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if href.is_empty() || href.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
