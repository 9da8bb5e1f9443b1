//! Data models shared by the extractors, the merger and the renderer.
//!
//! - [`FeedItem`]: one normalized article, whatever kind of site it came from
//! - [`Harvest`]: everything collected from all configured sites in one run

use chrono::{DateTime, Utc};

/// A single article normalized from an HTML listing or an upstream feed.
///
/// `link` is the deduplication key across sites. `published` is `None` when
/// the site exposed no date or one that could not be parsed; such items sort
/// after every dated item.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// Headline text, whitespace-collapsed.
    pub title: String,
    /// Absolute article URL.
    pub link: String,
    /// Stable identifier. The link for scraped items, the upstream
    /// `guid`/`id` for feed items when one was present.
    pub guid: String,
    /// Optional teaser or summary; empty when the site has none.
    pub description: String,
    /// Publication time, if known.
    pub published: Option<DateTime<Utc>>,
    /// Name of the configured site the item came from.
    pub source: String,
    /// URL of that site, for the RSS `<source url="...">` attribute.
    pub source_url: String,
}

impl FeedItem {
    /// Whether the guid is the article URL itself (RSS `isPermaLink`).
    pub fn guid_is_permalink(&self) -> bool {
        self.guid == self.link
    }
}

/// Items gathered from every site, in configuration order, plus the names of
/// sites that contributed nothing because they failed.
#[derive(Debug, Default)]
pub struct Harvest {
    pub items: Vec<FeedItem>,
    pub failed_sites: Vec<String>,
}
