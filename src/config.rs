//! YAML configuration: feed metadata, the item cap, and the list of sites.
//!
//! ```yaml
//! feed:
//!   title: CRE News Digest
//!   link: https://example.github.io/cre-feed/
//!   description: Commercial real estate headlines
//! limit: 60
//! sites:
//!   - name: Bisnow
//!     url: https://www.bisnow.com/national
//!     selectors:
//!       item: div.story
//!       title: h2
//!       link: a
//!       date: time
//!     date_attr: datetime
//!   - name: Commercial Observer
//!     url: https://commercialobserver.com/feed/
//!     kind: feed
//! ```
//!
//! Everything is validated up front so that a bad config aborts the run
//! before any request is made.

use crate::error::ConfigError;
use scraper::Selector;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, instrument};
use url::Url;

/// Cap applied when the config has no `limit` key.
pub const DEFAULT_LIMIT: usize = 60;

fn default_limit() -> Option<usize> {
    Some(DEFAULT_LIMIT)
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Channel-level metadata of the generated feed.
    pub feed: FeedMetadata,
    /// Maximum number of items in the output. `limit: ~` disables the cap.
    #[serde(default = "default_limit")]
    pub limit: Option<usize>,
    /// Sites in the order their items are considered for deduplication.
    #[serde(default, alias = "sources")]
    pub sites: Vec<SiteConfig>,
}

/// Static channel metadata copied into the RSS `<channel>`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedMetadata {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Suggested refresh interval for readers, in minutes.
    #[serde(default)]
    pub ttl: Option<u32>,
}

/// How a site's document is turned into items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An HTML listing page scraped with CSS selectors.
    #[default]
    Html,
    /// An existing RSS or Atom feed.
    #[serde(alias = "rss", alias = "atom")]
    Feed,
}

/// CSS selectors for each field, as written in the config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selectors {
    /// Container of one article. Other selectors are applied inside it.
    pub item: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
}

/// Parsed form of [`Selectors`].
#[derive(Debug)]
pub struct CompiledSelectors {
    pub item: Option<Selector>,
    pub title: Option<Selector>,
    pub link: Option<Selector>,
    pub date: Option<Selector>,
    pub description: Option<Selector>,
}

impl Selectors {
    pub fn is_empty(&self) -> bool {
        self.item.is_none()
            && self.title.is_none()
            && self.link.is_none()
            && self.date.is_none()
            && self.description.is_none()
    }

    /// Parse every configured selector, naming the offending field on error.
    pub fn compile(&self, site: &str) -> Result<CompiledSelectors, ConfigError> {
        let parse = |field: &'static str, raw: &Option<String>| {
            raw.as_deref()
                .map(|s| {
                    Selector::parse(s).map_err(|e| ConfigError::InvalidSelector {
                        site: site.to_string(),
                        field,
                        selector: s.to_string(),
                        reason: e.to_string(),
                    })
                })
                .transpose()
        };

        Ok(CompiledSelectors {
            item: parse("item", &self.item)?,
            title: parse("title", &self.title)?,
            link: parse("link", &self.link)?,
            date: parse("date", &self.date)?,
            description: parse("description", &self.description)?,
        })
    }
}

/// One configured news source.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Display name, also used as the item's `<source>`. Defaults to the
    /// URL's host.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub selectors: Selectors,
    /// Attribute holding the date (e.g. `datetime`), tried before the
    /// element text.
    #[serde(default)]
    pub date_attr: Option<String>,
    /// Explicit strftime-style format for the date text.
    #[serde(default)]
    pub date_format: Option<String>,
    /// Base for resolving relative links; defaults to `url`.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl SiteConfig {
    /// URL that relative article links are resolved against.
    pub fn base(&self) -> Result<Url, ConfigError> {
        let raw = self.base_url.as_deref().unwrap_or(&self.url);
        Url::parse(raw).map_err(|e| ConfigError::Invalid {
            site: self.name.clone(),
            reason: format!("invalid base url `{raw}`: {e}"),
        })
    }

    fn validate(&mut self, position: usize) -> Result<(), ConfigError> {
        let label = if self.name.trim().is_empty() {
            format!("#{position}")
        } else {
            self.name.clone()
        };
        let invalid = |reason: String| ConfigError::Invalid {
            site: label.clone(),
            reason,
        };

        self.url = self.url.trim().to_string();
        if self.url.is_empty() {
            return Err(invalid("missing url".to_string()));
        }
        let parsed = Url::parse(&self.url).map_err(|e| invalid(format!("invalid url `{}`: {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("url `{}` is not http(s)", self.url)));
        }

        if self.name.trim().is_empty() {
            self.name = parsed.host_str().map(str::to_string).unwrap_or(label.clone());
        }
        self.base()?;

        if self.kind == SourceKind::Html {
            if self.selectors.is_empty() {
                return Err(invalid("no selectors configured".to_string()));
            }
            if self.selectors.title.is_none() && self.selectors.link.is_none() {
                return Err(invalid("needs a title or link selector".to_string()));
            }
            self.selectors.compile(&self.name)?;
        }

        Ok(())
    }
}

impl FeedConfig {
    /// Parse and validate a configuration document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: FeedConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.feed.title.trim().is_empty() {
            return Err(ConfigError::Feed("title is empty".to_string()));
        }
        if self.feed.link.trim().is_empty() {
            return Err(ConfigError::Feed("link is empty".to_string()));
        }
        if self.limit == Some(0) {
            return Err(ConfigError::Feed("limit must be greater than zero".to_string()));
        }
        for (i, site) in self.sites.iter_mut().enumerate() {
            site.validate(i + 1)?;
            debug!(site = %site.name, url = %site.url, kind = ?site.kind, "Validated site");
        }
        Ok(())
    }
}

/// Read, parse and validate the config file at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> Result<FeedConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config = FeedConfig::from_yaml(&content)?;
    info!(sites = config.sites.len(), limit = ?config.limit, "Loaded configuration");
    Ok(config)
}
