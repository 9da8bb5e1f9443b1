//! Error types for each pipeline stage.
//!
//! [`ConfigError`] and [`OutputError`] are fatal and abort the run.
//! [`FetchError`] and [`ExtractError`] only ever cost a single site, and are
//! folded into [`SiteError`] by the pipeline before being logged and skipped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("feed: {0}")]
    Feed(String),

    #[error("site `{site}`: {reason}")]
    Invalid { site: String, reason: String },

    #[error("site `{site}`: invalid {field} selector `{selector}`: {reason}")]
    InvalidSelector {
        site: String,
        field: &'static str,
        selector: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} when fetching {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("unrecognised feed root element `{0}`")]
    UnknownFeed(String),

    #[error("document has no root element")]
    EmptyDocument,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Anything that can make a single site contribute nothing to the feed.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render feed: {0}")]
    Render(#[from] std::io::Error),
}
