//! Combining every site's items into the final feed order.

use crate::models::FeedItem;
use itertools::Itertools;
use std::cmp::Reverse;
use tracing::{debug, instrument};

/// Deduplicate, order and cap the items gathered from all sites.
///
/// - Items sharing a link collapse to the first one in input order.
/// - Newest first; undated items go last. The sort is stable, so equal
///   dates (and all undated items) keep their input order.
/// - `limit` keeps only the first `limit` items after sorting.
#[instrument(level = "info", skip_all, fields(input = items.len(), limit = ?limit))]
pub fn merge_items(items: Vec<FeedItem>, limit: Option<usize>) -> Vec<FeedItem> {
    let input = items.len();
    let mut merged: Vec<FeedItem> = items
        .into_iter()
        .unique_by(|item| item.link.clone())
        .collect();
    let duplicates = input - merged.len();

    merged.sort_by_key(|item| Reverse(item.published));

    if let Some(limit) = limit {
        merged.truncate(limit);
    }

    debug!(duplicates, output = merged.len(), "Merged items");
    merged
}
