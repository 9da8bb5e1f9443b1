//! Selector-driven extraction from HTML listing pages.
//!
//! With an `item` selector each matching element is one article block and
//! the field selectors are applied inside it. A block that itself matches a
//! field selector (e.g. `item: a.story` with `link: a`) is used directly.
//!
//! Without an `item` selector the field selectors run over the whole page and
//! their matches are paired up by position. Dates and descriptions are only
//! used in that mode when they match exactly once per article.
//!
//! When only one of `title` / `link` is configured the other is taken from
//! the same element: its text, or its `href` (or its first descendant
//! anchor's). Items still lacking a title or a link are dropped.

use super::resolve_link;
use crate::config::{CompiledSelectors, SiteConfig};
use crate::error::ExtractError;
use crate::models::FeedItem;
use crate::utils::{collapse_whitespace, parse_published};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Elements matched for one article.
#[derive(Debug, Default, Clone, Copy)]
struct Fields<'a> {
    title: Option<ElementRef<'a>>,
    link: Option<ElementRef<'a>>,
    date: Option<ElementRef<'a>>,
    description: Option<ElementRef<'a>>,
}

/// Extract items from an HTML listing page using the site's selectors.
///
/// Returns an empty vector when nothing matches; that is for the caller to
/// report.
#[instrument(level = "info", skip_all, fields(site = %site.name))]
pub fn extract_items(html: &str, site: &SiteConfig) -> Result<Vec<FeedItem>, ExtractError> {
    let selectors = site.selectors.compile(&site.name)?;
    let base = site.base()?;
    let document = Html::parse_document(html);

    let rows = match &selectors.item {
        Some(item) => document
            .select(item)
            .map(|block| Fields {
                title: first_in(block, selectors.title.as_ref()),
                link: first_in(block, selectors.link.as_ref()),
                date: first_in(block, selectors.date.as_ref()),
                description: first_in(block, selectors.description.as_ref()),
            })
            .collect::<Vec<_>>(),
        None => positional(&document, &selectors),
    };

    let matched = rows.len();
    let items: Vec<FeedItem> = rows
        .into_iter()
        .filter_map(|fields| build_item(fields, &selectors, site, &base))
        .collect();

    info!(
        matched,
        count = items.len(),
        dropped = matched - items.len(),
        "Extracted HTML items"
    );
    Ok(items)
}

/// First element in `block` (the block itself included) matching `selector`.
fn first_in<'a>(block: ElementRef<'a>, selector: Option<&Selector>) -> Option<ElementRef<'a>> {
    let selector = selector?;
    if selector.matches(&block) {
        return Some(block);
    }
    block.select(selector).next()
}

fn positional<'a>(document: &'a Html, selectors: &CompiledSelectors) -> Vec<Fields<'a>> {
    let all = |selector: Option<&Selector>| -> Vec<ElementRef<'a>> {
        selector
            .map(|s| document.select(s).collect())
            .unwrap_or_default()
    };

    let titles = all(selectors.title.as_ref());
    let links = all(selectors.link.as_ref());
    let count = titles.len().max(links.len());
    let dates = aligned("date", all(selectors.date.as_ref()), count);
    let descriptions = aligned("description", all(selectors.description.as_ref()), count);

    (0..count)
        .map(|i| Fields {
            title: titles.get(i).copied(),
            link: links.get(i).copied(),
            date: dates.get(i).copied(),
            description: descriptions.get(i).copied(),
        })
        .collect()
}

/// Optional fields are only paired when they match once per article;
/// otherwise an article without one would take its neighbour's.
fn aligned<'a>(field: &'static str, matches: Vec<ElementRef<'a>>, count: usize) -> Vec<ElementRef<'a>> {
    if matches.is_empty() || matches.len() == count {
        return matches;
    }
    warn!(
        field,
        matched = matches.len(),
        items = count,
        "Field matches do not line up with items; ignoring them (set an `item` selector)"
    );
    Vec::new()
}

fn build_item(
    fields: Fields<'_>,
    selectors: &CompiledSelectors,
    site: &SiteConfig,
    base: &Url,
) -> Option<FeedItem> {
    let link_el = if selectors.link.is_some() { fields.link } else { fields.title };
    let title_el = if selectors.title.is_some() { fields.title } else { fields.link };

    let Some(link) = link_el.and_then(href_of).and_then(|href| resolve_link(base, href)) else {
        debug!(title = ?title_el.map(element_text), "Dropping item without link");
        return None;
    };
    let Some(title) = title_el.map(element_text).filter(|t| !t.is_empty()) else {
        debug!(%link, "Dropping item without title");
        return None;
    };

    let published = fields.date.and_then(|el| {
        let raw = site
            .date_attr
            .as_deref()
            .and_then(|attr| el.value().attr(attr))
            .map(str::to_string)
            .unwrap_or_else(|| element_text(el));
        parse_published(&raw, site.date_format.as_deref())
    });
    let description = fields.description.map(element_text).unwrap_or_default();

    Some(FeedItem {
        title,
        guid: link.clone(),
        link,
        description,
        published,
        source: site.name.clone(),
        source_url: site.url.clone(),
    })
}

fn href_of(el: ElementRef<'_>) -> Option<&str> {
    el.value()
        .attr("href")
        .or_else(|| el.select(&ANCHOR).next().and_then(|a| a.value().attr("href")))
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Selectors, SourceKind};
    use chrono::{TimeZone, Utc};

    const LISTING: &str = r#"
<html><body>
  <div class="story">
    <h2><a href="/national/news/office/tower-sale-123">  Downtown Tower
      Trades Hands </a></h2>
    <time datetime="2025-03-04T14:30:00Z">March 4</time>
    <p class="dek">A $400M office deal.</p>
  </div>
  <div class="story">
    <h2><a href="https://www.bisnow.com/national/news/retail/mall-456">Mall Reopens</a></h2>
    <time>Published: March 2nd, 2025</time>
  </div>
  <div class="story">
    <h2>No link here</h2>
    <time datetime="2025-03-05T10:00:00Z"></time>
  </div>
  <div class="story">
    <h2><a href="/national/news/industrial/warehouse-789"></a></h2>
  </div>
</body></html>
"#;

    fn site(selectors: Selectors) -> SiteConfig {
        SiteConfig {
            name: "Bisnow".to_string(),
            url: "https://www.bisnow.com/national".to_string(),
            kind: SourceKind::Html,
            selectors,
            date_attr: Some("datetime".to_string()),
            date_format: None,
            base_url: None,
        }
    }

    fn block_selectors() -> Selectors {
        Selectors {
            item: Some("div.story".to_string()),
            title: Some("h2".to_string()),
            link: Some("a".to_string()),
            date: Some("time".to_string()),
            description: Some("p.dek".to_string()),
        }
    }

    #[test]
    fn test_extracts_blocks_and_drops_incomplete() {
        let items = extract_items(LISTING, &site(block_selectors())).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Downtown Tower Trades Hands");
        assert_eq!(items[0].link, "https://www.bisnow.com/national/news/office/tower-sale-123");
        assert_eq!(items[0].guid, items[0].link);
        assert_eq!(items[0].description, "A $400M office deal.");
        assert_eq!(items[0].published, Some(Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap()));
        assert_eq!(items[0].source, "Bisnow");

        assert_eq!(items[1].title, "Mall Reopens");
        assert_eq!(items[1].description, "");
    }

    #[test]
    fn test_date_falls_back_to_text_when_attr_missing() {
        let items = extract_items(LISTING, &site(block_selectors())).unwrap();
        assert_eq!(items[1].published, Some(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_missing_date_selector_yields_none() {
        let mut selectors = block_selectors();
        selectors.date = None;
        let items = extract_items(LISTING, &site(selectors)).unwrap();
        assert!(items.iter().all(|i| i.published.is_none()));
    }

    #[test]
    fn test_title_only_uses_descendant_anchor_for_link() {
        let selectors = Selectors {
            item: Some("div.story".to_string()),
            title: Some("h2".to_string()),
            ..Selectors::default()
        };
        let items = extract_items(LISTING, &site(selectors)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].link, "https://www.bisnow.com/national/news/retail/mall-456");
    }

    #[test]
    fn test_link_only_uses_anchor_text_for_title() {
        let selectors = Selectors {
            item: Some("div.story".to_string()),
            link: Some("h2 a".to_string()),
            ..Selectors::default()
        };
        let items = extract_items(LISTING, &site(selectors)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Downtown Tower Trades Hands");
    }

    #[test]
    fn test_block_that_is_itself_the_link() {
        let html = r#"
<ul>
  <li><a class="headline" href="/cre/a">First</a></li>
  <li><a class="headline" href="/cre/b">Second</a></li>
</ul>"#;
        let selectors = Selectors {
            item: Some("a.headline".to_string()),
            link: Some("a".to_string()),
            ..Selectors::default()
        };
        let items = extract_items(html, &site(selectors)).unwrap();
        let links: Vec<_> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, vec!["https://www.bisnow.com/cre/a", "https://www.bisnow.com/cre/b"]);
        assert_eq!(items[1].title, "Second");
    }

    #[test]
    fn test_positional_pairing_without_item_selector() {
        let html = r#"
<main>
  <h3><a href="/deals/1">Deal One</a></h3>
  <span class="date">2025-03-01</span>
  <h3><a href="/deals/2">Deal Two</a></h3>
  <span class="date">2025-03-02</span>
  <h3><a href="/deals/3">Deal Three</a></h3>
  <span class="date">2025-03-03</span>
</main>"#;
        let selectors = Selectors {
            title: Some("h3".to_string()),
            date: Some("span.date".to_string()),
            ..Selectors::default()
        };
        let mut site = site(selectors);
        site.date_attr = None;
        let items = extract_items(html, &site).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].title, "Deal Two");
        assert_eq!(items[1].published, Some(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()));
        assert_eq!(items[2].published, Some(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_positional_dates_ignored_when_counts_differ() {
        let html = r#"
<main>
  <h3><a href="/deals/1">Deal One</a></h3>
  <span class="date">2025-03-01</span>
  <h3><a href="/deals/2">Deal Two</a></h3>
  <h3><a href="/deals/3">Deal Three</a></h3>
  <span class="date">2025-03-03</span>
  <p class="dek">One</p>
  <p class="dek">Two</p>
  <p class="dek">Three</p>
</main>"#;
        let selectors = Selectors {
            title: Some("h3".to_string()),
            date: Some("span.date".to_string()),
            description: Some("p.dek".to_string()),
            ..Selectors::default()
        };
        let mut site = site(selectors);
        site.date_attr = None;
        let items = extract_items(html, &site).unwrap();
        assert_eq!(items.len(), 3);
        // Deal Two must not inherit Deal Three's date.
        assert!(items.iter().all(|i| i.published.is_none()));
        assert_eq!(items[2].description, "Three");
    }

    #[test]
    fn test_base_url_overrides_page_url() {
        let html = r#"<div class="story"><h2><a href="story-1">One</a></h2></div>"#;
        let mut site = site(block_selectors());
        site.base_url = Some("https://news.example.com/cre/".to_string());
        let items = extract_items(html, &site).unwrap();
        assert_eq!(items[0].link, "https://news.example.com/cre/story-1");
    }

    #[test]
    fn test_explicit_date_format() {
        let html = r#"<div class="story"><h2><a href="/x">X</a></h2><time>04.03.2025</time></div>"#;
        let mut site = site(block_selectors());
        site.date_attr = None;
        site.date_format = Some("%d.%m.%Y".to_string());
        let items = extract_items(html, &site).unwrap();
        assert_eq!(items[0].published, Some(Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let items = extract_items("<html><body><p>maintenance</p></body></html>", &site(block_selectors())).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_invalid_selector_is_error() {
        let selectors = Selectors {
            title: Some("h2[".to_string()),
            ..Selectors::default()
        };
        assert!(matches!(
            extract_items(LISTING, &site(selectors)),
            Err(ExtractError::Config(_))
        ));
    }
}
