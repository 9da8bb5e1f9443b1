//! Reading sites that already publish RSS 2.0, RSS 1.0 (RDF) or Atom.
//!
//! The root element decides the dialect. Entries are then read with a
//! streaming `quick_xml` reader that only looks at an entry's direct
//! children and matches them by qualified name, so extension elements such
//! as `<media:title>` or `<atom:link>` never shadow the plain ones.

use super::resolve_link;
use crate::config::SiteConfig;
use crate::error::ExtractError;
use crate::models::FeedItem;
use crate::utils::{collapse_whitespace, parse_published};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Rss,
    Rdf,
    Atom,
}

impl Dialect {
    fn from_root(root: &BytesStart) -> Result<Self, ExtractError> {
        match root.local_name().as_ref() {
            b"rss" => Ok(Dialect::Rss),
            b"RDF" => Ok(Dialect::Rdf),
            b"feed" => Ok(Dialect::Atom),
            other => Err(ExtractError::UnknownFeed(String::from_utf8_lossy(other).into_owned())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Dialect::Rss => "rss",
            Dialect::Rdf => "rdf",
            Dialect::Atom => "atom",
        }
    }

    fn entry_tag(self) -> &'static [u8] {
        match self {
            Dialect::Rss | Dialect::Rdf => b"item",
            Dialect::Atom => b"entry",
        }
    }

    /// Which slot a direct child of an entry fills, by qualified name.
    fn field(self, name: &[u8]) -> Option<Field> {
        use Dialect::*;
        match (self, name) {
            (_, b"title") => Some(Field::Title),
            (Rss | Rdf, b"link") => Some(Field::Link),
            (Rss | Rdf, b"guid") | (Atom, b"id") => Some(Field::Guid),
            (Rss | Rdf, b"description") | (Atom, b"summary") => Some(Field::Summary),
            (Atom, b"content") => Some(Field::Content),
            (Rss | Rdf, b"pubDate") | (Atom, b"published") => Some(Field::Date),
            (Rss | Rdf, b"dc:date" | b"date") | (Atom, b"updated") => Some(Field::FallbackDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Guid,
    Summary,
    Content,
    Date,
    FallbackDate,
}

/// Dialect-neutral view of one upstream entry. Each slot keeps the first
/// non-empty value seen.
#[derive(Debug, Default)]
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    other_link: Option<String>,
    guid: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    date: Option<String>,
    fallback_date: Option<String>,
}

impl RawEntry {
    fn set(&mut self, field: Field, raw: &str) {
        let value = collapse_whitespace(raw);
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Guid => &mut self.guid,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Date => &mut self.date,
            Field::FallbackDate => &mut self.fallback_date,
        };
        slot.get_or_insert(value);
    }

    /// Atom `<link href rel>`: `alternate` (or no rel) is the article itself.
    fn add_atom_link(&mut self, e: &BytesStart) -> Result<(), ExtractError> {
        let Some(href) = e.try_get_attribute("href").map_err(quick_xml::Error::from)? else {
            return Ok(());
        };
        let href = href.unescape_value()?.trim().to_string();
        if href.is_empty() {
            return Ok(());
        }
        let rel = e
            .try_get_attribute("rel")
            .map_err(quick_xml::Error::from)?
            .map(|a| a.unescape_value())
            .transpose()?;
        let slot = match rel.as_deref() {
            None | Some("alternate") => &mut self.link,
            Some(_) => &mut self.other_link,
        };
        slot.get_or_insert(href);
        Ok(())
    }
}

/// Append the text an `&...;` reference stands for. Unknown names are kept
/// as written.
fn push_reference(out: &mut String, reference: &BytesRef) -> Result<(), ExtractError> {
    if let Some(ch) = reference.resolve_char_ref()? {
        out.push(ch);
        return Ok(());
    }
    let name = reference.decode().map_err(quick_xml::Error::from)?;
    match resolve_predefined_entity(&name) {
        Some(text) => out.push_str(text),
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        }
    }
    Ok(())
}

/// Stream the document and collect its entries.
fn read_entries(xml: &str) -> Result<(Dialect, Vec<RawEntry>), ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut dialect: Option<Dialect> = None;
    let mut entries = Vec::new();
    let mut entry: Option<RawEntry> = None;
    // Nesting below the open entry element; 1 means a direct child.
    let mut depth = 0usize;
    let mut field: Option<Field> = None;
    let mut value = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let Some(kind) = dialect else {
                    dialect = Some(Dialect::from_root(&e)?);
                    continue;
                };
                match entry.as_mut() {
                    None => {
                        if e.name().as_ref() == kind.entry_tag() {
                            entry = Some(RawEntry::default());
                            depth = 0;
                        }
                    }
                    Some(current) => {
                        depth += 1;
                        if depth == 1 {
                            if kind == Dialect::Atom && e.name().as_ref() == b"link" {
                                current.add_atom_link(&e)?;
                            }
                            field = kind.field(e.name().as_ref());
                            value.clear();
                        }
                    }
                }
            }
            Event::Empty(e) => match (dialect, entry.as_mut()) {
                (None, _) => dialect = Some(Dialect::from_root(&e)?),
                (Some(Dialect::Atom), Some(current)) if depth == 0 && e.name().as_ref() == b"link" => {
                    current.add_atom_link(&e)?;
                }
                _ => {}
            },
            Event::Text(e) if field.is_some() => {
                value.push_str(&e.decode().map_err(quick_xml::Error::from)?);
            }
            Event::CData(e) if field.is_some() => {
                value.push_str(&e.decode().map_err(quick_xml::Error::from)?);
            }
            Event::GeneralRef(e) if field.is_some() => push_reference(&mut value, &e)?,
            Event::End(_) if entry.is_some() => {
                if depth == 0 {
                    entries.extend(entry.take());
                    continue;
                }
                if depth == 1 {
                    if let (Some(current), Some(done)) = (entry.as_mut(), field.take()) {
                        current.set(done, &value);
                    }
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let dialect = dialect.ok_or(ExtractError::EmptyDocument)?;
    Ok((dialect, entries))
}

/// Parse an upstream RSS/Atom document into items for `site`.
///
/// One odd entry never costs the others: entries without a usable link or
/// title are dropped on their own, and unknown child elements are skipped.
#[instrument(level = "info", skip_all, fields(site = %site.name))]
pub fn parse_feed(xml: &str, site: &SiteConfig) -> Result<Vec<FeedItem>, ExtractError> {
    let xml = xml.trim_start_matches('\u{feff}');
    let (dialect, entries) = read_entries(xml)?;

    let base = site.base()?;
    let total = entries.len();
    let items: Vec<FeedItem> = entries
        .into_iter()
        .filter_map(|entry| {
            let Some(link) = entry
                .link
                .or(entry.other_link)
                .as_deref()
                .and_then(|href| resolve_link(&base, href))
            else {
                debug!(title = ?entry.title, "Dropping feed entry without link");
                return None;
            };
            let Some(title) = entry.title else {
                debug!(%link, "Dropping feed entry without title");
                return None;
            };
            let published = entry
                .date
                .or(entry.fallback_date)
                .as_deref()
                .and_then(|d| parse_published(d, site.date_format.as_deref()));

            Some(FeedItem {
                title,
                guid: entry.guid.unwrap_or_else(|| link.clone()),
                link,
                description: entry.summary.or(entry.content).unwrap_or_default(),
                published,
                source: site.name.clone(),
                source_url: site.url.clone(),
            })
        })
        .collect();

    info!(dialect = dialect.name(), entries = total, count = items.len(), "Parsed upstream feed");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Selectors, SourceKind};
    use chrono::{TimeZone, Utc};

    fn site() -> SiteConfig {
        SiteConfig {
            name: "Commercial Observer".to_string(),
            url: "https://commercialobserver.com/feed/".to_string(),
            kind: SourceKind::Feed,
            selectors: Selectors::default(),
            date_attr: None,
            date_format: None,
            base_url: None,
        }
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Commercial Observer</title>
    <link>https://commercialobserver.com</link>
    <description>CRE news</description>
    <item>
      <title><![CDATA[Lender Takes Over Midtown Office]]></title>
      <link>https://commercialobserver.com/2025/03/midtown-office/</link>
      <guid isPermaLink="false">https://commercialobserver.com/?p=1001</guid>
      <category>Finance</category>
      <pubDate>Tue, 04 Mar 2025 14:30:00 +0000</pubDate>
      <description>Special servicer &amp; lender move in.</description>
    </item>
    <item>
      <title>Industrial Rents Cool</title>
      <link>/2025/03/industrial-rents/</link>
      <dc:date>2025-03-03T09:00:00Z</dc:date>
    </item>
    <item>
      <title>Headline without link</title>
    </item>
    <item>
      <link>https://commercialobserver.com/2025/03/untitled/</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss2() {
        let items = parse_feed(RSS, &site()).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Lender Takes Over Midtown Office");
        assert_eq!(items[0].link, "https://commercialobserver.com/2025/03/midtown-office/");
        assert_eq!(items[0].guid, "https://commercialobserver.com/?p=1001");
        assert_eq!(items[0].description, "Special servicer & lender move in.");
        assert_eq!(items[0].published, Some(Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap()));
        assert_eq!(items[0].source, "Commercial Observer");
    }

    #[test]
    fn test_rss_relative_link_and_dc_date() {
        let items = parse_feed(RSS, &site()).unwrap();
        assert_eq!(items[1].link, "https://commercialobserver.com/2025/03/industrial-rents/");
        assert_eq!(items[1].guid, items[1].link);
        assert_eq!(items[1].published, Some(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_atom() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>GlobeSt</title>
  <entry>
    <title type="html">Cap Rates Hold Steady</title>
    <link rel="self" href="https://www.globest.com/feeds/entry/1"/>
    <link rel="alternate" href="https://www.globest.com/2025/03/04/cap-rates/"/>
    <id>tag:globest.com,2025:1</id>
    <updated>2025-03-04T12:00:00Z</updated>
    <summary>Investors wait.</summary>
  </entry>
  <entry>
    <title>Second</title>
    <link href="https://www.globest.com/2025/03/03/second/"/>
    <id>tag:globest.com,2025:2</id>
    <published>2025-03-03T08:00:00-05:00</published>
    <updated>2025-03-05T08:00:00Z</updated>
  </entry>
</feed>"#;
        let items = parse_feed(atom, &site()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, "https://www.globest.com/2025/03/04/cap-rates/");
        assert_eq!(items[0].guid, "tag:globest.com,2025:1");
        assert_eq!(items[0].description, "Investors wait.");
        assert_eq!(items[0].published, Some(Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap()));
        assert_eq!(items[1].published, Some(Utc.with_ymd_and_hms(2025, 3, 3, 13, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_rdf() {
        let rdf = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/">
  <channel rdf:about="https://example.com/">
    <title>Example</title>
  </channel>
  <item rdf:about="https://example.com/a">
    <title>RDF Item</title>
    <link>https://example.com/a</link>
  </item>
</rdf:RDF>"#;
        let items = parse_feed(rdf, &site()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "RDF Item");
        assert_eq!(items[0].published, None);
    }

    #[test]
    fn test_html_document_is_unknown_feed() {
        let err = parse_feed("<html><body>Not a feed</body></html>", &site()).unwrap_err();
        assert!(matches!(err, ExtractError::UnknownFeed(root) if root == "html"));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(
            parse_feed("   ", &site()),
            Err(ExtractError::EmptyDocument)
        ));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(parse_feed("<rss><channel><item><title>x</item></channel></rss>", &site()).is_err());
    }

    const WORDPRESS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
  xmlns:dc="http://purl.org/dc/elements/1.1/"
  xmlns:content="http://purl.org/rss/1.0/modules/content/"
  xmlns:media="http://search.yahoo.com/mrss/"
  xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Connect CRE</title>
    <atom:link href="https://www.connectcre.com/feed/" rel="self" type="application/rss+xml"/>
    <item>
      <media:title>Photo: Downtown tower</media:title>
      <title>Office Conversions Gain Steam</title>
      <atom:link href="https://www.connectcre.com/amp/office-conversions/" rel="amphtml"/>
      <link>https://www.connectcre.com/stories/office-conversions/</link>
      <dc:creator><![CDATA[Staff]]></dc:creator>
      <category>Office</category>
      <category>Adaptive Reuse</category>
      <pubDate>Wed, 05 Mar 2025 10:00:00 +0000</pubDate>
      <description>Owners look at residential.</description>
      <content:encoded><![CDATA[<p>Long body</p>]]></content:encoded>
      <media:content url="https://img.connectcre.com/1.jpg">
        <media:title>Nested caption</media:title>
      </media:content>
    </item>
    <item>
      <title>Second &#8220;Quoted&#8221; &rsquo;Story&amp;Co</title>
      <link>https://www.connectcre.com/stories/second/</link>
      <dc:date>2025-03-04T08:00:00Z</dc:date>
      <date>2025-01-01T00:00:00Z</date>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_namespaced_children_do_not_shadow_plain_fields() {
        let items = parse_feed(WORDPRESS, &site()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Office Conversions Gain Steam");
        assert_eq!(items[0].link, "https://www.connectcre.com/stories/office-conversions/");
        assert_eq!(items[0].description, "Owners look at residential.");
        assert_eq!(items[0].published, Some(Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap()));
    }

    #[test]
    fn test_first_date_element_wins() {
        let items = parse_feed(WORDPRESS, &site()).unwrap();
        assert_eq!(items[1].published, Some(Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap()));
    }

    #[test]
    fn test_character_and_entity_references() {
        let items = parse_feed(WORDPRESS, &site()).unwrap();
        assert_eq!(items[1].title, "Second \u{201c}Quoted\u{201d} \u{2019}Story&Co");
    }

    #[test]
    fn test_atom_entry_with_extension_elements() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <entry>
    <media:title>Thumbnail</media:title>
    <title>Retail Vacancy Falls</title>
    <link rel="enclosure" href="https://www.globest.com/img/1.jpg"/>
    <id>tag:globest.com,2025:3</id>
    <content type="html">&lt;p&gt;Body text&lt;/p&gt;</content>
  </entry>
</feed>"#;
        let items = parse_feed(atom, &site()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Retail Vacancy Falls");
        // Only a non-alternate link is present, so it is used.
        assert_eq!(items[0].link, "https://www.globest.com/img/1.jpg");
        assert_eq!(items[0].description, "<p>Body text</p>");
        assert_eq!(items[0].published, None);
    }
}
