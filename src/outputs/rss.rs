//! RSS 2.0 rendering and writing.
//!
//! The whole document is rendered in memory, written next to the target and
//! renamed over it, so readers of the published file only ever see the
//! previous feed or the complete new one.

use crate::config::FeedMetadata;
use crate::error::OutputError;
use crate::models::FeedItem;
use crate::utils::{rfc822, strip_control_chars};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> std::io::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(&strip_control_chars(text))))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_item<W: Write>(w: &mut Writer<W>, item: &FeedItem) -> std::io::Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(w, "title", &item.title)?;
    write_text_element(w, "link", &item.link)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", if item.guid_is_permalink() { "true" } else { "false" }));
    w.write_event(Event::Start(guid))?;
    w.write_event(Event::Text(BytesText::new(&strip_control_chars(&item.guid))))?;
    w.write_event(Event::End(BytesEnd::new("guid")))?;

    if !item.description.is_empty() {
        write_text_element(w, "description", &item.description)?;
    }
    if let Some(published) = &item.published {
        write_text_element(w, "pubDate", &rfc822(published))?;
    }

    let mut source = BytesStart::new("source");
    source.push_attribute(("url", item.source_url.as_str()));
    w.write_event(Event::Start(source))?;
    w.write_event(Event::Text(BytesText::new(&strip_control_chars(&item.source))))?;
    w.write_event(Event::End(BytesEnd::new("source")))?;

    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// Render the channel and its items as an RSS 2.0 document.
pub fn render_feed(
    meta: &FeedMetadata,
    items: &[FeedItem],
    built_at: DateTime<Utc>,
) -> Result<Vec<u8>, OutputError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &meta.title)?;
    write_text_element(&mut writer, "link", &meta.link)?;
    write_text_element(&mut writer, "description", &meta.description)?;
    if let Some(language) = &meta.language {
        write_text_element(&mut writer, "language", language)?;
    }
    if let Some(ttl) = meta.ttl {
        write_text_element(&mut writer, "ttl", &ttl.to_string())?;
    }
    write_text_element(&mut writer, "lastBuildDate", &rfc822(&built_at))?;
    write_text_element(&mut writer, "generator", GENERATOR)?;

    for item in items {
        write_item(&mut writer, item)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}

/// Render the feed and replace the file at `path` with it.
#[instrument(level = "info", skip_all, fields(path = %path.display(), items = items.len()))]
pub async fn write_feed(meta: &FeedMetadata, items: &[FeedItem], path: &Path) -> Result<(), OutputError> {
    let document = render_feed(meta, items, Utc::now())?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "feed.xml".to_string());
    let staging = path.with_file_name(format!(".{file_name}.tmp"));
    let io_err = |source| OutputError::Io {
        path: path.display().to_string(),
        source,
    };

    fs::write(&staging, &document).await.map_err(io_err)?;
    if let Err(e) = fs::rename(&staging, path).await {
        let _ = fs::remove_file(&staging).await;
        return Err(io_err(e));
    }

    info!(bytes = document.len(), "Wrote RSS feed");
    Ok(())
}
