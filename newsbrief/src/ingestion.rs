use anyhow::Context;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use common::FetchConfig;

use crate::dates::entry_timestamp;
use crate::error::{soft_fail, NewsError, NewsResult};
use crate::model::NewsItem;
use crate::sanitize::{first_publisher_href, strip_html};

/// Title given to entries that arrive without one.
pub const NO_TITLE: &str = "(no title)";

/// One feed entry before sanitization; string fields hold raw (possibly HTML) text.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub created: Option<String>,
    pub published_parsed: Option<DateTime<Utc>>,
    pub updated_parsed: Option<DateTime<Utc>>,
}

/// Entries recovered from a feed body plus the error that stopped the scan, if any.
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub entries: Vec<RawEntry>,
    pub error: Option<String>,
}

/// Retrieves RSS/Atom feeds and turns them into [`NewsItem`]s.
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
    entry_cap: usize,
    probe: bool,
    aggregator_hosts: Vec<String>,
}

impl FeedFetcher {
    pub fn new(cfg: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("failed to build feed client")?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: Client, cfg: &FetchConfig) -> Self {
        Self {
            client,
            entry_cap: cfg.entry_cap,
            probe: cfg.probe,
            aggregator_hosts: cfg.aggregator_hosts.clone(),
        }
    }

    /// Fetch and parse `url`. Never fails: network errors give an empty list,
    /// malformed XML gives whatever entries were recovered.
    pub async fn fetch(&self, url: &str) -> Vec<NewsItem> {
        if self.probe {
            self.probe(url).await;
        }

        let body = soft_fail(self.get_body(url).await.map(Some), None, "feed fetch");
        let Some(body) = body else {
            return Vec::new();
        };

        let parsed = parse_feed(&body);
        if let Some(err) = &parsed.error {
            warn!(url = %url, error = %err, recovered = parsed.entries.len(), "malformed feed, keeping recovered entries");
        }

        let items: Vec<NewsItem> = parsed
            .entries
            .iter()
            .take(self.entry_cap)
            .map(|e| to_news_item(e, &self.aggregator_hosts))
            .collect();
        info!(url = %url, items = items.len(), "fetched feed");
        items
    }

    // Some providers answer HEAD oddly; the result is only logged.
    async fn probe(&self, url: &str) {
        match self.client.head(url).send().await {
            Ok(resp) => debug!(url = %url, status = %resp.status(), "feed probe"),
            Err(e) => debug!(url = %url, error = %e, "feed probe failed, ignoring"),
        }
    }

    async fn get_body(&self, url: &str) -> NewsResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8",
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Sanitize one raw entry. The first publisher anchor in the summary wins
/// over the entry's own link.
pub fn to_news_item(entry: &RawEntry, aggregator_hosts: &[String]) -> NewsItem {
    let title = strip_html(entry.title.as_deref().unwrap_or_default());
    let raw_summary = entry.summary.as_deref().unwrap_or_default();
    let link = first_publisher_href(raw_summary, aggregator_hosts)
        .or_else(|| entry.link.clone())
        .filter(|l| !l.trim().is_empty());

    let title = if title.is_empty() { NO_TITLE.to_string() } else { title };
    NewsItem::new(title, link)
        .with_summary(strip_html(raw_summary))
        .with_source(strip_html(entry.source.as_deref().unwrap_or_default()))
        .with_published_at(entry_timestamp(entry))
}

/// Parse a feed body with `feed-rs`. Bodies it rejects go through the lenient
/// scanner, which keeps the entries before the first XML error.
pub fn parse_feed(body: &[u8]) -> ParsedFeed {
    let feed = match feed_rs::parser::parse(body) {
        Ok(feed) => feed,
        Err(e) => {
            debug!(error = %e, "feed-rs rejected body, scanning leniently");
            return scan_entries(body);
        }
    };

    // feed-rs drops RSS <source> and unparseable date strings; take those from
    // the scan when both parsers agree on the entry count.
    let scanned = scan_entries(body).entries;
    let extras = (scanned.len() == feed.entries.len()).then_some(scanned);
    let entries = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| from_feed_rs(entry, extras.as_ref().and_then(|e| e.get(idx))))
        .collect();
    ParsedFeed { entries, error: None }
}

fn from_feed_rs(entry: feed_rs::model::Entry, scanned: Option<&RawEntry>) -> RawEntry {
    let scanned = scanned.cloned().unwrap_or_default();
    RawEntry {
        title: entry.title.map(|t| t.content),
        link: alternate_link(&entry.links),
        summary: entry
            .summary
            .map(|s| s.content)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| entry.content.and_then(|c| c.body)),
        source: scanned.source,
        published: scanned.published,
        updated: scanned.updated,
        created: scanned.created,
        published_parsed: entry.published,
        updated_parsed: entry.updated,
    }
}

/// First link with no `rel` or `rel="alternate"`, else the first non-empty link.
fn alternate_link(links: &[feed_rs::model::Link]) -> Option<String> {
    let usable = || links.iter().filter(|l| !l.href.trim().is_empty());
    usable()
        .find(|l| l.rel.as_deref().map_or(true, |r| r.eq_ignore_ascii_case("alternate")))
        .or_else(|| usable().next())
        .map(|l| l.href.clone())
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Summary,
    Content,
    Source,
    Published,
    Updated,
    Created,
}

fn field_for(name: &[u8]) -> Option<Field> {
    Some(match name {
        b"title" => Field::Title,
        b"link" => Field::Link,
        b"description" | b"summary" => Field::Summary,
        b"content" | b"encoded" => Field::Content,
        b"source" => Field::Source,
        b"pubDate" | b"published" | b"issued" => Field::Published,
        b"updated" | b"modified" => Field::Updated,
        b"created" | b"date" => Field::Created,
        _ => return None,
    })
}

fn is_entry(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

fn atom_href(tag: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut alternate = true;
    for attr in tag.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(decode_text(&attr.value)),
            b"rel" => alternate = attr.value.as_ref() == b"alternate",
            _ => {}
        }
    }
    href.filter(|_| alternate)
}

fn decode_text(raw: &[u8]) -> String {
    html_escape::decode_html_entities(&String::from_utf8_lossy(raw)).into_owned()
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() && !value.trim().is_empty() {
        *slot = Some(value);
    }
}

/// Event-driven scan over `<item>`/`<entry>` elements that survives broken
/// markup by stopping at the first XML error and keeping what it has.
fn scan_entries(body: &[u8]) -> ParsedFeed {
    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut out = ParsedFeed::default();
    let mut current: Option<RawEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                out.error = Some(format!("at byte {}: {}", reader.buffer_position(), e));
                break;
            }
        };

        match event {
            Event::Start(tag) => {
                let name = tag.local_name();
                if is_entry(name.as_ref()) {
                    current = Some(RawEntry::default());
                } else if let Some(entry) = current.as_mut() {
                    field = field_for(name.as_ref());
                    text.clear();
                    if field == Some(Field::Link) {
                        if let Some(href) = atom_href(&tag) {
                            set_once(&mut entry.link, href);
                        }
                    }
                }
            }
            Event::Empty(tag) => {
                if let Some(entry) = current.as_mut() {
                    if tag.local_name().as_ref() == b"link" {
                        if let Some(href) = atom_href(&tag) {
                            set_once(&mut entry.link, href);
                        }
                    }
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&decode_text(&t.into_inner()));
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(tag) => {
                let name = tag.local_name();
                if is_entry(name.as_ref()) {
                    if let Some(entry) = current.take() {
                        out.entries.push(entry);
                    }
                    field = None;
                } else if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    if field_for(name.as_ref()) == Some(f) {
                        let value = std::mem::take(&mut text).trim().to_string();
                        let slot = match f {
                            Field::Title => &mut entry.title,
                            Field::Link => &mut entry.link,
                            Field::Summary | Field::Content => &mut entry.summary,
                            Field::Source => &mut entry.source,
                            Field::Published => &mut entry.published,
                            Field::Updated => &mut entry.updated,
                            Field::Created => &mut entry.created,
                        };
                        set_once(slot, value);
                        field = None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> Vec<String> {
        vec!["news.google.com".to_string()]
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Search</title>
<item>
  <title>Nvidia beats &amp; raises</title>
  <link>https://news.google.com/rss/articles/abc</link>
  <description>&lt;a href="https://news.google.com/rss/articles/abc"&gt;Nvidia beats&lt;/a&gt;&amp;nbsp;&lt;a href="https://www.reuters.com/tech/nvidia"&gt;Reuters&lt;/a&gt;</description>
  <pubDate>Tue, 19 Nov 2024 21:05:00 GMT</pubDate>
  <source url="https://www.reuters.com">Reuters</source>
</item>
<item>
  <title><![CDATA[<b>Chip stocks</b> slide]]></title>
  <link>https://www.cnbc.com/chips</link>
  <description>Plain summary</description>
</item>
</channel></rss>"#;

    #[test]
    fn parses_rss_items() {
        let parsed = parse_feed(RSS.as_bytes());
        assert!(parsed.error.is_none());
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].source.as_deref(), Some("Reuters"));
        assert_eq!(parsed.entries[0].published.as_deref(), Some("Tue, 19 Nov 2024 21:05:00 GMT"));

        let items: Vec<NewsItem> = parsed.entries.iter().map(|e| to_news_item(e, &google())).collect();
        assert_eq!(items[0].title, "Nvidia beats & raises");
        assert_eq!(items[0].link.as_deref(), Some("https://www.reuters.com/tech/nvidia"));
        assert_eq!(items[0].domain, "www.reuters.com");
        assert_eq!(items[0].summary, "Nvidia beats Reuters");
        assert!(items[0].published_at.is_some());

        assert_eq!(items[1].title, "Chip stocks slide");
        assert_eq!(items[1].link.as_deref(), Some("https://www.cnbc.com/chips"));
        assert_eq!(items[1].published_at, None);
    }

    #[test]
    fn parses_atom_entries() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Atom story</title>
    <link rel="self" href="https://example.com/self"/>
    <link rel="alternate" href="https://example.com/story"/>
    <summary>Body</summary>
    <updated>2024-11-19T10:00:00Z</updated>
  </entry>
</feed>"#;
        let parsed = parse_feed(atom.as_bytes());
        assert_eq!(parsed.entries.len(), 1);
        let item = to_news_item(&parsed.entries[0], &google());
        assert_eq!(item.link.as_deref(), Some("https://example.com/story"));
        assert!(item.published_at.is_some());
    }

    #[test]
    fn atom_xhtml_content_is_kept() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Filings</title>
  <entry>
    <title type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">Quarterly <b>report</b></div></title>
    <link href="https://example.com/q3"/>
    <id>urn:q3</id>
    <updated>2024-11-19T10:00:00Z</updated>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Body text</p></div></content>
  </entry>
</feed>"#;
        let parsed = parse_feed(atom.as_bytes());
        assert!(parsed.error.is_none());
        assert_eq!(parsed.entries.len(), 1);

        let item = to_news_item(&parsed.entries[0], &google());
        assert_eq!(item.title, "Quarterly report");
        assert_eq!(item.summary, "Body text");
        assert_eq!(item.link.as_deref(), Some("https://example.com/q3"));
    }

    #[test]
    fn parsed_dates_used_without_scanned_strings() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>t</title>
  <entry>
    <title>Only parsed</title>
    <id>urn:1</id>
    <link href="https://example.com/1"/>
    <updated>2024-11-19T10:00:00Z</updated>
  </entry>
</feed>"#;
        let feed = feed_rs::parser::parse(atom.as_bytes()).expect("valid atom");
        let entry = feed.entries.into_iter().next().expect("one entry");
        let raw = from_feed_rs(entry, None);
        assert!(raw.updated.is_none());

        let when = to_news_item(&raw, &google()).published_at.expect("parsed date");
        assert_eq!(when.to_rfc3339(), "2024-11-19T10:00:00+00:00");
    }

    #[test]
    fn truncated_feed_keeps_complete_entries() {
        let broken = r#"<rss><channel>
<item><title>First</title><link>https://a.com/1</link></item>
<item><title>Second</title><link>https://a.com/2</link></item>
<item><title>Third</title></bogus></item>"#;
        let parsed = parse_feed(broken.as_bytes());
        assert!(parsed.error.is_some());
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[1].title.as_deref(), Some("Second"));
    }

    #[test]
    fn empty_title_becomes_placeholder() {
        let entry = RawEntry {
            title: Some("  ".into()),
            link: Some("https://a.com/x".into()),
            ..RawEntry::default()
        };
        assert_eq!(to_news_item(&entry, &google()).title, "(no title)");
    }

    #[test]
    fn garbage_yields_nothing() {
        let parsed = parse_feed(b"this is not a feed");
        assert!(parsed.entries.is_empty());
    }
}
