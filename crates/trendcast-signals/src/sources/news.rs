//! RSS news feeds feeding the ad hoc posting queue.

use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use trendcast_core::{NewNewsItem, NewsFeed};

use crate::error::SignalError;

const MAX_ITEMS_PER_FEED: usize = 20;

/// Fetches the configured RSS feeds.
pub struct NewsFeedSource {
    client: Client,
    feeds: Vec<NewsFeed>,
}

impl NewsFeedSource {
    /// # Errors
    ///
    /// Returns [`SignalError::Http`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout_secs: u64, feeds: Vec<NewsFeed>) -> Result<Self, SignalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, feeds })
    }

    #[must_use]
    pub fn feeds(&self) -> &[NewsFeed] {
        &self.feeds
    }

    /// Fetch one feed and parse its items.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Http`] on network failure or a non-2xx status,
    /// [`SignalError::Xml`] on malformed XML.
    pub async fn fetch_feed(&self, feed: &NewsFeed) -> Result<Vec<NewNewsItem>, SignalError> {
        let body = self
            .client
            .get(&feed.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_feed(&body, &feed.name)
    }

    /// Fetch every feed. Failing feeds are logged and skipped.
    pub async fn fetch_all(&self) -> Vec<NewNewsItem> {
        let mut items = Vec::new();
        for feed in &self.feeds {
            match self.fetch_feed(feed).await {
                Ok(feed_items) => {
                    tracing::debug!(feed = %feed.name, count = feed_items.len(), "fetched news feed");
                    items.extend(feed_items);
                }
                Err(e) => {
                    tracing::warn!(feed = %feed.name, error = %e, "news feed fetch failed");
                }
            }
        }
        items
    }
}

#[derive(Default)]
struct ItemFields {
    title: String,
    link: String,
    description: String,
    image_url: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

impl ItemFields {
    fn into_news_item(self, source: &str) -> Option<NewNewsItem> {
        if self.title.is_empty() || self.link.is_empty() {
            return None;
        }
        Some(NewNewsItem {
            title: self.title,
            description: self.description,
            url: self.link,
            source: source.to_string(),
            image_url: self.image_url,
            published_at: self.published_at,
        })
    }
}

/// Parse an RSS 2.0 document into news items attributed to `source`.
///
/// Items without a title or link are dropped. Descriptions have HTML
/// stripped; the image comes from an `enclosure` or `media:content` url.
///
/// # Errors
///
/// Returns [`SignalError::Xml`] if the XML is malformed.
pub fn parse_feed(xml: &str, source: &str) -> Result<Vec<NewNewsItem>, SignalError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<ItemFields> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = tag_name(&e);
                if name == "item" {
                    current = Some(ItemFields::default());
                } else if let Some(fields) = current.as_mut() {
                    take_image(fields, &name, &e);
                }
                current_tag = name;
            }
            Ok(Event::Empty(e)) => {
                if let Some(fields) = current.as_mut() {
                    take_image(fields, &tag_name(&e), &e);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current.take().and_then(|f| f.into_news_item(source)) {
                        items.push(item);
                        if items.len() >= MAX_ITEMS_PER_FEED {
                            break;
                        }
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Text(e)) => {
                if let Some(fields) = current.as_mut() {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    set_field(fields, &current_tag, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(fields) = current.as_mut() {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    set_field(fields, &current_tag, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SignalError::Xml(e)),
            _ => {}
        }
    }

    Ok(items)
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn set_field(fields: &mut ItemFields, tag: &str, text: &str) {
    match tag {
        "title" => fields.title = text.trim().to_string(),
        "link" => fields.link = text.trim().to_string(),
        "description" => {
            let stripped = strip_html(text);
            if !stripped.is_empty() {
                if !fields.description.is_empty() {
                    fields.description.push(' ');
                }
                fields.description.push_str(&stripped);
            }
        }
        "pubDate" => {
            fields.published_at = DateTime::parse_from_rfc2822(text.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
        _ => {}
    }
}

fn take_image(fields: &mut ItemFields, name: &str, e: &BytesStart<'_>) {
    if fields.image_url.is_some() || !matches!(name, "enclosure" | "media:content" | "media:thumbnail") {
        return;
    }
    if name == "enclosure" {
        let is_image = e
            .try_get_attribute("type")
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.starts_with("image/")))
            .unwrap_or(true);
        if !is_image {
            return;
        }
    }
    fields.image_url = e
        .try_get_attribute("url")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
        .filter(|v| !v.is_empty());
}

/// Strip HTML tags and collapse whitespace.
pub(crate) fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>BBC Sport - Football</title>
    <item>
      <title>Haaland scores twice in derby win</title>
      <link>https://www.bbc.co.uk/sport/football/1</link>
      <description><![CDATA[<p>Man City beat <b>United</b> 2-0.</p>]]></description>
      <pubDate>Sun, 01 Mar 2026 18:30:00 GMT</pubDate>
      <media:thumbnail width="240" height="135" url="https://ichef.example/1.jpg"/>
    </item>
    <item>
      <title>Transfer news &amp; gossip</title>
      <link>https://www.bbc.co.uk/sport/football/2</link>
      <enclosure url="https://cdn.example/podcast.mp3" type="audio/mpeg"/>
      <enclosure url="https://cdn.example/2.png" type="image/png"/>
    </item>
    <item>
      <title></title>
      <link>https://www.bbc.co.uk/sport/football/3</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_with_images_and_dates() {
        let items = parse_feed(SAMPLE_RSS, "BBC Sport").expect("should parse valid RSS");
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Haaland scores twice in derby win");
        assert_eq!(items[0].description, "Man City beat United 2-0.");
        assert_eq!(items[0].image_url.as_deref(), Some("https://ichef.example/1.jpg"));
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap())
        );
        assert_eq!(items[0].source, "BBC Sport");

        assert_eq!(items[1].title, "Transfer news & gossip");
        assert_eq!(items[1].image_url.as_deref(), Some("https://cdn.example/2.png"));
        assert_eq!(items[1].published_at, None);
    }

    #[test]
    fn empty_channel_yields_nothing() {
        let xml = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        assert!(parse_feed(xml, "x").expect("should parse").is_empty());
    }

    #[test]
    fn mismatched_tags_are_an_error() {
        let xml = "<rss><channel><item><title>Broken</link></item></channel></rss>";
        assert!(matches!(parse_feed(xml, "x"), Err(SignalError::Xml(_))));
    }

    #[test]
    fn strip_html_separates_block_text() {
        assert_eq!(strip_html("<p>One</p><p>Two</p>"), "One Two");
    }
}
