
use anyhow::{Context, Result, anyhow};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

use super::{FeedDocument, FeedEntry, FeedSource};
use crate::config::FetchConfig;

static META_DESCRIPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"], meta[name="Description"]"#)
        .expect("valid selector")
});

/// Blocking HTTP GET with a fixed timeout and user agent
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: Agent,
}

impl HttpClient {
    #[inline]
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .user_agent(user_agent)
            .build()
            .into();

        Self { agent }
    }

    /// Client for feed documents
    #[inline]
    pub fn for_feeds(config: &FetchConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_seconds),
            &config.user_agent,
        )
    }

    /// Client for history pages, with the shorter page timeout
    #[inline]
    pub fn for_pages(config: &FetchConfig) -> Self {
        Self::new(
            Duration::from_secs(config.page_timeout_seconds),
            &config.user_agent,
        )
    }

    #[inline]
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Making HTTP GET request to: {}", url);

        match self.agent.get(url).call() {
            Ok(mut response) => {
                let bytes = response
                    .body_mut()
                    .read_to_vec()
                    .with_context(|| format!("Failed to read response body from {}", url))?;
                debug!("Read {} bytes from {}", bytes.len(), url);
                Ok(bytes)
            }
            Err(ureq::Error::StatusCode(code)) => Err(anyhow!("HTTP error {} for {}", code, url)),
            Err(e) => Err(anyhow::Error::from(e))
                .with_context(|| format!("Failed to make HTTP request to {}", url)),
        }
    }

    #[inline]
    pub fn get_text(&self, url: &str) -> Result<String> {
        let bytes = self.get_bytes(url)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The page's `<meta name="description">` content, trimmed; empty when absent
    #[inline]
    pub fn page_description(&self, url: &str) -> Result<String> {
        let html = self.get_text(url)?;
        Ok(extract_meta_description(&html))
    }
}

#[inline]
pub fn extract_meta_description(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&META_DESCRIPTION_SELECTOR)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

/// RSS, Atom and JSON Feed documents fetched over HTTP
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: HttpClient,
}

impl HttpFeedSource {
    #[inline]
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            client: HttpClient::for_feeds(config),
        }
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self, url: &str) -> Result<FeedDocument> {
        let bytes = self.client.get_bytes(url)?;
        parse_feed(&bytes).with_context(|| format!("Failed to parse feed from {}", url))
    }
}

/// Decode a feed document into the source-independent shape
#[inline]
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument> {
    let feed = feed_rs::parser::parse(bytes).context("Unrecognized feed format")?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| FeedEntry {
            title: entry.title.map(|text| text.content),
            link: entry.links.into_iter().next().map(|link| link.href),
            summary: entry.summary.map(|text| text.content),
            description: None,
            content: entry.content.and_then(|content| content.body),
            // Atom entries often carry only <updated>
            published: entry.published.or(entry.updated),
        })
        .collect();

    Ok(FeedDocument {
        title: feed.title.map(|text| text.content),
        entries,
    })
}
