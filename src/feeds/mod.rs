// Feed ingestion module
// Concurrent fetching and normalization of feed sources into articles

pub mod http;
pub mod sanitize;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::store::Article;

pub use http::{HttpClient, HttpFeedSource};
pub use sanitize::{clean_html, clean_text, host_name};

/// One entry as delivered by a feed source, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// Retrieves one feed document; blocking, called from the blocking pool
pub trait FeedSource: Send + Sync + std::fmt::Debug {
    fn fetch(&self, url: &str) -> anyhow::Result<FeedDocument>;
}

/// Outcome for a single source in a fetch batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub url: String,
    pub source: String,
    pub items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchReport {
    /// Normalized articles from every source, in completion order
    #[serde(skip)]
    pub articles: Vec<Article>,
    pub sources: Vec<SourceReport>,
}

impl FetchReport {
    #[inline]
    pub fn failed(&self) -> usize {
        self.sources
            .iter()
            .filter(|source| source.error.is_some())
            .count()
    }
}

/// Fans fetches out over a bounded number of blocking workers
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    source: Arc<dyn FeedSource>,
    max_concurrency: usize,
    summary_max_chars: usize,
}

impl FeedFetcher {
    #[inline]
    pub fn new(source: Arc<dyn FeedSource>, max_concurrency: usize, summary_max_chars: usize) -> Self {
        Self {
            source,
            max_concurrency: max_concurrency.max(1),
            summary_max_chars,
        }
    }

    /// Fetch every URL and normalize the results.
    ///
    /// A failing source contributes no articles and is recorded in the
    /// report; it never fails the batch. `progress` advances once per source.
    #[inline]
    pub async fn fetch_all(
        &self,
        urls: &[String],
        cutoff: DateTime<Utc>,
        progress: &ProgressBar,
    ) -> FetchReport {
        info!(
            "Fetching {} feeds with up to {} concurrent requests",
            urls.len(),
            self.max_concurrency
        );
        progress.set_length(urls.len() as u64);

        let mut outcomes = stream::iter(urls.iter().cloned())
            .map(|url| {
                let source = Arc::clone(&self.source);
                async move {
                    let fetch_url = url.clone();
                    let result = tokio::task::spawn_blocking(move || source.fetch(&fetch_url))
                        .await
                        .map_err(|e| anyhow::anyhow!("Fetch worker failed: {}", e))
                        .and_then(|result| result);
                    (url, result)
                }
            })
            .buffer_unordered(self.max_concurrency);

        let mut report = FetchReport::default();
        while let Some((url, result)) = outcomes.next().await {
            progress.set_message(url.clone());
            progress.inc(1);

            match result {
                Ok(document) => {
                    let (source, articles) =
                        normalize_feed(&url, document, cutoff, self.summary_max_chars);
                    debug!("Fetched {} articles from {}", articles.len(), source);
                    report.sources.push(SourceReport {
                        url,
                        source,
                        items: articles.len(),
                        error: None,
                    });
                    report.articles.extend(articles);
                }
                Err(e) => {
                    warn!("Failed to fetch feed {}: {:#}", url, e);
                    report.sources.push(SourceReport {
                        source: source_name(None, &url),
                        url,
                        items: 0,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        progress.finish_and_clear();
        info!(
            "Fetched {} articles from {} feeds ({} failed)",
            report.articles.len(),
            report.sources.len(),
            report.failed()
        );
        report
    }
}

/// The feed's own title, or its host without `www.`, or the URL itself
#[inline]
pub fn source_name(feed_title: Option<&str>, url: &str) -> String {
    feed_title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .or_else(|| host_name(url))
        .unwrap_or_else(|| url.trim().to_string())
}

/// Turn one source's entries into articles.
///
/// Entries without a usable title and dated entries older than `cutoff` are
/// dropped first; of the rest, repeated titles keep their first occurrence.
/// Undated entries are kept.
#[inline]
pub fn normalize_feed(
    url: &str,
    document: FeedDocument,
    cutoff: DateTime<Utc>,
    summary_max_chars: usize,
) -> (String, Vec<Article>) {
    let source = source_name(document.title.as_deref(), url);
    let mut seen = HashSet::new();

    let articles = document
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.as_deref().map(str::trim).unwrap_or_default();
            if title.is_empty() || entry.published.is_some_and(|published| published < cutoff) {
                return None;
            }
            if !seen.insert(title.to_string()) {
                return None;
            }

            let raw_summary = [&entry.summary, &entry.description, &entry.content]
                .into_iter()
                .flatten()
                .find(|text| !text.trim().is_empty())
                .map_or("", String::as_str);

            Some(Article {
                title: title.to_string(),
                link: entry.link.as_deref().map(str::trim).unwrap_or_default().to_string(),
                summary: clean_html(raw_summary, summary_max_chars),
                published: entry.published,
                source: source.clone(),
            })
        })
        .collect();

    (source, articles)
}
