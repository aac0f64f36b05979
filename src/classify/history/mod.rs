
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::LabelInput;
use crate::feeds::{HttpClient, clean_text, host_name};
use crate::store::{
    DocumentKind, DocumentStore, DocumentStoreExt, EnrichedDescription, EnrichmentDocument,
};

/// One visited page from a browsing-history export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub url: String,
}

/// `{items, totalCount, settings}` as exported by the extension
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryExport {
    #[serde(default)]
    pub items: Vec<HistoryItem>,
    #[serde(rename = "totalCount", alias = "total_count", default)]
    pub total_count: Option<usize>,
    #[serde(default)]
    pub settings: Value,
}

impl HistoryExport {
    #[inline]
    pub fn total_count(&self) -> usize {
        self.total_count.unwrap_or(self.items.len())
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Looks up a short description for a page
pub trait DescriptionSource: Send + Sync + std::fmt::Debug {
    fn describe(&self, url: &str) -> anyhow::Result<String>;
}

impl DescriptionSource for HttpClient {
    fn describe(&self, url: &str) -> anyhow::Result<String> {
        self.page_description(url)
    }
}

/// Builds the text each history item is embedded with
#[derive(Debug, Clone)]
pub struct HistoryEnricher {
    store: Arc<dyn DocumentStore>,
    describer: Arc<dyn DescriptionSource>,
    max_concurrency: usize,
}

impl HistoryEnricher {
    #[inline]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        describer: Arc<dyn DescriptionSource>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            describer,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Pair every item with its embedding text.
    ///
    /// Without deep parsing the text is `"{title}. Source: {host}"`. With it,
    /// each page's meta description is looked up (cached by URL across runs)
    /// and the text is the cleaned `"{title} {description} Source {host}"`.
    #[inline]
    pub async fn enrich(
        &self,
        items: &[HistoryItem],
        use_deep_parsing: bool,
    ) -> anyhow::Result<Vec<LabelInput>> {
        if !use_deep_parsing {
            debug!("Deep parsing disabled, embedding titles with their host");
            return Ok(items
                .iter()
                .map(|item| LabelInput {
                    title: item.title.clone(),
                    url: item.url.clone(),
                    embedding_text: format!("{}. Source: {}", item.title, host_or_empty(&item.url))
                        .trim()
                        .to_string(),
                })
                .collect());
        }

        let descriptions = self.descriptions(items).await?;

        Ok(items
            .iter()
            .map(|item| {
                let description = descriptions
                    .get(&item.url)
                    .map_or("", String::as_str);
                LabelInput {
                    title: item.title.clone(),
                    url: item.url.clone(),
                    embedding_text: clean_text(&format!(
                        "{} {} Source {}",
                        item.title,
                        description,
                        host_or_empty(&item.url)
                    )),
                }
            })
            .collect())
    }

    async fn descriptions(&self, items: &[HistoryItem]) -> anyhow::Result<HashMap<String, String>> {
        let mut document: EnrichmentDocument =
            self.store.load_or_default(DocumentKind::EnrichmentCache)?;
        let mut known: HashSet<String> = document
            .items
            .iter()
            .map(|entry| entry.url.clone())
            .collect();
        debug!("Loaded {} cached page descriptions", known.len());

        let to_fetch: Vec<String> = items
            .iter()
            .map(|item| item.url.clone())
            .filter(|url| !url.is_empty() && known.insert(url.clone()))
            .collect();

        if !to_fetch.is_empty() {
            info!(
                "Fetching descriptions for {} pages ({} at a time)",
                to_fetch.len(),
                self.max_concurrency
            );

            let mut fetched = stream::iter(to_fetch)
                .map(|url| {
                    let describer = Arc::clone(&self.describer);
                    async move {
                        let description = if url.starts_with("http://") || url.starts_with("https://") {
                            let fetch_url = url.clone();
                            match tokio::task::spawn_blocking(move || describer.describe(&fetch_url)).await {
                                Ok(Ok(description)) => description,
                                Ok(Err(e)) => {
                                    debug!("No description for {}: {:#}", url, e);
                                    String::new()
                                }
                                Err(e) => {
                                    debug!("Description worker failed for {}: {}", url, e);
                                    String::new()
                                }
                            }
                        } else {
                            String::new()
                        };
                        EnrichedDescription { url, description }
                    }
                })
                .buffer_unordered(self.max_concurrency);

            let total = known.len();
            while let Some(entry) = fetched.next().await {
                debug!("Described {}/{}: {}", document.items.len() + 1, total, entry.url);
                document.items.push(entry);
            }
        }

        document.updated_at = Utc::now().to_rfc3339();
        self.store
            .save_doc(DocumentKind::EnrichmentCache, &document)?;

        Ok(document
            .items
            .into_iter()
            .map(|entry| (entry.url, entry.description))
            .collect())
    }
}

// Full host minus `www.`; subdomains stay part of the source
fn host_or_empty(url: &str) -> String {
    host_name(url).unwrap_or_default()
}
