use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::Pipeline;
use crate::classify::history::DescriptionSource;
use crate::classify::{Taxonomy, TaxonomyEntry};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::fake::KeywordEmbedder;
use crate::feeds::{FeedDocument, FeedEntry, FeedSource};
use crate::store::DocumentStore;

pub const RUST_FEED: &str = "https://rust.example/feed.xml";
pub const SPORTS_FEED: &str = "https://www.sports.example/rss";

/// Feed source serving canned documents; unknown URLs fail
#[derive(Debug, Default)]
pub struct StaticFeeds {
    documents: Mutex<HashMap<String, FeedDocument>>,
}

impl StaticFeeds {
    pub fn insert(&self, url: &str, document: FeedDocument) {
        self.documents
            .lock()
            .expect("should lock feeds")
            .insert(url.to_string(), document);
    }
}

impl FeedSource for StaticFeeds {
    fn fetch(&self, url: &str) -> anyhow::Result<FeedDocument> {
        self.documents
            .lock()
            .expect("should lock feeds")
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

#[derive(Debug)]
pub struct NoDescriptions;

impl DescriptionSource for NoDescriptions {
    fn describe(&self, _url: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

pub fn days_ago(days: i64) -> Option<DateTime<Utc>> {
    Some(Utc::now() - Duration::days(days))
}

pub fn feed(title: Option<&str>, entries: &[(&str, Option<DateTime<Utc>>)]) -> FeedDocument {
    FeedDocument {
        title: title.map(str::to_string),
        entries: entries
            .iter()
            .map(|(title, published)| FeedEntry {
                title: Some((*title).to_string()),
                link: Some(format!(
                    "https://news.example/{}",
                    title.to_lowercase().replace(' ', "-")
                )),
                summary: Some(format!("<p>{title} summary</p>")),
                published: *published,
                ..FeedEntry::default()
            })
            .collect(),
    }
}

/// Rust Weekly (titled) and a sports feed without a title
pub fn standard_feeds() -> Arc<StaticFeeds> {
    let feeds = Arc::new(StaticFeeds::default());
    feeds.insert(
        RUST_FEED,
        feed(
            Some("Rust Weekly"),
            &[
                ("Rust 2024 edition", days_ago(1)),
                ("Rust old news", days_ago(20)),
            ],
        ),
    );
    feeds.insert(SPORTS_FEED, feed(None, &[("Football final", days_ago(1))]));
    feeds
}

pub fn embedder() -> Arc<KeywordEmbedder> {
    Arc::new(KeywordEmbedder::new(&["rust", "football", "cooking"]))
}

pub fn taxonomy(embedder: &KeywordEmbedder) -> Taxonomy {
    Taxonomy::new(
        ["Tech > Rust", "Sports > Football", "Food > Cooking"]
            .into_iter()
            .zip(["rust", "football", "cooking"])
            .map(|(path, keyword)| TaxonomyEntry {
                path: path.to_string(),
                embedding: embedder.vector(keyword),
            })
            .collect(),
    )
}

pub fn pipeline(
    store: &Arc<dyn DocumentStore>,
    embedder: &Arc<KeywordEmbedder>,
    feeds: &Arc<StaticFeeds>,
) -> Pipeline {
    let config = Config {
        base_dir: PathBuf::new(),
        ..Config::default()
    };
    Pipeline::new(
        config,
        Arc::clone(store),
        Arc::clone(embedder) as Arc<dyn EmbeddingProvider>,
        Arc::clone(feeds) as Arc<dyn FeedSource>,
        Arc::new(NoDescriptions),
    )
    .with_taxonomy(taxonomy(embedder))
}
