use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Article, ArticleDocument, DocumentKind, DocumentStore, DocumentStoreExt, SourceCount};
use crate::Result;

/// Sole writer of the merged article history
#[derive(Debug, Clone)]
pub struct ArticleStore {
    store: Arc<dyn DocumentStore>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Items offered to the merge
    pub fetched: usize,
    /// Items that were new and got appended
    pub added: usize,
    /// Size of the merged set afterwards
    pub total: usize,
}

impl ArticleStore {
    #[inline]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The persisted article set, empty when none has been written yet
    #[inline]
    pub fn load(&self) -> Result<ArticleDocument> {
        self.store.load_or_default(DocumentKind::Articles)
    }

    /// Append every item whose title is not already known and persist the union.
    ///
    /// Stored order is kept and new items follow in the order given. Items
    /// with a blank title are discarded, and duplicate titles inside `items`
    /// keep their first occurrence.
    #[inline]
    pub fn merge(&self, items: Vec<Article>) -> Result<MergeReport> {
        let mut document = self.load()?;
        let mut titles: HashSet<String> = document
            .data
            .iter()
            .map(|article| article.title.clone())
            .collect();

        let fetched = items.len();
        let before = document.data.len();
        for article in items {
            if article.title.trim().is_empty() {
                continue;
            }
            if titles.insert(article.title.clone()) {
                document.data.push(article);
            }
        }
        let added = document.data.len() - before;

        let document = self.persist(document)?;
        info!(
            "Merged {} fetched articles: {} new, {} total",
            fetched, added, document.total
        );

        Ok(MergeReport {
            fetched,
            added,
            total: document.total,
        })
    }

    /// Drop articles published before `cutoff`; undated articles stay.
    /// Returns how many were removed.
    #[inline]
    pub fn retain_recent(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.retain(|article| article.published.is_none_or(|published| published >= cutoff))
    }

    /// Drop articles whose source is no longer configured.
    /// Returns how many were removed.
    #[inline]
    pub fn retain_sources(&self, active_sources: &HashSet<String>) -> Result<usize> {
        self.retain(|article| active_sources.contains(&article.source))
    }

    fn retain(&self, keep: impl Fn(&Article) -> bool) -> Result<usize> {
        let Some(mut document) = self.store.load_doc::<ArticleDocument>(DocumentKind::Articles)?
        else {
            return Ok(0);
        };

        let before = document.data.len();
        document.data.retain(|article| keep(article));
        let removed = before - document.data.len();

        if removed == 0 {
            debug!("Retention pass removed nothing");
            return Ok(0);
        }

        let document = self.persist(document)?;
        info!(
            "Retention pass removed {} articles, {} remain",
            removed, document.total
        );
        Ok(removed)
    }

    fn persist(&self, mut document: ArticleDocument) -> Result<ArticleDocument> {
        document.total = document.data.len();
        document.feeds = source_counts(&document.data);
        document.updated = Utc::now().to_rfc3339();
        self.store.save_doc(DocumentKind::Articles, &document)?;
        Ok(document)
    }
}

/// Article count per source, in order of first appearance
#[inline]
pub fn source_counts(articles: &[Article]) -> Vec<SourceCount> {
    let counts = articles
        .iter()
        .map(|article| article.source.as_str())
        .counts();

    articles
        .iter()
        .map(|article| article.source.as_str())
        .unique()
        .map(|source| SourceCount {
            source: source.to_string(),
            count: counts.get(source).copied().unwrap_or_default(),
        })
        .collect()
}
