
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::EmbeddingProvider;
use crate::store::{DocumentKind, DocumentStore, DocumentStoreExt, EmbeddingCacheDocument};

/// Article title -> embedding, persisted as one flat document.
///
/// Entries are only ever inserted or dropped whole; the document is rewritten
/// in full whenever it changes.
#[derive(Debug)]
pub struct EmbeddingCache {
    store: Arc<dyn DocumentStore>,
    entries: EmbeddingCacheDocument,
}

impl EmbeddingCache {
    /// Read the persisted cache, starting empty when there is none
    #[inline]
    pub fn load(store: Arc<dyn DocumentStore>) -> Result<Self> {
        let entries: EmbeddingCacheDocument = store
            .load_or_default(DocumentKind::EmbeddingCache)
            .context("Failed to load embedding cache")?;
        debug!("Loaded {} cached embeddings", entries.len());
        Ok(Self { store, entries })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, title: &str) -> Option<&[f32]> {
        self.entries.get(title).map(Vec::as_slice)
    }

    #[inline]
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drop every entry whose title is not in `valid_titles`.
    /// Persists and returns the number removed when anything changed.
    #[inline]
    pub fn clean(&mut self, valid_titles: &HashSet<String>) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|title, _| valid_titles.contains(title));
        let removed = before - self.entries.len();

        if removed > 0 {
            info!(
                "Embedding cache cleaned: {} -> {} entries",
                before,
                self.entries.len()
            );
            self.persist()?;
        }

        Ok(removed)
    }

    /// Embed the titles that have no cached vector, in one provider call.
    ///
    /// `text_for` supplies the text embedded for a title. On provider failure
    /// the cache is left untouched. Returns the number of new entries.
    #[inline]
    pub fn fill<'a, I, F>(
        &mut self,
        titles: I,
        text_for: F,
        provider: &dyn EmbeddingProvider,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&str) -> String,
    {
        let mut seen = HashSet::new();
        let missing: Vec<&str> = titles
            .into_iter()
            .filter(|title| !self.entries.contains_key(*title) && seen.insert(*title))
            .collect();

        if missing.is_empty() {
            debug!("Embedding cache already covers every title");
            return Ok(0);
        }

        info!("Computing {} missing article embeddings", missing.len());
        let texts: Vec<String> = missing.iter().map(|title| text_for(title)).collect();
        let vectors = provider
            .embed_batch(&texts)
            .context("Failed to embed articles missing from the cache")?;

        if vectors.len() != missing.len() {
            return Err(anyhow::anyhow!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                missing.len()
            ));
        }

        let added = missing.len();
        self.entries.extend(
            missing
                .into_iter()
                .map(str::to_string)
                .zip(vectors),
        );
        self.persist()?;

        Ok(added)
    }

    fn persist(&self) -> Result<()> {
        self.store
            .save_doc(DocumentKind::EmbeddingCache, &self.entries)
            .context("Failed to persist embedding cache")
    }
}
