// Document storage module
// Flat JSON documents addressed by kind, behind a small load/save interface

pub mod articles;
pub mod documents;
pub mod json;
pub mod memory;

#[cfg(test)]
mod tests;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::{LensError, Result};

pub use articles::{ArticleStore, MergeReport};
pub use documents::{
    Article, ArticleDocument, ClassificationDocument, ClassificationResult, EmbeddingCacheDocument,
    EnrichedDescription, EnrichmentDocument, InterestEntry, InterestSummaryDocument, LabelScore,
    RecommendationDocument, RecommendationResult, RecommendedArticle, SourceCount,
};
pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Every document the pipeline persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    Articles,
    EmbeddingCache,
    Recommendations,
    FeedSettings,
    ClassificationDetail,
    LastInterestSummary,
    CustomInterestSummary,
    EnrichmentCache,
}

impl DocumentKind {
    pub const ALL: [Self; 8] = [
        Self::Articles,
        Self::EmbeddingCache,
        Self::Recommendations,
        Self::FeedSettings,
        Self::ClassificationDetail,
        Self::LastInterestSummary,
        Self::CustomInterestSummary,
        Self::EnrichmentCache,
    ];

    /// Location relative to the data directory
    #[inline]
    pub const fn relative_path(self) -> &'static str {
        match self {
            Self::Articles => "rss/rss_summary.json",
            Self::EmbeddingCache => "rss/rss_embedding_cache.json",
            Self::Recommendations => "rss/rss_recommend.json",
            Self::FeedSettings => "rss/rss_setting/rss_settings.json",
            Self::ClassificationDetail => "history_compare/embedding_analysis.json",
            Self::LastInterestSummary => "history_compare/last_analysis_result.json",
            Self::CustomInterestSummary => "history_compare/custom_analysis_result.json",
            Self::EnrichmentCache => "history_compare/history_enriched.json",
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Articles => "articles",
            Self::EmbeddingCache => "embedding cache",
            Self::Recommendations => "recommendations",
            Self::FeedSettings => "feed settings",
            Self::ClassificationDetail => "classification detail",
            Self::LastInterestSummary => "last interest summary",
            Self::CustomInterestSummary => "custom interest summary",
            Self::EnrichmentCache => "enrichment cache",
        }
    }

    /// Derived feed data that a cache reset discards; settings are never included
    #[inline]
    pub const fn is_feed_cache(self) -> bool {
        matches!(
            self,
            Self::Articles | Self::EmbeddingCache | Self::Recommendations
        )
    }

    /// Large numeric documents are written compactly
    #[inline]
    pub const fn is_compact(self) -> bool {
        matches!(self, Self::EmbeddingCache)
    }
}

impl std::fmt::Display for DocumentKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whole-document persistence keyed by [`DocumentKind`].
///
/// `load` returns `Ok(None)` for documents that do not exist or cannot be
/// parsed; only genuine I/O failures are errors. `save` replaces the whole
/// document.
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    fn load(&self, kind: DocumentKind) -> Result<Option<Value>>;

    fn save(&self, kind: DocumentKind, document: &Value) -> Result<()>;

    /// Delete a document, reporting whether it existed
    fn remove(&self, kind: DocumentKind) -> Result<bool>;

    /// Size in bytes of the stored form, if the document exists
    fn stored_size(&self, kind: DocumentKind) -> Result<Option<u64>>;
}

/// Typed helpers over any [`DocumentStore`]
pub trait DocumentStoreExt: DocumentStore {
    /// Load and decode a document; a shape mismatch is logged and treated as missing
    #[inline]
    fn load_doc<T: DeserializeOwned>(&self, kind: DocumentKind) -> Result<Option<T>> {
        let Some(value) = self.load(kind)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                warn!("Ignoring malformed {} document: {}", kind, e);
                Ok(None)
            }
        }
    }

    #[inline]
    fn load_or_default<T: DeserializeOwned + Default>(&self, kind: DocumentKind) -> Result<T> {
        Ok(self.load_doc(kind)?.unwrap_or_default())
    }

    #[inline]
    fn save_doc<T: Serialize>(&self, kind: DocumentKind, document: &T) -> Result<()> {
        let value = serde_json::to_value(document).map_err(|e| {
            LensError::Storage(format!("Failed to encode {} document: {}", kind, e))
        })?;
        self.save(kind, &value)
    }

    #[inline]
    fn exists(&self, kind: DocumentKind) -> Result<bool> {
        Ok(self.stored_size(kind)?.is_some())
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
