// Pipeline module
// Fetch, classification and recommendation runs over the persisted documents

#[cfg(test)]
pub(crate) mod fakes;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::classify::history::DescriptionSource;
use crate::classify::{
    ClassificationSettings, HistoryEnricher, HistoryExport, HistoryItem, Taxonomy,
    aggregate_interests, classify_items,
};
use crate::config::{Config, DEFAULT_FEEDS, FeedSettings};
use crate::embeddings::{EmbeddingCache, EmbeddingProvider, OllamaClient};
use crate::feeds::{
    FeedFetcher, FeedSource, FetchReport, HttpClient, HttpFeedSource, SourceReport, source_name,
};
use crate::recommend::{Candidate, allocate, recommend};
use crate::scheduler::UpdateJob;
use crate::store::{
    ArticleDocument, ArticleStore, ClassificationDocument, DocumentKind, DocumentStore,
    DocumentStoreExt, InterestEntry, InterestSummaryDocument, JsonFileStore, MergeReport,
    RecommendationDocument,
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchSummary {
    /// False when the feed settings disabled fetching
    pub enabled: bool,
    pub sources: Vec<SourceReport>,
    pub merge: MergeReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisReport {
    Skipped {
        reason: String,
    },
    Updated {
        labels: usize,
        recommended: usize,
        embedded: usize,
    },
}

impl AnalysisReport {
    fn skipped(reason: &str) -> Self {
        info!("Skipping recommendation analysis: {}", reason);
        Self::Skipped {
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub fetch: FetchSummary,
    pub analysis: AnalysisReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// History items left after the site blacklist
    #[serde(rename = "totalAnalyzed")]
    pub total_analyzed: usize,
    pub summary: Vec<InterestEntry>,
    /// Present when no article history existed and a fetch was run first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchSummary>,
    pub analysis: AnalysisReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsReport {
    pub expired: usize,
    pub removed_by_source: usize,
    pub update_interval_hours: f64,
    pub analysis: AnalysisReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub exists: bool,
    pub total_articles: usize,
    pub file_size_mb: f64,
    pub updated_at: Option<String>,
}

/// Owns the collaborators of every run and serializes all document writers.
///
/// Each public run takes the writer lock for its whole duration, so a
/// scheduled refresh and an explicit command never interleave their writes.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn EmbeddingProvider>,
    feeds: Arc<dyn FeedSource>,
    describer: Arc<dyn DescriptionSource>,
    taxonomy: OnceLock<Arc<Taxonomy>>,
    writer: Mutex<()>,
}

impl Pipeline {
    #[inline]
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn EmbeddingProvider>,
        feeds: Arc<dyn FeedSource>,
        describer: Arc<dyn DescriptionSource>,
    ) -> Self {
        Self {
            config,
            store,
            provider,
            feeds,
            describer,
            taxonomy: OnceLock::new(),
            writer: Mutex::new(()),
        }
    }

    /// Production wiring: JSON documents under the data dir, Ollama, HTTP feeds
    #[inline]
    pub fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(config.data_dir()));
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(
            OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?,
        );
        let feeds: Arc<dyn FeedSource> = Arc::new(HttpFeedSource::new(&config.fetch));
        let describer: Arc<dyn DescriptionSource> = Arc::new(HttpClient::for_pages(&config.fetch));

        Ok(Self::new(config, store, provider, feeds, describer))
    }

    /// Use an already loaded taxonomy instead of reading the configured file
    #[inline]
    #[must_use]
    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = OnceLock::from(Arc::new(taxonomy));
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[inline]
    pub fn feed_settings(&self) -> Result<FeedSettings> {
        Ok(self.store.load_or_default(DocumentKind::FeedSettings)?)
    }

    #[inline]
    pub fn latest_recommendations(&self) -> Result<Option<RecommendationDocument>> {
        Ok(self.store.load_doc(DocumentKind::Recommendations)?)
    }

    /// Turn fetching on and fill in the default feeds when none are configured
    #[inline]
    pub async fn enable_feeds(&self) -> Result<FeedSettings> {
        let _guard = self.writer.lock().await;
        let mut settings = self.feed_settings()?;
        settings.enabled = true;
        if settings.feeds.is_empty() {
            settings.feeds = DEFAULT_FEEDS.iter().map(|feed| (*feed).to_string()).collect();
        }
        self.store
            .save_doc(DocumentKind::FeedSettings, &settings)
            .context("Failed to save feed settings")?;
        debug!("Feed settings patched: {} feeds enabled", settings.feeds.len());
        Ok(settings)
    }

    #[inline]
    pub async fn fetch_articles(&self) -> Result<FetchSummary> {
        let _guard = self.writer.lock().await;
        self.fetch_locked().await
    }

    #[inline]
    pub async fn analyze_recommendations(&self) -> Result<AnalysisReport> {
        let _guard = self.writer.lock().await;
        self.analyze_locked().await
    }

    /// Fetch every configured feed, then recompute recommendations
    #[inline]
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let _guard = self.writer.lock().await;
        let fetch = self.fetch_locked().await?;
        let analysis = self.analyze_locked().await?;
        Ok(RefreshReport { fetch, analysis })
    }

    /// Label a browsing-history export and derive the user's interest summary.
    ///
    /// Settings are resolved field by field from `request_settings`, then the
    /// export's own settings, then the configured defaults. The summary is
    /// written both as the last and as the custom summary, replacing any user
    /// edits. Recommendations are recomputed afterwards, fetching first when
    /// no article history exists yet.
    #[inline]
    pub async fn run_classification(
        &self,
        export: &HistoryExport,
        request_settings: &Value,
    ) -> Result<ClassificationReport> {
        let _guard = self.writer.lock().await;

        let settings = ClassificationSettings::resolve(
            &[request_settings, &export.settings],
            &self.config.classification,
        );
        let items: Vec<HistoryItem> = export
            .items
            .iter()
            .filter(|item| !settings.is_blacklisted(&item.url))
            .cloned()
            .collect();
        info!(
            "Classifying {} of {} history items (top {}, threshold {}, granularity {})",
            items.len(),
            export.items.len(),
            settings.top_n,
            settings.threshold,
            settings.granularity_level
        );

        let taxonomy = self.taxonomy()?;
        let enricher = HistoryEnricher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.describer),
            self.config.fetch.max_concurrency,
        );
        let inputs = enricher
            .enrich(&items, settings.use_deep_parsing)
            .await
            .context("Failed to build embedding texts for history items")?;

        let provider = Arc::clone(&self.provider);
        let run_settings = settings.clone();
        let results = tokio::task::spawn_blocking(move || {
            classify_items(&inputs, &taxonomy, provider.as_ref(), &run_settings)
        })
        .await
        .context("Classification worker failed")?
        .context("Failed to classify history items")?;

        let summary = aggregate_interests(
            &results,
            settings.granularity_level,
            settings.threshold,
            settings.sampling_count,
        );

        let detail = ClassificationDocument {
            analyzed_count: results.len(),
            results,
            settings: settings.clone(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        self.store
            .save_doc(DocumentKind::ClassificationDetail, &detail)
            .context("Failed to save classification detail")?;

        let summary_document = InterestSummaryDocument {
            total_count: export.total_count(),
            settings,
            total_analyzed: summary.len(),
            summary,
        };
        for kind in [
            DocumentKind::LastInterestSummary,
            DocumentKind::CustomInterestSummary,
        ] {
            self.store
                .save_doc(kind, &summary_document)
                .with_context(|| format!("Failed to save {}", kind))?;
        }
        info!(
            "Derived {} interest labels from {} labelled items",
            summary_document.summary.len(),
            detail.analyzed_count
        );

        let fetch = if self.store.exists(DocumentKind::Articles)? {
            debug!("Article history present, skipping fetch");
            None
        } else {
            info!("No article history yet, fetching feeds first");
            Some(self.fetch_locked().await?)
        };
        let analysis = self.analyze_locked().await?;

        Ok(ClassificationReport {
            total_analyzed: items.len(),
            summary: summary_document.summary,
            fetch,
            analysis,
        })
    }

    /// Replace the user-edited interest summary and recompute recommendations
    #[inline]
    pub async fn save_interest_summary(&self, document: &Value) -> Result<AnalysisReport> {
        let summary: InterestSummaryDocument = serde_json::from_value(document.clone())
            .context("Interest summary document has an unexpected shape")?;

        let _guard = self.writer.lock().await;
        self.store
            .save_doc(DocumentKind::CustomInterestSummary, &summary)
            .context("Failed to save custom interest summary")?;
        info!("Saved custom interest summary with {} labels", summary.summary.len());

        self.analyze_locked().await
    }

    /// Store new feed settings and bring the article history in line with them.
    ///
    /// Articles older than `historyDays` are dropped, then articles whose
    /// source no longer matches any configured feed, and recommendations are
    /// recomputed. The caller decides what to do with the returned interval.
    #[inline]
    pub async fn apply_settings(&self, document: &Value) -> Result<SettingsReport> {
        let settings = FeedSettings::from_value(document);

        let _guard = self.writer.lock().await;
        self.store
            .save_doc(DocumentKind::FeedSettings, &settings)
            .context("Failed to save feed settings")?;
        info!(
            "Feed settings saved: {} feeds, {} days of history, every {}h",
            settings.feeds.len(),
            settings.history_days,
            settings.update_interval_hours
        );

        let articles = ArticleStore::new(Arc::clone(&self.store));
        let expired = articles
            .retain_recent(settings.cutoff(Utc::now()))
            .context("Failed to drop expired articles")?;

        let removed_by_source = if articles.load()?.data.is_empty() {
            debug!("No articles to check for removed sources");
            0
        } else {
            let active = self.active_sources(&settings.effective_feeds()).await;
            articles
                .retain_sources(&active)
                .context("Failed to drop articles from removed sources")?
        };

        let analysis = self.analyze_locked().await?;

        Ok(SettingsReport {
            expired,
            removed_by_source,
            update_interval_hours: settings.update_interval_hours,
            analysis,
        })
    }

    /// Delete the article history, embedding cache and recommendations.
    /// Feed settings and the analysis documents are kept.
    #[inline]
    pub async fn clear_caches(&self) -> Result<Vec<String>> {
        let _guard = self.writer.lock().await;
        let mut deleted = Vec::new();
        for kind in DocumentKind::ALL.into_iter().filter(|kind| kind.is_feed_cache()) {
            if self
                .store
                .remove(kind)
                .with_context(|| format!("Failed to delete {}", kind))?
            {
                deleted.push(kind.relative_path().to_string());
            }
        }
        info!("Deleted {} cached documents: {:?}", deleted.len(), deleted);
        Ok(deleted)
    }

    #[inline]
    pub fn status(&self) -> Result<StoreStatus> {
        let mut total_bytes = 0_u64;
        for kind in DocumentKind::ALL
            .into_iter()
            .filter(|kind| kind.is_feed_cache() || *kind == DocumentKind::FeedSettings)
        {
            total_bytes += self.store.stored_size(kind)?.unwrap_or(0);
        }
        let file_size_mb = (total_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0;

        if !self.store.exists(DocumentKind::Articles)? {
            return Ok(StoreStatus {
                exists: false,
                total_articles: 0,
                file_size_mb,
                updated_at: None,
            });
        }

        let document: Option<ArticleDocument> = self.store.load_doc(DocumentKind::Articles)?;
        let (total_articles, updated_at) = document.map_or((0, None), |document| {
            let total = if document.total > 0 {
                document.total
            } else {
                document.data.len()
            };
            let updated = (!document.updated.is_empty()).then_some(document.updated);
            (total, updated)
        });

        Ok(StoreStatus {
            exists: true,
            total_articles,
            file_size_mb,
            updated_at,
        })
    }

    fn taxonomy(&self) -> Result<Arc<Taxonomy>> {
        if let Some(taxonomy) = self.taxonomy.get() {
            return Ok(Arc::clone(taxonomy));
        }

        let path = self.config.taxonomy_path();
        let loaded = Arc::new(
            Taxonomy::load(&path)
                .with_context(|| format!("Failed to load taxonomy from {}", path.display()))?,
        );
        info!("Loaded {} taxonomy labels", loaded.len());
        Ok(Arc::clone(self.taxonomy.get_or_init(|| loaded)))
    }

    async fn fetch_locked(&self) -> Result<FetchSummary> {
        let settings = self.feed_settings()?;
        if !settings.enabled {
            info!("Feed fetching is disabled in the settings, skipping");
            return Ok(FetchSummary::default());
        }

        let fetcher = FeedFetcher::new(
            Arc::clone(&self.feeds),
            self.config.fetch.max_concurrency,
            self.config.fetch.summary_max_chars,
        );
        let progress = fetch_progress_bar();
        let FetchReport { articles, sources } = fetcher
            .fetch_all(&settings.effective_feeds(), settings.cutoff(Utc::now()), &progress)
            .await;

        let merge = ArticleStore::new(Arc::clone(&self.store))
            .merge(articles)
            .context("Failed to merge fetched articles")?;
        info!(
            "Merged {} new articles ({} fetched, {} total)",
            merge.added, merge.fetched, merge.total
        );

        Ok(FetchSummary {
            enabled: true,
            sources,
            merge,
        })
    }

    async fn analyze_locked(&self) -> Result<AnalysisReport> {
        let store = Arc::clone(&self.store);
        let provider = Arc::clone(&self.provider);
        let window = self.config.recommendation.candidate_window;

        tokio::task::spawn_blocking(move || analyze(&store, provider.as_ref(), window))
            .await
            .context("Recommendation worker failed")?
    }

    /// Source names of the configured feeds, as articles from them would carry
    async fn active_sources(&self, urls: &[String]) -> HashSet<String> {
        stream::iter(urls.iter().cloned())
            .map(|url| {
                let feeds = Arc::clone(&self.feeds);
                async move {
                    let fetch_url = url.clone();
                    let title = match tokio::task::spawn_blocking(move || feeds.fetch(&fetch_url))
                        .await
                    {
                        Ok(Ok(document)) => document.title,
                        Ok(Err(e)) => {
                            warn!("Could not read feed title of {}: {:#}", url, e);
                            None
                        }
                        Err(e) => {
                            warn!("Feed title worker failed for {}: {}", url, e);
                            None
                        }
                    };
                    source_name(title.as_deref(), &url)
                }
            })
            .buffer_unordered(self.config.fetch.max_concurrency.max(1))
            .collect()
            .await
    }
}

impl UpdateJob for Pipeline {
    fn interval_hours(&self) -> Option<f64> {
        match self.store.load_doc::<FeedSettings>(DocumentKind::FeedSettings) {
            Ok(settings) => settings.map(|settings| settings.update_interval_hours),
            Err(e) => {
                warn!("Could not read feed settings: {}", e);
                None
            }
        }
    }

    async fn run(&self) -> Result<()> {
        let report = self.refresh().await?;
        info!(
            "Scheduled update merged {} new articles",
            report.fetch.merge.added
        );
        Ok(())
    }
}

/// Recompute the recommendation document from the stored articles and summary.
///
/// Blocking: reads and writes documents and calls the embedding provider.
/// Any provider failure returns before the recommendation document is touched.
fn analyze(
    store: &Arc<dyn DocumentStore>,
    provider: &dyn EmbeddingProvider,
    window: usize,
) -> Result<AnalysisReport> {
    let Some(articles) = store.load_doc::<ArticleDocument>(DocumentKind::Articles)? else {
        return Ok(AnalysisReport::skipped("no article history"));
    };
    if articles.data.is_empty() {
        return Ok(AnalysisReport::skipped("article history is empty"));
    }

    let valid_titles: HashSet<String> = articles
        .data
        .iter()
        .map(|article| article.title.clone())
        .collect();
    let mut cache = EmbeddingCache::load(Arc::clone(store))?;
    cache.clean(&valid_titles)?;

    let text_by_title: HashMap<&str, String> = articles
        .data
        .iter()
        .map(|article| (article.title.as_str(), article.embedding_text()))
        .collect();
    let embedded = cache.fill(
        articles.data.iter().map(|article| article.title.as_str()),
        |title| text_by_title.get(title).cloned().unwrap_or_default(),
        provider,
    )?;
    debug!("Embedding cache holds {} entries", cache.len());

    let budget = store
        .load_or_default::<FeedSettings>(DocumentKind::FeedSettings)?
        .recommend_count;

    let custom: Option<InterestSummaryDocument> =
        store.load_doc(DocumentKind::CustomInterestSummary)?;
    let summary = match custom {
        Some(summary) => Some(summary),
        None => store.load_doc(DocumentKind::LastInterestSummary)?,
    };
    let Some(summary) = summary.filter(|summary| !summary.summary.is_empty()) else {
        return Ok(AnalysisReport::skipped("no interest summary"));
    };

    let allocations = allocate(&summary.summary, budget);
    if allocations.is_empty() {
        return Ok(AnalysisReport::skipped("interest summary has no weight"));
    }

    let candidates: Vec<Candidate<'_>> = articles
        .data
        .iter()
        .filter_map(|article| {
            cache.get(&article.title).map(|embedding| Candidate {
                article,
                embedding,
            })
        })
        .collect();

    let recommendations = recommend(&allocations, &candidates, provider, window)?;
    let recommended = recommendations
        .iter()
        .map(|result| result.top_articles.len())
        .sum();
    let labels = recommendations.len();

    store
        .save_doc(
            DocumentKind::Recommendations,
            &RecommendationDocument {
                updated: Utc::now().to_rfc3339(),
                recommendations,
            },
        )
        .context("Failed to save recommendations")?;
    info!(
        "Recommended {} articles across {} labels (budget {})",
        recommended, labels, budget
    );

    Ok(AnalysisReport::Updated {
        labels,
        recommended,
        embedded,
    })
}

fn fetch_progress_bar() -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Fetching {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}
