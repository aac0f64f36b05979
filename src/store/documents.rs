use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::ClassificationSettings;

/// A normalized feed item; the title is its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, with = "published_format")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
}

impl Article {
    /// Text embedded for similarity search against label queries
    #[inline]
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.summary).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: String,
    pub count: usize,
}

/// `rss_summary.json`: the merged article history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDocument {
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub feeds: Vec<SourceCount>,
    #[serde(default)]
    pub data: Vec<Article>,
}

/// Flat mapping from article title to its embedding
pub type EmbeddingCacheDocument = BTreeMap<String, Vec<f32>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub path: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "embeddingText", alias = "embedding_text", default)]
    pub embedding_text: String,
    #[serde(alias = "topLabels", default)]
    pub top_labels: Vec<LabelScore>,
}

/// `embedding_analysis.json`: per-item labels of the last classification run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationDocument {
    #[serde(default)]
    pub results: Vec<ClassificationResult>,
    #[serde(alias = "analyzedCount", default)]
    pub analyzed_count: usize,
    #[serde(default)]
    pub settings: ClassificationSettings,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestEntry {
    pub path: String,
    #[serde(default)]
    pub count: usize,
    #[serde(alias = "totalScore", default)]
    pub total_score: f64,
}

/// `last_analysis_result.json` and its user-edited twin `custom_analysis_result.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestSummaryDocument {
    #[serde(rename = "totalCount", alias = "total_count", default)]
    pub total_count: usize,
    #[serde(default)]
    pub settings: ClassificationSettings,
    #[serde(rename = "totalAnalyzed", alias = "total_analyzed", default)]
    pub total_analyzed: usize,
    #[serde(default)]
    pub summary: Vec<InterestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedArticle {
    pub title: String,
    #[serde(default)]
    pub link: String,
    pub score: f32,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub label: String,
    #[serde(alias = "topArticles", default)]
    pub top_articles: Vec<RecommendedArticle>,
}

/// `rss_recommend.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDocument {
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub recommendations: Vec<RecommendationResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedDescription {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// `history_enriched.json`: page descriptions cached by URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentDocument {
    #[serde(default)]
    pub items: Vec<EnrichedDescription>,
    #[serde(default)]
    pub updated_at: String,
}

/// Publish times are written as RFC 3339 and read back leniently.
///
/// Feeds in the wild carry RFC 2822 dates, and older documents may hold empty
/// or garbled strings; anything that does not parse becomes `None` instead of
/// failing the whole document.
pub(crate) mod published_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    #[allow(clippy::ref_option, reason = "signature dictated by serde's `with` attribute")]
    pub fn serialize<S>(published: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match published {
            Some(time) => serializer.serialize_str(&time.to_rfc3339()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(parse))
    }

    pub fn parse(text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_rfc2822(text))
            .map(|time| time.with_timezone(&Utc))
            .ok()
    }
}
