// Taxonomy classification module
// Label history items against a fixed taxonomy and summarize user interests

pub mod history;
pub mod settings;


use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::embeddings::{EmbeddingProvider, cosine_similarity};
use crate::store::{ClassificationResult, InterestEntry, LabelScore};
use crate::{LensError, Result};

pub use history::{HistoryEnricher, HistoryExport, HistoryItem};
pub use settings::ClassificationSettings;

/// Separator between the segments of a taxonomy path
pub const PATH_SEPARATOR: &str = " > ";

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyEntry {
    pub path: String,
    pub embedding: Vec<f32>,
}

/// The fixed label table every item is compared against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    data: Vec<RawTaxonomyEntry>,
}

#[derive(Debug, Deserialize)]
struct RawTaxonomyEntry {
    path: Value,
    embedding: Value,
}

impl Taxonomy {
    #[inline]
    pub fn new(entries: Vec<TaxonomyEntry>) -> Self {
        Self { entries }
    }

    /// Load `{"data": [{"path", "embedding"}]}` from disk.
    ///
    /// Paths may be pre-joined strings or segment arrays; embeddings may be
    /// whitespace separated numbers or JSON arrays.
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            LensError::Classification(format!(
                "Failed to read taxonomy table {}: {}",
                path.display(),
                e
            ))
        })?;
        let taxonomy = Self::from_slice(&bytes)?;
        info!(
            "Taxonomy loaded from {} with {} entries",
            path.display(),
            taxonomy.len()
        );
        Ok(taxonomy)
    }

    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let file: TaxonomyFile = serde_json::from_slice(bytes).map_err(|e| {
            LensError::Classification(format!("Malformed taxonomy table: {}", e))
        })?;

        let entries = file
            .data
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let path = parse_path(&raw.path).ok_or_else(|| {
                    LensError::Classification(format!("Taxonomy entry {} has no usable path", index))
                })?;
                let embedding = parse_embedding(&raw.embedding).ok_or_else(|| {
                    LensError::Classification(format!(
                        "Taxonomy entry '{}' has a malformed embedding",
                        path
                    ))
                })?;
                Ok(TaxonomyEntry { path, embedding })
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(dimension) = entries.first().map(|entry| entry.embedding.len()) {
            if let Some(odd) = entries.iter().find(|entry| entry.embedding.len() != dimension) {
                return Err(LensError::Classification(format!(
                    "Taxonomy entry '{}' has {} dimensions, expected {}",
                    odd.path,
                    odd.embedding.len(),
                    dimension
                )));
            }
        }

        Ok(Self { entries })
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
    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    /// Best labels for one embedded item.
    ///
    /// Takes the `top_n` highest scores (ties keep table order) and keeps
    /// those at or above `threshold`. When none qualifies, the single best
    /// label is returned regardless of its score, so the result is only
    /// empty for an empty taxonomy.
    #[inline]
    pub fn classify(&self, vector: &[f32], top_n: usize, threshold: f32) -> Vec<LabelScore> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .map(|entry| cosine_similarity(vector, &entry.embedding))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let mut labels: Vec<LabelScore> = scored
            .iter()
            .take(top_n)
            .filter(|(_, score)| *score >= threshold)
            .map(|&(index, score)| self.label(index, score))
            .collect();

        if labels.is_empty() {
            if let Some(&(index, score)) = scored.first() {
                debug!(
                    "No label reached threshold {}, keeping best match at {:.4}",
                    threshold, score
                );
                labels.push(self.label(index, score));
            }
        }

        labels
    }

    fn label(&self, index: usize, score: f32) -> LabelScore {
        LabelScore {
            path: self.entries[index].path.clone(),
            score,
        }
    }
}

fn parse_path(value: &Value) -> Option<String> {
    let path = match value {
        Value::String(path) => path.trim().to_string(),
        Value::Array(segments) => segments
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR),
        _ => return None,
    };
    (!path.is_empty()).then_some(path)
}

fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    let embedding = match value {
        Value::String(text) => text
            .split_whitespace()
            .map(|number| number.parse::<f32>().ok())
            .collect::<Option<Vec<_>>>()?,
        Value::Array(numbers) => numbers
            .iter()
            .map(|number| number.as_f64().map(|n| n as f32))
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    (!embedding.is_empty()).then_some(embedding)
}

/// Item ready for labelling
#[derive(Debug, Clone, PartialEq)]
pub struct LabelInput {
    pub title: String,
    pub url: String,
    pub embedding_text: String,
}

/// Embed every item with a non-empty text in one batch and label it.
///
/// Items with blank embedding text are skipped. Provider failures abort the
/// whole run.
#[inline]
pub fn classify_items(
    items: &[LabelInput],
    taxonomy: &Taxonomy,
    provider: &dyn EmbeddingProvider,
    settings: &ClassificationSettings,
) -> anyhow::Result<Vec<ClassificationResult>> {
    let items: Vec<&LabelInput> = items
        .iter()
        .filter(|item| !item.embedding_text.trim().is_empty())
        .collect();
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = items.iter().map(|item| item.embedding_text.clone()).collect();
    let vectors = provider.embed_batch(&texts)?;
    if vectors.len() != items.len() {
        return Err(anyhow::anyhow!(
            "Embedding provider returned {} vectors for {} items",
            vectors.len(),
            items.len()
        ));
    }

    Ok(items
        .into_iter()
        .zip(vectors)
        .map(|(item, vector)| ClassificationResult {
            title: item.title.clone(),
            url: item.url.clone(),
            embedding_text: item.embedding_text.clone(),
            top_labels: taxonomy.classify(&vector, settings.top_n, settings.threshold),
        })
        .collect())
}

/// Aggregation key of a label path at the given granularity
#[inline]
pub fn group_key(path: &str, granularity_level: u8) -> String {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    match granularity_level {
        1 => segments.first().copied().unwrap_or(path).to_string(),
        2 if segments.len() >= 2 => segments[..2].join(PATH_SEPARATOR),
        _ => path.to_string(),
    }
}

/// Fold labels at or above `threshold` into per-group counts and score sums.
///
/// Sorted by descending total score then descending count, ties in first-seen
/// order, truncated to `sampling_count`. Totals are rounded to 4 decimals.
#[inline]
pub fn aggregate_interests(
    results: &[ClassificationResult],
    granularity_level: u8,
    threshold: f32,
    sampling_count: usize,
) -> Vec<InterestEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (usize, f64)> = HashMap::new();

    for label in results.iter().flat_map(|result| &result.top_labels) {
        if label.score < threshold {
            continue;
        }
        let key = group_key(&label.path, granularity_level);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0, 0.0)
        });
        group.0 += 1;
        group.1 += f64::from(label.score);
    }

    let mut summary: Vec<InterestEntry> = order
        .into_iter()
        .filter_map(|path| {
            let (count, total) = groups.get(&path).copied()?;
            Some(InterestEntry {
                path,
                count,
                total_score: round4(total),
            })
        })
        .collect();

    summary.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.count.cmp(&a.count))
    });
    summary.truncate(sampling_count);
    summary
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
