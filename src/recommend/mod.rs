// Recommendation module
// Split a budget across interest labels and rank cached articles per label


use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::embeddings::{EmbeddingProvider, cosine_similarity};
use crate::store::{Article, InterestEntry, RecommendationResult, RecommendedArticle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub label: String,
    pub allocated: usize,
}

/// Share `budget` across labels in proportion to their counts.
///
/// Every label gets `max(1, round(budget * count / total))` slots, rounding
/// half away from zero. The sum may exceed `budget`. With a zero total
/// nothing is allocated.
#[inline]
pub fn allocate(summary: &[InterestEntry], budget: usize) -> Vec<Allocation> {
    let total_weight: usize = summary.iter().map(|entry| entry.count).sum();
    if total_weight == 0 {
        warn!("Interest summary has zero total weight, nothing to allocate");
        return Vec::new();
    }

    summary
        .iter()
        .map(|entry| {
            let share = budget as f64 * entry.count as f64 / total_weight as f64;
            Allocation {
                label: entry.path.clone(),
                allocated: (share.round() as usize).max(1),
            }
        })
        .collect()
}

/// An article paired with its cached embedding
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub article: &'a Article,
    pub embedding: &'a [f32],
}

/// Pick up to `allocated` distinct titles among the `window` best-scoring candidates.
///
/// Candidates outside the window are never considered, so a label can end
/// up with fewer articles than allocated.
#[inline]
pub fn rank_for_label(
    query: &[f32],
    candidates: &[Candidate<'_>],
    allocated: usize,
    window: usize,
) -> Vec<RecommendedArticle> {
    let mut scored: Vec<(f32, &Candidate<'_>)> = candidates
        .iter()
        .map(|candidate| (cosine_similarity(query, candidate.embedding), candidate))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let mut used_titles = HashSet::new();
    scored
        .into_iter()
        .take(window)
        .filter(|(_, candidate)| used_titles.insert(candidate.article.title.as_str()))
        .take(allocated)
        .map(|(score, candidate)| RecommendedArticle {
            title: candidate.article.title.clone(),
            link: candidate.article.link.clone(),
            score,
            source: candidate.article.source.clone(),
        })
        .collect()
}

/// Build the per-label recommendation lists.
///
/// Label paths are embedded in a single provider call; a provider failure
/// aborts the run.
#[inline]
pub fn recommend(
    allocations: &[Allocation],
    candidates: &[Candidate<'_>],
    provider: &dyn EmbeddingProvider,
    window: usize,
) -> anyhow::Result<Vec<RecommendationResult>> {
    if allocations.is_empty() {
        return Ok(Vec::new());
    }

    let labels: Vec<String> = allocations
        .iter()
        .map(|allocation| allocation.label.clone())
        .collect();
    let queries = provider.embed_batch(&labels)?;
    if queries.len() != labels.len() {
        return Err(anyhow::anyhow!(
            "Embedding provider returned {} vectors for {} labels",
            queries.len(),
            labels.len()
        ));
    }

    let window = window.min(candidates.len());
    let results: Vec<RecommendationResult> = allocations
        .iter()
        .zip(queries)
        .map(|(allocation, query)| {
            let top_articles = rank_for_label(&query, candidates, allocation.allocated, window);
            debug!(
                "Label '{}': {} of {} allocated",
                allocation.label,
                top_articles.len(),
                allocation.allocated
            );
            RecommendationResult {
                label: allocation.label.clone(),
                top_articles,
            }
        })
        .collect();

    info!(
        "Built recommendations for {} labels from {} articles",
        results.len(),
        candidates.len()
    );
    Ok(results)
}
