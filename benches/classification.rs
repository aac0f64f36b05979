use criterion::{Criterion, criterion_group, criterion_main};
use feedlens::classify::{Taxonomy, TaxonomyEntry, aggregate_interests};
use feedlens::recommend::{Candidate, allocate, rank_for_label};
use feedlens::store::{Article, ClassificationResult, InterestEntry, LabelScore};
use std::hint::black_box;

const DIMENSIONS: usize = 768;

fn vector(seed: usize) -> Vec<f32> {
    (0..DIMENSIONS)
        .map(|i| ((seed * 31 + i * 7) as f32 * 0.013).sin())
        .collect()
}

fn taxonomy() -> Taxonomy {
    let entries = (0..600)
        .map(|i| TaxonomyEntry {
            path: format!("Category {} > Topic {} > Leaf {}", i % 12, i % 60, i),
            embedding: vector(i),
        })
        .collect();
    Taxonomy::new(entries)
}

fn classification_results() -> Vec<ClassificationResult> {
    (0..2000)
        .map(|i| ClassificationResult {
            title: format!("Page {}", i),
            url: format!("https://site{}.example/{}", i % 40, i),
            embedding_text: String::new(),
            top_labels: (0..5)
                .map(|rank| LabelScore {
                    path: format!("Category {} > Topic {} > Leaf {}", rank, (i + rank) % 60, i % 600),
                    score: 0.9 - rank as f32 * 0.1,
                })
                .collect(),
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let taxonomy = taxonomy();
    let query = vector(4242);
    c.bench_function("taxonomy_classify", |b| {
        b.iter(|| taxonomy.classify(black_box(&query), black_box(5), black_box(0.39)))
    });

    let results = classification_results();
    c.bench_function("aggregate_interests", |b| {
        b.iter(|| aggregate_interests(black_box(&results), black_box(2), black_box(0.39), 20))
    });

    let summary: Vec<InterestEntry> = (0..20)
        .map(|i| InterestEntry {
            path: format!("Category {} > Topic {}", i, i),
            count: 100 - i * 3,
            total_score: 50.0,
        })
        .collect();
    c.bench_function("allocate", |b| {
        b.iter(|| allocate(black_box(&summary), black_box(30)))
    });

    let articles: Vec<Article> = (0..1500)
        .map(|i| Article {
            title: format!("Headline {}", i % 1200),
            link: format!("https://news.example/{}", i),
            summary: String::new(),
            published: None,
            source: "Bench Feed".to_string(),
        })
        .collect();
    let embeddings: Vec<Vec<f32>> = (0..articles.len()).map(|i| vector(i + 1000)).collect();
    let candidates: Vec<Candidate<'_>> = articles
        .iter()
        .zip(&embeddings)
        .map(|(article, embedding)| Candidate {
            article,
            embedding,
        })
        .collect();
    c.bench_function("rank_for_label", |b| {
        b.iter(|| rank_for_label(black_box(&query), black_box(&candidates), 10, 20))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
