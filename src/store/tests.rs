use super::*;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

fn article(title: &str, source: &str) -> Article {
    Article {
        title: title.to_string(),
        link: format!("https://{source}/{}", title.replace(' ', "-")),
        summary: format!("About {title}"),
        published: None,
        source: source.to_string(),
    }
}

fn titles(document: &ArticleDocument) -> Vec<&str> {
    document
        .data
        .iter()
        .map(|article| article.title.as_str())
        .collect()
}

#[test]
fn json_store_missing_document_is_none() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = JsonFileStore::new(temp_dir.path());

    assert!(
        store
            .load(DocumentKind::Articles)
            .expect("should load")
            .is_none()
    );
    assert!(
        store
            .stored_size(DocumentKind::Articles)
            .expect("should stat")
            .is_none()
    );
    assert!(!store.remove(DocumentKind::Articles).expect("should remove"));
}

#[test]
fn json_store_round_trip_and_layout() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = JsonFileStore::new(temp_dir.path());
    let document = json!({"enabled": true, "feeds": []});

    store
        .save(DocumentKind::FeedSettings, &document)
        .expect("should save settings");

    let path = temp_dir.path().join("rss/rss_setting/rss_settings.json");
    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(
        store
            .load(DocumentKind::FeedSettings)
            .expect("should load settings"),
        Some(document)
    );
    assert!(
        store
            .stored_size(DocumentKind::FeedSettings)
            .expect("should stat")
            .is_some_and(|size| size > 0)
    );
}

#[test]
fn json_store_unparseable_document_is_none() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = JsonFileStore::new(temp_dir.path());
    let path = store.path_for(DocumentKind::Recommendations);
    std::fs::create_dir_all(path.parent().expect("should have parent"))
        .expect("should create dir");
    std::fs::write(&path, "{not json").expect("should write garbage");

    assert!(
        store
            .load(DocumentKind::Recommendations)
            .expect("should load")
            .is_none()
    );
}

#[test]
fn typed_load_treats_shape_mismatch_as_missing() {
    let store = MemoryStore::new();
    store
        .save(DocumentKind::Articles, &json!({"data": "not a list"}))
        .expect("should save");

    let loaded: Option<ArticleDocument> = store
        .load_doc(DocumentKind::Articles)
        .expect("should load");
    assert!(loaded.is_none());

    let fallback: ArticleDocument = store
        .load_or_default(DocumentKind::Articles)
        .expect("should load default");
    assert!(fallback.data.is_empty());
}

#[test]
fn memory_store_remove_and_exists() {
    let store = MemoryStore::new();
    store
        .save_doc(DocumentKind::EmbeddingCache, &EmbeddingCacheDocument::new())
        .expect("should save");

    assert!(store.exists(DocumentKind::EmbeddingCache).expect("should stat"));
    assert!(store.remove(DocumentKind::EmbeddingCache).expect("should remove"));
    assert!(!store.exists(DocumentKind::EmbeddingCache).expect("should stat"));
}

#[test]
fn feed_cache_kinds_exclude_settings() {
    let caches: Vec<DocumentKind> = DocumentKind::ALL
        .into_iter()
        .filter(|kind| kind.is_feed_cache())
        .collect();

    assert_eq!(
        caches,
        vec![
            DocumentKind::Articles,
            DocumentKind::EmbeddingCache,
            DocumentKind::Recommendations
        ]
    );
    assert!(
        caches
            .iter()
            .all(|kind| kind.relative_path().starts_with("rss/"))
    );
}

#[test]
fn published_is_lenient_on_read() {
    let parsed: Article = serde_json::from_value(json!({
        "title": "RFC 2822",
        "published": "Tue, 18 Mar 2025 09:30:00 +0100"
    }))
    .expect("should parse article");
    assert_eq!(
        parsed.published,
        Utc.with_ymd_and_hms(2025, 3, 18, 8, 30, 0).single()
    );

    let blank: Article = serde_json::from_value(json!({"title": "Blank", "published": ""}))
        .expect("should parse article");
    assert!(blank.published.is_none());

    let garbage: Article =
        serde_json::from_value(json!({"title": "Garbage", "published": 17}))
            .expect("should parse article");
    assert!(garbage.published.is_none());

    let written = serde_json::to_value(&blank).expect("should serialize");
    assert_eq!(written["published"], json!(""));
}

#[test]
fn article_embedding_text_is_trimmed() {
    let mut item = article("Rust 2024", "blog.rust-lang.org");
    item.summary = String::new();
    assert_eq!(item.embedding_text(), "Rust 2024");
}

#[test]
fn wire_names_are_stable() {
    let summary = InterestSummaryDocument {
        total_count: 3,
        total_analyzed: 2,
        summary: vec![InterestEntry {
            path: "Technology > Software".to_string(),
            count: 2,
            total_score: 1.1,
        }],
        ..InterestSummaryDocument::default()
    };
    let value = serde_json::to_value(&summary).expect("should serialize");
    assert_eq!(value["totalCount"], json!(3));
    assert_eq!(value["totalAnalyzed"], json!(2));
    assert_eq!(value["summary"][0]["total_score"], json!(1.1));

    let camel: InterestSummaryDocument = serde_json::from_value(json!({
        "summary": [{"path": "News", "count": 1, "totalScore": 0.5}]
    }))
    .expect("should accept camelCase aliases");
    assert!((camel.summary[0].total_score - 0.5).abs() < f64::EPSILON);

    let result = ClassificationResult {
        title: "t".to_string(),
        url: "https://example.com".to_string(),
        embedding_text: "t".to_string(),
        top_labels: vec![LabelScore {
            path: "News".to_string(),
            score: 0.5,
        }],
    };
    let value = serde_json::to_value(&result).expect("should serialize");
    assert!(value.get("embeddingText").is_some());
    assert!(value.get("top_labels").is_some());
}

#[test]
fn merge_appends_new_titles_in_order() {
    let articles = ArticleStore::new(Arc::new(MemoryStore::new()));

    let report = articles
        .merge(vec![article("One", "a.com"), article("Two", "b.com")])
        .expect("should merge first batch");
    assert_eq!(report.added, 2);

    let report = articles
        .merge(vec![
            article("Two", "c.com"),
            article("Three", "a.com"),
            article("Three", "b.com"),
            article("   ", "a.com"),
        ])
        .expect("should merge second batch");
    assert_eq!(
        report,
        MergeReport {
            fetched: 4,
            added: 1,
            total: 3
        }
    );

    let document = articles.load().expect("should load");
    assert_eq!(titles(&document), vec!["One", "Two", "Three"]);
    assert_eq!(document.total, 3);
    assert_eq!(
        document.feeds,
        vec![
            SourceCount {
                source: "a.com".to_string(),
                count: 2
            },
            SourceCount {
                source: "b.com".to_string(),
                count: 1
            },
        ]
    );
    assert!(!document.updated.is_empty());
}

#[test]
fn merge_is_idempotent() {
    let articles = ArticleStore::new(Arc::new(MemoryStore::new()));
    articles
        .merge(vec![article("Seed", "a.com")])
        .expect("should merge seed");

    let batch = vec![article("Fresh", "b.com"), article("Also fresh", "a.com")];
    articles.merge(batch.clone()).expect("should merge batch");
    let once = articles.load().expect("should load");

    let report = articles.merge(batch).expect("should merge batch again");
    let twice = articles.load().expect("should load");

    assert_eq!(report.added, 0);
    assert_eq!(once.data, twice.data);
    assert_eq!(once.feeds, twice.feeds);
}

#[test]
fn retain_recent_keeps_undated_articles() {
    let articles = ArticleStore::new(Arc::new(MemoryStore::new()));
    let now = Utc::now();

    let mut old = article("Old", "a.com");
    old.published = Some(now - Duration::days(20));
    let mut recent = article("Recent", "a.com");
    recent.published = Some(now - Duration::days(2));
    let undated = article("Undated", "b.com");

    articles
        .merge(vec![old, recent, undated])
        .expect("should merge");

    let removed = articles
        .retain_recent(now - Duration::days(14))
        .expect("should apply retention");
    assert_eq!(removed, 1);

    let document = articles.load().expect("should load");
    assert_eq!(titles(&document), vec!["Recent", "Undated"]);
    assert_eq!(document.total, 2);
}

#[test]
fn retain_sources_drops_removed_feeds() {
    let articles = ArticleStore::new(Arc::new(MemoryStore::new()));
    articles
        .merge(vec![
            article("Keep", "a.com"),
            article("Drop", "gone.com"),
            article("Keep too", "a.com"),
        ])
        .expect("should merge");

    let active: HashSet<String> = HashSet::from(["a.com".to_string()]);
    assert_eq!(
        articles
            .retain_sources(&active)
            .expect("should reconcile sources"),
        1
    );

    let document = articles.load().expect("should load");
    assert_eq!(titles(&document), vec!["Keep", "Keep too"]);
    assert_eq!(document.feeds.len(), 1);
}

#[test]
fn retention_without_document_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let articles = ArticleStore::new(Arc::clone(&store) as Arc<dyn DocumentStore>);

    assert_eq!(
        articles
            .retain_recent(Utc::now())
            .expect("should be a no-op"),
        0
    );
    assert!(!store.exists(DocumentKind::Articles).expect("should stat"));
}
