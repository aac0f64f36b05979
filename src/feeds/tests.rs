use super::*;
use chrono::Duration;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct StaticSource {
    documents: HashMap<String, FeedDocument>,
}

impl StaticSource {
    fn with(mut self, url: &str, document: FeedDocument) -> Self {
        self.documents.insert(url.to_string(), document);
        self
    }
}

impl FeedSource for StaticSource {
    fn fetch(&self, url: &str) -> anyhow::Result<FeedDocument> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

fn entry(title: &str) -> FeedEntry {
    FeedEntry {
        title: Some(title.to_string()),
        link: Some(format!("https://example.com/{}", title.to_lowercase())),
        summary: Some(format!("<p>{title} summary</p>")),
        ..FeedEntry::default()
    }
}

fn cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::days(14)
}

#[test]
fn source_name_prefers_feed_title() {
    assert_eq!(
        source_name(Some("  BBC News  "), "https://feeds.bbci.co.uk/news/rss.xml"),
        "BBC News"
    );
    assert_eq!(
        source_name(Some(" "), "https://www.theverge.com/rss/index.xml"),
        "theverge.com"
    );
    assert_eq!(source_name(None, "https://hnrss.org/frontpage"), "hnrss.org");
}

#[test]
fn normalization_dedups_titles_within_a_source() {
    let document = FeedDocument {
        title: Some("Example".to_string()),
        entries: vec![entry("Alpha"), entry("Beta"), entry("Alpha"), entry("  ")],
    };

    let (source, articles) = normalize_feed("https://example.com/rss", document, cutoff(), 2000);

    assert_eq!(source, "Example");
    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Beta"]);
    assert!(articles.iter().all(|a| a.source == "Example"));
    assert_eq!(articles[0].summary, "Alpha summary");
}

#[test]
fn normalization_applies_cutoff_but_keeps_undated() {
    let now = Utc::now();
    let document = FeedDocument {
        title: None,
        entries: vec![
            FeedEntry {
                published: Some(now - Duration::days(20)),
                ..entry("Stale")
            },
            FeedEntry {
                published: Some(now - Duration::days(1)),
                ..entry("Fresh")
            },
            entry("Undated"),
        ],
    };

    let (_, articles) =
        normalize_feed("https://example.com/rss", document, now - Duration::days(14), 2000);

    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Fresh", "Undated"]);
}

#[test]
fn stale_duplicate_does_not_hide_a_fresh_one() {
    let now = Utc::now();
    let document = FeedDocument {
        title: Some("Example".to_string()),
        entries: vec![
            FeedEntry {
                published: Some(now - Duration::days(20)),
                summary: Some("old".to_string()),
                ..entry("Same")
            },
            FeedEntry {
                published: Some(now - Duration::days(1)),
                summary: Some("new".to_string()),
                ..entry("Same")
            },
        ],
    };

    let (_, articles) =
        normalize_feed("https://example.com/rss", document, now - Duration::days(14), 2000);

    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Same");
    assert_eq!(articles[0].summary, "new");
}

#[test]
fn summary_falls_back_to_description_then_content() {
    let document = FeedDocument {
        title: None,
        entries: vec![
            FeedEntry {
                title: Some("Described".to_string()),
                description: Some("from description".to_string()),
                content: Some("from content".to_string()),
                ..FeedEntry::default()
            },
            FeedEntry {
                title: Some("Content only".to_string()),
                summary: Some("   ".to_string()),
                content: Some("<div>from <em>content</em></div>".to_string()),
                ..FeedEntry::default()
            },
            FeedEntry {
                title: Some("Bare".to_string()),
                ..FeedEntry::default()
            },
        ],
    };

    let (_, articles) = normalize_feed("https://example.com/rss", document, cutoff(), 2000);

    assert_eq!(articles[0].summary, "from description");
    assert_eq!(articles[1].summary, "from content");
    assert_eq!(articles[2].summary, "");
    assert_eq!(articles[2].link, "");
}

#[tokio::test]
async fn failing_source_is_isolated() {
    let source = StaticSource::default()
        .with(
            "https://a.example/rss",
            FeedDocument {
                title: Some("A".to_string()),
                entries: vec![entry("One"), entry("Two")],
            },
        )
        .with(
            "https://b.example/rss",
            FeedDocument {
                title: Some("B".to_string()),
                entries: vec![entry("One")],
            },
        );
    let fetcher = FeedFetcher::new(Arc::new(source), 2, 2000);
    let urls = vec![
        "https://a.example/rss".to_string(),
        "https://down.example/rss".to_string(),
        "https://b.example/rss".to_string(),
    ];

    let report = fetcher
        .fetch_all(&urls, cutoff(), &ProgressBar::hidden())
        .await;

    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.failed(), 1);
    // cross-source duplicates are left for the article store
    assert_eq!(report.articles.len(), 3);

    let failed = report
        .sources
        .iter()
        .find(|source| source.error.is_some())
        .expect("should record the failed source");
    assert_eq!(failed.source, "down.example");
    assert_eq!(failed.items, 0);
}

#[tokio::test]
async fn empty_url_list_yields_empty_report() {
    let fetcher = FeedFetcher::new(Arc::new(StaticSource::default()), 12, 2000);
    let report = fetcher
        .fetch_all(&[], cutoff(), &ProgressBar::hidden())
        .await;
    assert!(report.articles.is_empty());
    assert!(report.sources.is_empty());
}
