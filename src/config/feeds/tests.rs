use super::*;
use chrono::{TimeZone, Utc};
use serde_json::json;

#[test]
fn defaults_for_empty_document() {
    let settings = FeedSettings::from_value(&json!({}));
    assert_eq!(settings, FeedSettings::default());
    assert!(settings.enabled);
    assert_eq!(settings.history_days, 14);
    assert_eq!(settings.recommend_count, 10);
    assert!(settings.update_interval_hours.abs() < f64::EPSILON);
}

#[test]
fn reads_well_formed_document() {
    let settings: FeedSettings = serde_json::from_value(json!({
        "enabled": false,
        "feeds": ["https://example.com/rss", "  ", "https://other.org/atom.xml"],
        "historyDays": 7,
        "recommendCount": 25,
        "updateIntervalHours": 1.5
    }))
    .expect("should deserialize settings");

    assert!(!settings.enabled);
    assert_eq!(
        settings.feeds,
        vec!["https://example.com/rss", "https://other.org/atom.xml"]
    );
    assert_eq!(settings.history_days, 7);
    assert_eq!(settings.recommend_count, 25);
    assert!((settings.update_interval_hours - 1.5).abs() < f64::EPSILON);
}

#[test]
fn malformed_fields_fall_back_individually() {
    let settings = FeedSettings::from_value(&json!({
        "enabled": "yes",
        "feeds": "https://not-a-list.example",
        "historyDays": "30",
        "recommendCount": -4,
        "updateIntervalHours": {"hours": 2}
    }));

    assert!(settings.enabled);
    assert!(settings.feeds.is_empty());
    assert_eq!(settings.history_days, 30);
    assert_eq!(settings.recommend_count, 10);
    assert!(settings.update_interval_hours.abs() < f64::EPSILON);
}

#[test]
fn non_object_document_uses_defaults() {
    assert_eq!(
        FeedSettings::from_value(&json!([1, 2, 3])),
        FeedSettings::default()
    );
}

#[test]
fn unknown_keys_survive_a_round_trip() {
    let original = json!({
        "enabled": true,
        "feeds": [],
        "historyDays": 14,
        "recommendCount": 10,
        "updateIntervalHours": 0.0,
        "theme": "dark"
    });
    let settings = FeedSettings::from_value(&original);
    assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));

    let written = serde_json::to_value(&settings).expect("should serialize settings");
    assert_eq!(written, original);
}

#[test]
fn effective_feeds_uses_builtin_list_when_empty() {
    let settings = FeedSettings::default();
    assert_eq!(settings.effective_feeds().len(), DEFAULT_FEEDS.len());

    let settings = FeedSettings {
        feeds: vec!["https://example.com/rss".to_string()],
        ..FeedSettings::default()
    };
    assert_eq!(settings.effective_feeds(), vec!["https://example.com/rss"]);
}

#[test]
fn cutoff_subtracts_history_days() {
    let now = Utc
        .with_ymd_and_hms(2025, 3, 20, 12, 0, 0)
        .single()
        .expect("should build a valid timestamp");
    let settings = FeedSettings::default();
    assert_eq!(
        settings.cutoff(now),
        Utc.with_ymd_and_hms(2025, 3, 6, 12, 0, 0)
            .single()
            .expect("should build a valid timestamp")
    );
}

#[test]
fn oversized_history_window_keeps_everything() {
    let settings = FeedSettings::from_value(&json!({"historyDays": 100_000_000}));
    assert_eq!(settings.history_days, 100_000_000);

    let cutoff = settings.cutoff(Utc::now());

    assert_eq!(cutoff, chrono::DateTime::<Utc>::MIN_UTC);
    let ancient = Utc
        .with_ymd_and_hms(1900, 1, 1, 0, 0, 0)
        .single()
        .expect("should build a valid timestamp");
    assert!(ancient >= cutoff);
}
