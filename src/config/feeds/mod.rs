#[cfg(test)]
mod tests;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Sources used when the settings document lists none
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://feeds.bbci.co.uk/news/world/rss.xml",
    "https://feeds.bbci.co.uk/news/technology/rss.xml",
    "https://techcrunch.com/feed/",
    "https://www.theverge.com/rss/index.xml",
    "https://github.blog/feed/",
    "https://hnrss.org/frontpage",
];

const DEFAULT_HISTORY_DAYS: u32 = 14;
const DEFAULT_RECOMMEND_COUNT: usize = 10;

/// Feed settings document shared with the browser extension.
///
/// Every field falls back to its default on its own when missing or malformed,
/// so one bad value never discards the rest of the document. Keys this crate
/// does not know about are kept and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSettings {
    pub enabled: bool,
    pub feeds: Vec<String>,
    pub history_days: u32,
    pub recommend_count: usize,
    pub update_interval_hours: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for FeedSettings {
    #[inline]
    fn default() -> Self {
        Self {
            enabled: true,
            feeds: Vec::new(),
            history_days: DEFAULT_HISTORY_DAYS,
            recommend_count: DEFAULT_RECOMMEND_COUNT,
            update_interval_hours: 0.0,
            extra: Map::new(),
        }
    }
}

impl FeedSettings {
    /// Build settings from an arbitrary JSON value, substituting defaults per field
    #[inline]
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(object) = value.as_object() else {
            warn!("Feed settings document is not an object, using defaults");
            return defaults;
        };

        let enabled = field(object, "enabled", Value::as_bool).unwrap_or(defaults.enabled);

        let feeds = match object.get("feeds") {
            None | Some(Value::Null) => defaults.feeds,
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect(),
            Some(other) => {
                warn!("Ignoring malformed feeds list: {}", other);
                defaults.feeds
            }
        };

        let history_days = field(object, "historyDays", lenient_number)
            .filter(|days| *days >= 0.0)
            .map_or(defaults.history_days, |days| days as u32);

        let recommend_count = field(object, "recommendCount", lenient_number)
            .filter(|count| *count >= 0.0)
            .map_or(defaults.recommend_count, |count| count as usize);

        let update_interval_hours = field(object, "updateIntervalHours", lenient_number)
            .unwrap_or(defaults.update_interval_hours);

        let extra = object
            .iter()
            .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            enabled,
            feeds,
            history_days,
            recommend_count,
            update_interval_hours,
            extra,
        }
    }

    /// Configured feeds, or the built-in list when none are configured
    #[inline]
    pub fn effective_feeds(&self) -> Vec<String> {
        if self.feeds.is_empty() {
            DEFAULT_FEEDS.iter().map(|feed| (*feed).to_string()).collect()
        } else {
            self.feeds.clone()
        }
    }

    /// Articles published before this instant are outside the retention window.
    ///
    /// A window reaching past the earliest representable time keeps everything.
    #[inline]
    pub fn cutoff(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
        chrono::TimeDelta::try_days(i64::from(self.history_days))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
    }
}

impl<'de> Deserialize<'de> for FeedSettings {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

const KNOWN_KEYS: &[&str] = &[
    "enabled",
    "feeds",
    "historyDays",
    "recommendCount",
    "updateIntervalHours",
];

fn field<T>(object: &Map<String, Value>, key: &str, read: impl Fn(&Value) -> Option<T>) -> Option<T> {
    let value = object.get(key)?;
    if value.is_null() {
        return None;
    }
    let parsed = read(value);
    if parsed.is_none() {
        warn!("Ignoring malformed value for '{}': {}", key, value);
    }
    parsed
}

/// Accept numbers and numeric strings such as `"14"`
pub(crate) fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .filter(|number: &f64| number.is_finite())
}
