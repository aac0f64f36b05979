use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::ClassificationConfig;
use crate::config::feeds::lenient_number;

/// Parameters of one classification run, as exchanged with the extension
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSettings {
    pub use_deep_parsing: bool,
    pub top_n: usize,
    pub threshold: f32,
    pub granularity_level: u8,
    pub sampling_count: usize,
    pub site_blacklist: Vec<String>,
}

impl Default for ClassificationSettings {
    #[inline]
    fn default() -> Self {
        Self::from(&ClassificationConfig::default())
    }
}

impl From<&ClassificationConfig> for ClassificationSettings {
    #[inline]
    fn from(config: &ClassificationConfig) -> Self {
        Self {
            use_deep_parsing: config.use_deep_parsing,
            top_n: config.top_n,
            threshold: config.threshold,
            granularity_level: config.granularity_level,
            sampling_count: config.sampling_count,
            site_blacklist: config.site_blacklist.clone(),
        }
    }
}

impl ClassificationSettings {
    /// Resolve each field from the first layer that carries a valid value.
    ///
    /// Layers are JSON objects in priority order; fields missing or malformed
    /// everywhere come from `base`.
    #[inline]
    pub fn resolve(layers: &[&Value], base: &ClassificationConfig) -> Self {
        let base = Self::from(base);
        let objects: Vec<&Map<String, Value>> =
            layers.iter().filter_map(|layer| layer.as_object()).collect();

        Self {
            use_deep_parsing: pick(&objects, &["useDeepParsing", "use_deep_parsing"], lenient_bool)
                .unwrap_or(base.use_deep_parsing),
            top_n: pick(&objects, &["topN", "top_n"], |value| {
                lenient_number(value).filter(|n| (1.0..=100.0).contains(n))
            })
            .map_or(base.top_n, |n| n as usize),
            threshold: pick(&objects, &["threshold"], |value| {
                lenient_number(value).filter(|t| (-1.0..=1.0).contains(t))
            })
            .map_or(base.threshold, |t| t as f32),
            granularity_level: pick(&objects, &["granularityLevel", "granularity_level"], |value| {
                lenient_number(value).filter(|level| (1.0..=255.0).contains(level))
            })
            .map_or(base.granularity_level, |level| level as u8),
            sampling_count: pick(&objects, &["samplingCount", "sampling_count"], |value| {
                lenient_number(value).filter(|n| *n >= 1.0)
            })
            .map_or(base.sampling_count, |n| n as usize),
            site_blacklist: pick(&objects, &["siteBlacklist", "site_blacklist"], |value| {
                value.as_array().map(|entries| {
                    entries
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|entry| !entry.is_empty())
                        .map(str::to_string)
                        .collect()
                })
            })
            .unwrap_or(base.site_blacklist),
        }
    }

    /// Whether `url` matches any blacklist entry, case-insensitively
    #[inline]
    pub fn is_blacklisted(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.site_blacklist
            .iter()
            .any(|entry| url.contains(&entry.to_lowercase()))
    }
}

impl<'de> Deserialize<'de> for ClassificationSettings {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::resolve(&[&value], &ClassificationConfig::default()))
    }
}

/// First valid value for any of `keys`, searching layers in order
fn pick<T>(
    objects: &[&Map<String, Value>],
    keys: &[&str],
    read: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    objects.iter().find_map(|object| {
        let (key, value) = keys
            .iter()
            .find_map(|key| object.get(*key).map(|value| (*key, value)))?;
        if value.is_null() {
            return None;
        }
        let parsed = read(value);
        if parsed.is_none() {
            warn!("Ignoring malformed classification setting '{}': {}", key, value);
        }
        parsed
    })
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        _ => None,
    }
}
