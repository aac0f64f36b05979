
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    /// Override for the precomputed taxonomy embedding table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy_file: Option<PathBuf>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 64,
        }
    }
}

/// Defaults for a classification run; a run may override any of them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassificationConfig {
    pub use_deep_parsing: bool,
    pub top_n: usize,
    pub threshold: f32,
    pub granularity_level: u8,
    pub sampling_count: usize,
    pub site_blacklist: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            use_deep_parsing: true,
            top_n: 5,
            threshold: 0.39,
            granularity_level: 3,
            sampling_count: 20,
            site_blacklist: Vec::new(),
        }
    }
}

/// Network settings shared by feed and page fetching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of sources fetched at the same time
    pub max_concurrency: usize,
    /// Timeout for a single feed request in seconds
    pub timeout_seconds: u64,
    /// Timeout for a single page description request in seconds
    pub page_timeout_seconds: u64,
    /// Summaries are truncated to this many characters
    pub summary_max_chars: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 12,
            timeout_seconds: 15,
            page_timeout_seconds: 5,
            summary_max_chars: 2000,
            user_agent: "feedlens/0.1.0 (Feed Recommender)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Number of best-scoring articles considered per label
    pub candidate_window: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            candidate_window: 20,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid top N: {0} (must be between 1 and 100)")]
    InvalidTopN(usize),
    #[error("Invalid similarity threshold: {0} (must be between -1.0 and 1.0)")]
    InvalidThreshold(f32),
    #[error("Invalid granularity level: {0} (must be at least 1)")]
    InvalidGranularity(u8),
    #[error("Invalid sampling count: {0} (must be at least 1)")]
    InvalidSamplingCount(usize),
    #[error("Invalid fetch concurrency: {0} (must be between 1 and 64)")]
    InvalidConcurrency(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid summary length: {0} (must be at least 1)")]
    InvalidSummaryLength(usize),
    #[error("Invalid candidate window: {0} (must be at least 1)")]
    InvalidCandidateWindow(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            classification: ClassificationConfig::default(),
            fetch: FetchConfig::default(),
            recommendation: RecommendationConfig::default(),
            taxonomy_file: None,
            base_dir: Self::config_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".feedlens"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("feedlens"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load the configuration from the default directory
    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        Self::load_from(config_dir)
    }

    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.classification.validate()?;
        self.fetch.validate()?;

        if self.recommendation.candidate_window == 0 {
            return Err(ConfigError::InvalidCandidateWindow(
                self.recommendation.candidate_window,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Directory holding the persisted feed and analysis documents
    #[inline]
    pub fn data_dir(&self) -> PathBuf {
        self.get_base_dir().join("data")
    }

    /// Location of the precomputed taxonomy embedding table
    #[inline]
    pub fn taxonomy_path(&self) -> PathBuf {
        self.taxonomy_file
            .clone()
            .unwrap_or_else(|| self.get_base_dir().join("taxonomy_embeddings.json"))
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl ClassificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 || self.top_n > 100 {
            return Err(ConfigError::InvalidTopN(self.top_n));
        }

        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }

        if self.granularity_level == 0 {
            return Err(ConfigError::InvalidGranularity(self.granularity_level));
        }

        if self.sampling_count == 0 {
            return Err(ConfigError::InvalidSamplingCount(self.sampling_count));
        }

        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(())
    }

    pub fn set_top_n(&mut self, top_n: usize) -> Result<(), ConfigError> {
        if top_n == 0 || top_n > 100 {
            return Err(ConfigError::InvalidTopN(top_n));
        }
        self.top_n = top_n;
        Ok(())
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 || self.max_concurrency > 64 {
            return Err(ConfigError::InvalidConcurrency(self.max_concurrency));
        }

        for timeout in [self.timeout_seconds, self.page_timeout_seconds] {
            if !(1..=300).contains(&timeout) {
                return Err(ConfigError::InvalidTimeout(timeout));
            }
        }

        if self.summary_max_chars == 0 {
            return Err(ConfigError::InvalidSummaryLength(self.summary_max_chars));
        }

        Ok(())
    }
}
