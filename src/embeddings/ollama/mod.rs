
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::EmbeddingProvider;
use crate::config::OllamaConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking client for a local Ollama server's embedding API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// `/api/tags` entries; only the name is read
#[derive(Debug, Deserialize)]
struct InstalledModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<InstalledModel>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Confirm the server answers and the configured model is installed
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);
        self.validate_model().context("Model validation failed")?;
        info!("Ollama at {} is serving model {}", self.base_url, self.model);
        Ok(())
    }

    /// Fail unless the configured model is installed; models are never pulled
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let installed = self.installed_models()?;

        // Ollama reports "name:latest" for models configured without a tag
        let implicit_latest = format!("{}:latest", self.model);
        let found = installed.iter().any(|name| {
            *name == self.model || (!self.model.contains(':') && *name == implicit_latest)
        });

        if found {
            debug!("Model {} is installed", self.model);
            return Ok(());
        }
        warn!("Model {} not installed, found {:?}", self.model, installed);
        Err(anyhow::anyhow!(
            "Model '{}' is not installed in Ollama (installed: {}). Pull it with `ollama pull {}`",
            self.model,
            installed.join(", "),
            self.model
        ))
    }

    fn installed_models(&self) -> Result<Vec<String>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build tags URL")?;

        let body = self
            .call_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to reach the Ollama server")?;

        let tags: TagsResponse =
            serde_json::from_str(&body).context("Failed to parse the installed model list")?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;
        let request = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: texts,
        })
        .context("Failed to serialize embedding request")?;

        let body = self
            .call_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Embedding request failed")?;

        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Ollama returned {} vectors for {} texts",
                response.embeddings.len(),
                texts.len()
            ));
        }
        Ok(response.embeddings)
    }

    /// Retry server errors and transport failures with exponential backoff;
    /// client errors fail at once
    fn call_with_retry<F>(&self, mut call: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut attempt = 1;
        loop {
            let error = match call() {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            let retryable = match &error {
                ureq::Error::StatusCode(status) => *status >= 500,
                ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_)
                | ureq::Error::Io(_) => true,
                _ => false,
            };
            if !retryable {
                return Err(anyhow::anyhow!("Ollama request rejected: {}", error));
            }
            if attempt >= self.retry_attempts {
                error!(
                    "Giving up on {} after {} attempts: {}",
                    self.base_url, attempt, error
                );
                return Err(anyhow::anyhow!(
                    "Ollama request failed after {} attempts: {}",
                    attempt,
                    error
                ));
            }

            let delay = Duration::from_secs(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1));
            warn!(
                "Ollama request failed ({}), retrying in {:?} ({}/{})",
                error, delay, attempt, self.retry_attempts
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

impl EmbeddingProvider for OllamaClient {
    /// Embed in chunks of the configured batch size, keeping input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size.max(1) as usize) {
            vectors.extend(
                self.embed_chunk(chunk)
                    .with_context(|| format!("Failed to embed a batch of {} texts", chunk.len()))?,
            );
        }
        debug!("Embedded {} texts with {}", vectors.len(), self.model);
        Ok(vectors)
    }
}
