#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use feedlens::config::OllamaConfig;
use feedlens::embeddings::{EmbeddingProvider, OllamaClient, cosine_similarity};
use std::env;
use std::time::Duration;
use tracing::info;

const TEST_MODEL: &str = "nomic-embed-text:latest";
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_client() -> OllamaClient {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());

    let config = OllamaConfig {
        host,
        port,
        model,
        batch_size: 5, // Smaller batch size for testing
        ..OllamaConfig::default()
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_model_is_available() {
    init_test_tracing();

    let client = create_integration_test_client();
    client
        .validate_model()
        .expect("the configured model should be installed");
    info!("Model {} is installed", client.model());
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_batch_spans_multiple_requests() {
    init_test_tracing();

    let client = create_integration_test_client();
    let texts: Vec<String> = (0..12)
        .map(|i| format!("Headline number {} about open source software", i))
        .collect();

    let embeddings = client
        .embed_batch(&texts)
        .expect("should embed every text");

    assert_eq!(embeddings.len(), texts.len());
    let dimensions = embeddings[0].len();
    assert!(dimensions > 0);
    assert!(embeddings.iter().all(|e| e.len() == dimensions));
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_similar_texts_score_higher() {
    init_test_tracing();

    let client = create_integration_test_client();
    let label = client
        .embed("Technology > Software > Programming Languages")
        .expect("should embed label");
    let related = client
        .embed("Rust 1.86 released with trait upcasting")
        .expect("should embed related headline");
    let unrelated = client
        .embed("Local bakery wins award for sourdough bread")
        .expect("should embed unrelated headline");

    let related_score = cosine_similarity(&label, &related);
    let unrelated_score = cosine_similarity(&label, &unrelated);
    info!("related {:.3} vs unrelated {:.3}", related_score, unrelated_score);

    assert!(related_score > unrelated_score);
}
