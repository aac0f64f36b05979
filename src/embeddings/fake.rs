use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::EmbeddingProvider;

/// Deterministic provider: one dimension per keyword, set when the text mentions it
#[derive(Debug)]
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    calls: AtomicUsize,
    failing: AtomicBool,
    seen: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .map(|keyword| if text.contains(keyword.as_str()) { 1.0 } else { 0.0 })
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("should lock seen texts").clone()
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("embedding backend unavailable"));
        }
        self.seen
            .lock()
            .expect("should lock seen texts")
            .extend(texts.iter().cloned());
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }
}
