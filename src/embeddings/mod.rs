// Embeddings module
// Text -> vector capability, the Ollama client providing it, and the title cache

pub mod cache;
pub mod ollama;

#[cfg(test)]
pub(crate) mod fake;

pub use cache::EmbeddingCache;
pub use ollama::OllamaClient;

/// Maps texts to fixed-length vectors.
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Embed every text, returning vectors in input order
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector"))
    }
}

/// Cosine similarity clamped to [-1, 1].
///
/// Empty, zero-magnitude or differently sized vectors score 0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(dot, norm_a, norm_b), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (x.mul_add(y, dot), x.mul_add(x, norm_a), y.mul_add(y, norm_b))
        },
    );

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    (dot / denominator).clamp(-1.0, 1.0) as f32
}
