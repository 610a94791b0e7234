
pub mod ollama;
pub mod openai;

use crate::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn provider_name(&self) -> &str;

    /// Embed `texts` in requests of at most `batch_size`, preserving order
    async fn embed_in_batches(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size.max(1)).enumerate() {
            let mut vectors = self.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "{} returned {} embeddings for {} inputs",
                    self.provider_name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            tracing::debug!("[EMBEDDING] Batch {} embedded ({} texts)", i + 1, batch.len());
            embeddings.append(&mut vectors);
        }

        Ok(embeddings)
    }
}

/// Rough character budget for a model: 4 chars per token
pub(crate) fn clamp_to_budget(text: &str, max_tokens: usize) -> String {
    if text.trim().is_empty() {
        return " ".to_string();
    }

    let max_chars = max_tokens * 4;
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect()
    } else {
        text.to_string()
    }
}

/// Sentence-transformer models accept far shorter inputs than API models
pub(crate) fn default_max_tokens_for_model(model: &str) -> usize {
    let model = model.to_lowercase();
    if model.contains("minilm") || model.contains("mpnet") {
        256
    } else if model.contains("nomic-embed-text") || model.contains("text-embedding-3") {
        8192
    } else {
        2048
    }
}

pub use ollama::OllamaEmbedding;
pub use openai::OpenAIEmbedding;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }

        fn dimension(&self) -> usize {
            1
        }

        fn provider_name(&self) -> &str {
            "Counting"
        }
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let provider = CountingProvider { calls: AtomicUsize::new(0) };
        let texts: Vec<String> = (1..=5).map(|n| "x".repeat(n)).collect();

        let vectors = provider.embed_in_batches(&texts, 2).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_budget_clamping() {
        assert_eq!(clamp_to_budget("", 10), " ");
        assert_eq!(clamp_to_budget("abcdef", 1), "abcd");
        assert_eq!(clamp_to_budget("ééééé", 1).chars().count(), 4);
        assert_eq!(default_max_tokens_for_model("all-MiniLM-L6-v2"), 256);
        assert_eq!(default_max_tokens_for_model("text-embedding-3-small"), 8192);
    }
}
