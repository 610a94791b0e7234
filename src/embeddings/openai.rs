//! OpenAI-compatible embedding provider
//!
//! Works against OpenAI itself or any server exposing `/embeddings` in the
//! same shape, such as a hosted all-MiniLM-L6-v2.

use super::{clamp_to_budget, default_max_tokens_for_model, EmbeddingProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAIEmbedding {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    dimension: usize,
    max_tokens: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedding {
    pub fn new(api_key: Option<String>, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let base_url = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let max_tokens = default_max_tokens_for_model(&model);

        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension: 0,
            max_tokens,
        }
    }

    pub async fn detect_dimension(&mut self) -> Result<usize> {
        let probe = self.embed("syllabus").await?;
        if probe.is_empty() {
            return Err(Error::Embedding("Failed to detect dimension".to_string()));
        }
        self.dimension = probe.len();
        Ok(self.dimension)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_batch(&[text.to_string()]).await?;
        result
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts
                .iter()
                .map(|t| clamp_to_budget(t, self.max_tokens))
                .collect(),
            encoding_format: "float",
        };

        let url = format!("{}/embeddings", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Embedding(format!(
                "Embedding API error ({status}): {error_text}"
            )));
        }

        let mut embedding_response: EmbeddingResponse = response.json().await?;
        embedding_response.data.sort_by_key(|d| d.index);

        Ok(embedding_response
            .data
            .into_iter()
            .map(|d| d.embedding)
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minilm_gets_short_budget() {
        let provider = OpenAIEmbedding::new(
            None,
            Some("sentence-transformers/all-MiniLM-L6-v2".to_string()),
            Some("http://localhost:8080/v1/".to_string()),
        );
        assert_eq!(provider.max_tokens, 256);
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
        assert_eq!(provider.dimension(), 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_openai_embed() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let mut provider = OpenAIEmbedding::new(Some(api_key), None, None);

        let dimension = provider.detect_dimension().await.unwrap();
        assert_eq!(dimension, 1536);
    }
}
