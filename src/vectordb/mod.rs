//! Vector storage for syllabus chunk embeddings

pub mod sled_db;

use crate::types::TextChunk;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One embedded chunk of a PDF
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub pdf_id: String,
    pub content: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub pdf_id: String,
    pub content: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Insert or overwrite records
    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Rank every stored record against `query_vector`
    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Rank only the records of one PDF
    async fn search_document(
        &self,
        pdf_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Drop every record of one PDF, returning how many were removed
    async fn delete_document(&self, pdf_id: &str) -> Result<usize>;

    async fn list(&self) -> Result<Vec<EmbeddingRecord>>;

    /// Get total number of vectors
    async fn count(&self) -> Result<usize>;

    async fn insert_batch(&self, chunks: &[TextChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        const STORAGE_BATCH_SIZE: usize = 50;

        check_lengths(chunks, embeddings)?;

        for (i, (chunk_batch, embedding_batch)) in chunks
            .chunks(STORAGE_BATCH_SIZE)
            .zip(embeddings.chunks(STORAGE_BATCH_SIZE))
            .enumerate()
        {
            let records: Vec<EmbeddingRecord> = chunk_batch
                .iter()
                .zip(embedding_batch.iter())
                .map(|(chunk, embedding)| EmbeddingRecord {
                    id: chunk.id.clone(),
                    pdf_id: chunk.pdf_id.clone(),
                    content: chunk.content.clone(),
                    vector: embedding.clone(),
                })
                .collect();

            tracing::info!("[VECTOR-DB] Inserting batch {} ({} vectors)", i + 1, records.len());
            self.insert(records).await?;
        }

        Ok(())
    }

    /// Swap a PDF's records for a freshly embedded set. The old records
    /// survive if the new set is rejected.
    async fn replace_document(
        &self,
        pdf_id: &str,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        check_lengths(chunks, embeddings)?;
        let removed = self.delete_document(pdf_id).await?;
        if removed > 0 {
            tracing::info!("[VECTOR-DB] Replaced {} stale vectors for {}", removed, pdf_id);
        }
        self.insert_batch(chunks, embeddings).await
    }
}

pub(crate) fn check_lengths(chunks: &[TextChunk], embeddings: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != embeddings.len() {
        return Err(Error::VectorDb(format!(
            "{} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }
    Ok(())
}

/// Cosine similarity of two vectors; zero-norm or mismatched inputs score 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        tracing::warn!("[VECTOR-DB] Zero norm vector detected in cosine similarity");
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub use sled_db::SledVectorStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);

        let s = cosine_similarity(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert!((s - 0.974_631_8).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
