//! Embedding-based retrieval of syllabus text for chatbot prompts

use crate::chunker::TextChunker;
use crate::config::SearchConfig;
use crate::embeddings::EmbeddingProvider;
use crate::types::{IndexStats, ScoredChunk, TextChunk};
use crate::vectordb::VectorDatabase;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Chunks of one PDF with their embeddings, not yet stored
pub struct PreparedDocument {
    pub pdf_id: String,
    pub chunks: Vec<TextChunk>,
    pub embeddings: Vec<Vec<f32>>,
    started: Instant,
}

#[derive(Clone)]
pub struct Retriever {
    embedding: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorDatabase>,
    chunk_size: usize,
    chunk_overlap: usize,
    batch_size: usize,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorDatabase>,
        search: &SearchConfig,
    ) -> Self {
        Self {
            embedding,
            vectors,
            chunk_size: search.chunk_size,
            chunk_overlap: search.chunk_overlap,
            batch_size: search.batch_size,
            top_k: search.top_k,
        }
    }

    pub fn vectors(&self) -> &Arc<dyn VectorDatabase> {
        &self.vectors
    }

    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Chunk, embed and store `text`, replacing whatever `pdf_id` had before
    pub async fn index_document(&self, pdf_id: &str, text: &str) -> Result<IndexStats> {
        let prepared = self.prepare_document(pdf_id, text).await?;
        self.store_document(prepared).await
    }

    /// Chunk and embed `text` without touching the vector store
    pub async fn prepare_document(&self, pdf_id: &str, text: &str) -> Result<PreparedDocument> {
        let started = Instant::now();

        let chunks = TextChunker::new(self.chunk_size, self.chunk_overlap).split(pdf_id, text);
        if chunks.is_empty() {
            return Err(Error::Validation("No text to index".to_string()));
        }
        info!("[RETRIEVAL] Split {} into {} chunks", pdf_id, chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self
            .embedding
            .embed_in_batches(&texts, self.batch_size)
            .await?;

        Ok(PreparedDocument {
            pdf_id: pdf_id.to_string(),
            chunks,
            embeddings,
            started,
        })
    }

    pub async fn store_document(&self, prepared: PreparedDocument) -> Result<IndexStats> {
        self.vectors
            .replace_document(&prepared.pdf_id, &prepared.chunks, &prepared.embeddings)
            .await?;

        let stats = IndexStats {
            total_chunks: prepared.chunks.len(),
            elapsed_secs: prepared.started.elapsed().as_secs_f64(),
        };
        info!(
            "[RETRIEVAL] Indexed {} ({} chunks in {:.2}s using {})",
            prepared.pdf_id,
            stats.total_chunks,
            stats.elapsed_secs,
            self.embedding.provider_name()
        );
        Ok(stats)
    }

    pub async fn remove_document(&self, pdf_id: &str) -> Result<usize> {
        self.vectors.delete_document(pdf_id).await
    }

    /// Most similar chunks for `query`, within one PDF when `pdf_id` is given
    pub async fn search(
        &self,
        pdf_id: Option<&str>,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.embedding.embed(query).await?;

        let hits = match pdf_id {
            Some(pdf_id) => {
                self.vectors
                    .search_document(pdf_id, &query_vector, top_k)
                    .await?
            }
            None => self.vectors.search(&query_vector, top_k).await?,
        };

        Ok(hits
            .into_iter()
            .map(|hit| ScoredChunk {
                content: hit.content,
                score: hit.score,
            })
            .collect())
    }

    /// The best `top_k` chunk texts, newline-joined, ready to paste into a prompt
    pub async fn build_context(&self, pdf_id: Option<&str>, query: &str) -> Result<String> {
        let hits = self.search(pdf_id, query, self.top_k).await?;
        Ok(join_context(&hits))
    }
}

pub fn join_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| hit.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
