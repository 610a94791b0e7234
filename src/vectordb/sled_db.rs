//! Brute-force vector store on a Sled tree
//!
//! Keys are `pdf_id \0 chunk_id`, so one document's records form a contiguous
//! prefix range. Search decodes the candidate range and scores every record;
//! there is no index.

use super::{check_lengths, cosine_similarity, EmbeddingRecord, SearchResult, VectorDatabase};
use crate::store::{decode, encode};
use crate::types::TextChunk;
use crate::{Error, Result};
use async_trait::async_trait;
use rayon::prelude::*;

const KEY_SEPARATOR: u8 = 0;

#[derive(Clone)]
pub struct SledVectorStore {
    tree: sled::Tree,
}

fn document_prefix(pdf_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(pdf_id.len() + 1);
    prefix.extend_from_slice(pdf_id.as_bytes());
    prefix.push(KEY_SEPARATOR);
    prefix
}

fn record_key(record: &EmbeddingRecord) -> Vec<u8> {
    let mut key = document_prefix(&record.pdf_id);
    key.extend_from_slice(record.id.as_bytes());
    key
}

impl SledVectorStore {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    fn stored_dimension(&self) -> Result<Option<usize>> {
        match self.tree.first()? {
            Some((_, value)) => {
                let record: EmbeddingRecord = decode(&value)?;
                Ok(Some(record.vector.len()))
            }
            None => Ok(None),
        }
    }

    /// Dimension of the records that do not belong to `pdf_id`
    fn dimension_excluding(&self, pdf_id: &str) -> Result<Option<usize>> {
        let prefix = document_prefix(pdf_id);
        let first = match self.tree.first()? {
            Some((key, value)) if !key.starts_with(&prefix) => Some(value),
            Some(_) => {
                // the document's keys are contiguous, so skip past them
                let mut after = prefix;
                if let Some(last) = after.last_mut() {
                    *last = KEY_SEPARATOR + 1;
                }
                self.tree.range(after..).next().transpose()?.map(|(_, value)| value)
            }
            None => None,
        };
        match first {
            Some(value) => {
                let record: EmbeddingRecord = decode(&value)?;
                Ok(Some(record.vector.len()))
            }
            None => Ok(None),
        }
    }

    fn check_dimension(records: &[EmbeddingRecord], expected: usize) -> Result<()> {
        for record in records {
            if record.vector.is_empty() {
                return Err(Error::VectorDb(format!("Empty vector for chunk {}", record.id)));
            }
            if record.vector.len() != expected {
                return Err(Error::VectorDb(format!(
                    "Vector dimension mismatch: expected {}, got {}",
                    expected,
                    record.vector.len()
                )));
            }
        }
        Ok(())
    }

    /// Score `candidates` in parallel and keep the best `top_k`.
    ///
    /// The sort is stable, so equal scores keep key order.
    fn rank(candidates: Vec<EmbeddingRecord>, query: &[f32], top_k: usize) -> Vec<SearchResult> {
        let scores: Vec<f32> = candidates
            .par_iter()
            .map(|record| cosine_similarity(query, &record.vector))
            .collect();

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .zip(scores)
            .map(|(record, score)| SearchResult {
                id: record.id,
                pdf_id: record.pdf_id,
                content: record.content,
                score,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    async fn scan(&self, prefix: Option<Vec<u8>>, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let tree = self.tree.clone();
        let query = query.to_vec();

        tokio::task::spawn_blocking(move || {
            let iter = match &prefix {
                Some(prefix) => tree.scan_prefix(prefix),
                None => tree.iter(),
            };
            let candidates = iter
                .values()
                .map(|value| decode::<EmbeddingRecord>(&value?))
                .collect::<Result<Vec<_>>>()?;

            if candidates.is_empty() {
                tracing::warn!("[VECTOR-DB] No documents found in the vector store");
                return Ok(Vec::new());
            }

            if let Some(first) = candidates.first() {
                if first.vector.len() != query.len() {
                    return Err(Error::VectorDb(format!(
                        "Query vector dimension mismatch: expected {}, got {}",
                        first.vector.len(),
                        query.len()
                    )));
                }
            }

            Ok(Self::rank(candidates, &query, top_k))
        })
        .await?
    }
}

#[async_trait]
impl VectorDatabase for SledVectorStore {
    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let expected = match self.stored_dimension()? {
            Some(dimension) => dimension,
            None => records[0].vector.len(),
        };

        Self::check_dimension(&records, expected)?;

        let mut batch = sled::Batch::default();
        for record in &records {
            batch.insert(record_key(record), encode(record)?);
        }

        self.tree.apply_batch(batch)?;
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.scan(None, query_vector, top_k).await
    }

    async fn search_document(
        &self,
        pdf_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.scan(Some(document_prefix(pdf_id)), query_vector, top_k).await
    }

    async fn delete_document(&self, pdf_id: &str) -> Result<usize> {
        let mut batch = sled::Batch::default();
        let mut removed = 0;
        for key in self.tree.scan_prefix(document_prefix(pdf_id)).keys() {
            batch.remove(key?);
            removed += 1;
        }
        self.tree.apply_batch(batch)?;
        Ok(removed)
    }

    /// Validates the new set first, then drops the old records and writes the
    /// new ones in a single batch
    async fn replace_document(
        &self,
        pdf_id: &str,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        check_lengths(chunks, embeddings)?;

        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddingRecord {
                id: chunk.id.clone(),
                pdf_id: pdf_id.to_string(),
                content: chunk.content.clone(),
                vector: embedding.clone(),
            })
            .collect();

        if let Some(first) = records.first() {
            let expected = self
                .dimension_excluding(pdf_id)?
                .unwrap_or(first.vector.len());
            Self::check_dimension(&records, expected)?;
        }

        let mut batch = sled::Batch::default();
        let mut removed = 0;
        for key in self.tree.scan_prefix(document_prefix(pdf_id)).keys() {
            batch.remove(key?);
            removed += 1;
        }
        for record in &records {
            batch.insert(record_key(record), encode(record)?);
        }
        self.tree.apply_batch(batch)?;

        if removed > 0 {
            tracing::info!("[VECTOR-DB] Replaced {} stale vectors for {}", removed, pdf_id);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<EmbeddingRecord>> {
        self.tree
            .iter()
            .values()
            .map(|value| decode(&value?))
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.tree.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SledVectorStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SledVectorStore::new(db.open_tree("pdf_embeddings").unwrap())
    }

    fn record(pdf_id: &str, id: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            pdf_id: pdf_id.to_string(),
            content: format!("{pdf_id}:{id}"),
            vector,
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = store();
        store
            .insert(vec![
                record("p1", "a", vec![1.0, 0.0]),
                record("p1", "b", vec![0.7, 0.7]),
                record("p2", "c", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_search_document_is_scoped() {
        let store = store();
        store
            .insert(vec![
                record("p1", "a", vec![0.0, 1.0]),
                record("p2", "b", vec![1.0, 0.0]),
                record("p10", "c", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search_document("p1", &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pdf_id, "p1");
    }

    #[tokio::test]
    async fn test_empty_store_and_zero_k() {
        let store = store();
        assert!(store.search(&[1.0], 5).await.unwrap().is_empty());

        store.insert(vec![record("p1", "a", vec![1.0])]).await.unwrap();
        assert!(store.search(&[1.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_is_enforced() {
        let store = store();
        store.insert(vec![record("p1", "a", vec![1.0, 0.0])]).await.unwrap();

        let err = store
            .insert(vec![record("p1", "b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VectorDb(_)));

        assert!(store.search(&[1.0], 3).await.is_err());
        assert!(store.insert(vec![record("p1", "c", vec![])]).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_document() {
        let store = store();
        store
            .insert(vec![
                record("p1", "old1", vec![1.0, 0.0]),
                record("p1", "old2", vec![1.0, 0.0]),
                record("p2", "keep", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let chunks = vec![TextChunk {
            id: "new".to_string(),
            pdf_id: "p1".to_string(),
            content: "fresh".to_string(),
            chunk_index: 0,
            hash: "h".to_string(),
        }];
        store
            .replace_document("p1", &chunks, &[vec![0.5, 0.5]])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let listed = store.list().await.unwrap();
        assert!(listed.iter().any(|r| r.content == "fresh"));
        assert!(listed.iter().all(|r| !r.id.starts_with("old")));

    }

    fn chunk(pdf_id: &str, id: &str) -> TextChunk {
        TextChunk {
            id: id.to_string(),
            pdf_id: pdf_id.to_string(),
            content: format!("{pdf_id}:{id}"),
            chunk_index: 0,
            hash: "h".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rejected_replacement_keeps_old_records() {
        let store = store();
        store
            .insert(vec![
                record("p1", "a", vec![1.0, 0.0]),
                record("p2", "b", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let wrong_dimension = store
            .replace_document("p1", &[chunk("p1", "new")], &[vec![1.0, 0.0, 0.0]])
            .await;
        assert!(matches!(wrong_dimension, Err(Error::VectorDb(_))));

        let missing_embedding = store.replace_document("p1", &[chunk("p1", "new")], &[]).await;
        assert!(matches!(missing_embedding, Err(Error::VectorDb(_))));

        let kept = store.search_document("p1", &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");
    }

    #[tokio::test]
    async fn test_sole_document_may_change_dimension() {
        let store = store();
        store.insert(vec![record("p1", "a", vec![1.0, 0.0])]).await.unwrap();

        store
            .replace_document("p1", &[chunk("p1", "b")], &[vec![0.0, 0.0, 1.0]])
            .await
            .unwrap();

        let results = store.search(&[0.0, 0.0, 1.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn test_equal_scores_keep_key_order() {
        let store = store();
        store
            .insert(vec![
                record("p2", "a", vec![1.0, 1.0]),
                record("p1", "b", vec![1.0, 1.0]),
                record("p1", "a", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 1.0], 3).await.unwrap();
        let keys: Vec<String> = results
            .iter()
            .map(|r| format!("{}/{}", r.pdf_id, r.id))
            .collect();
        assert_eq!(keys, vec!["p1/a", "p1/b", "p2/a"]);
    }
}
