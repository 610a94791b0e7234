//! Background pipeline that turns an uploaded PDF into searchable chunks

use crate::pdf;
use crate::retrieval::Retriever;
use crate::snapshot::SnapshotManager;
use crate::store::FileStore;
use crate::types::IndexStats;
use crate::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Clone)]
pub struct BackgroundIndexer {
    files: FileStore,
    retriever: Retriever,
    snapshot: Arc<Mutex<SnapshotManager>>,
    /// Bumped whenever a PDF's index is dropped or overwritten. Read and
    /// written only while the snapshot lock is held.
    generations: Arc<DashMap<String, u64>>,
}

impl BackgroundIndexer {
    pub fn new(files: FileStore, retriever: Retriever, snapshot: Arc<Mutex<SnapshotManager>>) -> Self {
        Self {
            files,
            retriever,
            snapshot,
            generations: Arc::new(DashMap::new()),
        }
    }

    pub fn snapshot(&self) -> &Arc<Mutex<SnapshotManager>> {
        &self.snapshot
    }

    fn generation(&self, pdf_id: &str) -> u64 {
        self.generations.get(pdf_id).map(|g| *g).unwrap_or(0)
    }

    fn supersede(&self, pdf_id: &str) {
        *self.generations.entry(pdf_id.to_string()).or_insert(0) += 1;
    }

    /// Queue indexing of a stored PDF and return immediately
    pub fn spawn(&self, pdf_id: String) -> tokio::task::JoinHandle<()> {
        let indexer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = indexer.index_pdf(&pdf_id).await {
                error!("[BACKGROUND-INDEX] Indexing failed for {}: {}", pdf_id, e);
            }
        })
    }

    /// Extract, embed and store one PDF, recording progress in the snapshot.
    ///
    /// A run that is overtaken by `forget` or `index_text` for the same PDF
    /// discards its result instead of storing it.
    pub async fn index_pdf(&self, pdf_id: &str) -> Result<()> {
        let generation = {
            let mut snapshot = self.snapshot.lock().await;
            if snapshot.is_indexing(pdf_id) {
                info!("[BACKGROUND-INDEX] {} is already being indexed", pdf_id);
                return Ok(());
            }
            if !self.files.exists(pdf_id)? {
                return Err(Error::NotFound("PDF file not found.".to_string()));
            }
            snapshot.set_indexing(pdf_id, 0);
            snapshot.save()?;
            self.generation(pdf_id)
        };

        match self.run(pdf_id, generation).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut snapshot = self.snapshot.lock().await;
                if self.generation(pdf_id) != generation {
                    info!("[BACKGROUND-INDEX] Dropping stale failure for {}: {}", pdf_id, e);
                    return Ok(());
                }
                match &e {
                    // deleted while queued
                    Error::NotFound(_) => {
                        snapshot.remove(pdf_id);
                    }
                    _ => snapshot.set_failed(pdf_id, e.to_string()),
                }
                snapshot.save()?;
                Err(e)
            }
        }
    }

    async fn run(&self, pdf_id: &str, generation: u64) -> Result<()> {
        info!("[BACKGROUND-INDEX] Starting indexing for {}", pdf_id);

        let file = self
            .files
            .get(pdf_id)?
            .ok_or_else(|| Error::NotFound("PDF file not found.".to_string()))?;
        let text = pdf::extract_text(file.data).await?;
        self.progress(pdf_id, generation, 30).await?;

        self.commit_text(pdf_id, generation, &text).await
    }

    /// Embed `text` and store it, unless `generation` is no longer current
    async fn commit_text(&self, pdf_id: &str, generation: u64, text: &str) -> Result<()> {
        let prepared = self.retriever.prepare_document(pdf_id, text).await?;

        let mut snapshot = self.snapshot.lock().await;
        if self.generation(pdf_id) != generation {
            info!("[BACKGROUND-INDEX] {} changed while indexing, discarding result", pdf_id);
            return Ok(());
        }
        let stats = self.retriever.store_document(prepared).await?;
        snapshot.set_indexed(pdf_id, &stats);
        snapshot.save()?;
        info!(
            "[BACKGROUND-INDEX] {} indexed: {} chunks in {:.2}s",
            pdf_id, stats.total_chunks, stats.elapsed_secs
        );
        Ok(())
    }

    async fn progress(&self, pdf_id: &str, generation: u64, percentage: u8) -> Result<()> {
        let mut snapshot = self.snapshot.lock().await;
        if self.generation(pdf_id) != generation {
            return Ok(());
        }
        snapshot.set_indexing(pdf_id, percentage);
        snapshot.save()
    }

    /// Index caller-supplied text for `pdf_id` right away, overriding any
    /// background run still in flight
    pub async fn index_text(&self, pdf_id: &str, text: &str) -> Result<IndexStats> {
        let prepared = self.retriever.prepare_document(pdf_id, text).await?;

        let mut snapshot = self.snapshot.lock().await;
        self.supersede(pdf_id);
        let stats = self.retriever.store_document(prepared).await?;
        snapshot.set_indexed(pdf_id, &stats);
        snapshot.save()?;
        Ok(stats)
    }

    /// Forget a PDF's vectors and status
    pub async fn forget(&self, pdf_id: &str) -> Result<()> {
        let mut snapshot = self.snapshot.lock().await;
        self.supersede(pdf_id);
        let removed = self.retriever.remove_document(pdf_id).await?;
        if snapshot.remove(pdf_id).is_some() || removed > 0 {
            snapshot.save()?;
        }
        info!("[BACKGROUND-INDEX] Forgot {} ({} vectors)", pdf_id, removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::embeddings::EmbeddingProvider;
    use crate::snapshot::DocumentIndexInfo;
    use crate::store::{Database, EMBEDDINGS_TREE};
    use crate::vectordb::SledVectorStore;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::tempdir;

    struct ConstantEmbedding;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn provider_name(&self) -> &str {
            "Constant"
        }
    }

    /// Like `ConstantEmbedding`, but each batch takes a while
    struct SlowEmbedding;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn provider_name(&self) -> &str {
            "Slow"
        }
    }

    fn indexer(db: &Database, dir: &std::path::Path) -> BackgroundIndexer {
        indexer_with(db, dir, Arc::new(ConstantEmbedding))
    }

    fn indexer_with(
        db: &Database,
        dir: &std::path::Path,
        embedding: Arc<dyn EmbeddingProvider>,
    ) -> BackgroundIndexer {
        let vectors = SledVectorStore::new(db.tree(EMBEDDINGS_TREE).unwrap());
        let search = SearchConfig {
            top_k: 5,
            chunk_size: 100,
            chunk_overlap: 0,
            batch_size: 8,
        };
        let retriever = Retriever::new(embedding, Arc::new(vectors), &search);
        let snapshot = SnapshotManager::new(dir.join("index_snapshot.json")).unwrap();
        BackgroundIndexer::new(db.files.clone(), retriever, Arc::new(Mutex::new(snapshot)))
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_recorded_as_failed() {
        let dir = tempdir().unwrap();
        let db = Database::temporary().unwrap();
        let indexer = indexer(&db, dir.path());

        let pdf_id = db.files.put("broken.pdf", "application/pdf", b"not a pdf").unwrap();
        assert!(indexer.index_pdf(&pdf_id).await.is_err());

        let snapshot = indexer.snapshot().lock().await;
        assert!(matches!(
            snapshot.get(&pdf_id),
            Some(DocumentIndexInfo::IndexFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_leaves_no_status() {
        let dir = tempdir().unwrap();
        let db = Database::temporary().unwrap();
        let indexer = indexer(&db, dir.path());

        let result = indexer.index_pdf("0123456789abcdef0123456789abcdef").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(indexer
            .snapshot()
            .lock()
            .await
            .get("0123456789abcdef0123456789abcdef")
            .is_none());
    }

    #[tokio::test]
    async fn test_forget_drops_vectors_and_status() {
        let dir = tempdir().unwrap();
        let db = Database::temporary().unwrap();
        let indexer = indexer(&db, dir.path());

        let stats = indexer
            .retriever
            .index_document("pdf1", "Week one covers parsing. Week two covers types.")
            .await
            .unwrap();
        indexer.snapshot().lock().await.set_indexed("pdf1", &stats);

        indexer.forget("pdf1").await.unwrap();
        assert_eq!(indexer.retriever.vectors().count().await.unwrap(), 0);
        assert!(indexer.snapshot().lock().await.get("pdf1").is_none());
    }

    #[tokio::test]
    async fn test_forget_while_embedding_discards_the_run() {
        let dir = tempdir().unwrap();
        let db = Database::temporary().unwrap();
        let indexer = indexer_with(&db, dir.path(), Arc::new(SlowEmbedding));

        let pdf_id = db.files.put("week.pdf", "application/pdf", b"%PDF").unwrap();
        let generation = indexer.generation(&pdf_id);
        indexer.snapshot().lock().await.set_indexing(&pdf_id, 30);

        let running = {
            let indexer = indexer.clone();
            let pdf_id = pdf_id.clone();
            tokio::spawn(async move {
                indexer
                    .commit_text(&pdf_id, generation, "Week one covers parsing.")
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        db.files.delete(&pdf_id).unwrap();
        indexer.forget(&pdf_id).await.unwrap();
        running.await.unwrap().unwrap();

        assert_eq!(indexer.retriever.vectors().count().await.unwrap(), 0);
        assert!(indexer.snapshot().lock().await.get(&pdf_id).is_none());
    }

    #[tokio::test]
    async fn test_index_text_overrides_a_stale_run() {
        let dir = tempdir().unwrap();
        let db = Database::temporary().unwrap();
        let indexer = indexer(&db, dir.path());

        let stale = indexer.generation("pdf1");
        let stats = indexer
            .index_text("pdf1", "Office hours are Tuesday. Exams are in May.")
            .await
            .unwrap();

        indexer
            .commit_text("pdf1", stale, "Old text that should not land.")
            .await
            .unwrap();

        let records = indexer.retriever.vectors().list().await.unwrap();
        assert_eq!(records.len(), stats.total_chunks);
        assert!(records.iter().all(|r| !r.content.contains("Old text")));
        assert!(matches!(
            indexer.snapshot().lock().await.get("pdf1"),
            Some(DocumentIndexInfo::Indexed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_marked_indexing() {
        let dir = tempdir().unwrap();
        let db = Database::temporary().unwrap();
        let indexer = indexer(&db, dir.path());

        let pdf_id = db.files.put("gone.pdf", "application/pdf", b"%PDF").unwrap();
        db.files.delete(&pdf_id).unwrap();

        assert!(matches!(indexer.index_pdf(&pdf_id).await, Err(Error::NotFound(_))));
        assert!(!indexer.snapshot().lock().await.is_indexing(&pdf_id));
    }
}
