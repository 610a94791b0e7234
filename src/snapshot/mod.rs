//! Per-syllabus embedding index status, persisted as a JSON snapshot

use crate::types::IndexStats;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Syllabus index snapshot (v1 format)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "formatVersion")]
pub enum IndexSnapshot {
    #[serde(rename = "v1")]
    V1 {
        documents: HashMap<String, DocumentIndexInfo>,
        #[serde(rename = "lastUpdated")]
        last_updated: String,
    },
}

/// Index state of one PDF
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status")]
pub enum DocumentIndexInfo {
    #[serde(rename = "indexing")]
    Indexing {
        percentage: u8,
        #[serde(rename = "lastUpdated")]
        last_updated: String,
    },
    #[serde(rename = "indexed")]
    Indexed {
        #[serde(rename = "totalChunks")]
        total_chunks: usize,
        #[serde(rename = "lastUpdated")]
        last_updated: String,
    },
    #[serde(rename = "indexfailed")]
    IndexFailed {
        #[serde(rename = "errorMessage")]
        error_message: String,
        #[serde(rename = "lastUpdated")]
        last_updated: String,
    },
}

pub struct SnapshotManager {
    snapshot_path: PathBuf,
    documents: HashMap<String, DocumentIndexInfo>,
}

impl SnapshotManager {
    pub fn new(snapshot_path: PathBuf) -> Result<Self> {
        let mut manager = Self {
            snapshot_path,
            documents: HashMap::new(),
        };

        if manager.snapshot_path.exists() {
            manager.load()?;
        }

        Ok(manager)
    }

    /// Load the snapshot. Work that was in flight when the process stopped
    /// will never finish, so it is recorded as failed.
    pub fn load(&mut self) -> Result<()> {
        if !self.snapshot_path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&self.snapshot_path)?;
        let snapshot: IndexSnapshot = serde_json::from_str(&content)?;

        match snapshot {
            IndexSnapshot::V1 { documents, .. } => {
                for (pdf_id, info) in documents {
                    let info = match info {
                        DocumentIndexInfo::Indexing { .. } => DocumentIndexInfo::IndexFailed {
                            error_message: "Indexing was interrupted".to_string(),
                            last_updated: Utc::now().to_rfc3339(),
                        },
                        other => other,
                    };
                    self.documents.insert(pdf_id, info);
                }
            }
        }

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.snapshot_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let snapshot = IndexSnapshot::V1 {
            documents: self.documents.clone(),
            last_updated: Utc::now().to_rfc3339(),
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.snapshot_path, json)?;

        Ok(())
    }

    pub fn set_indexing(&mut self, pdf_id: &str, percentage: u8) {
        self.documents.insert(
            pdf_id.to_string(),
            DocumentIndexInfo::Indexing {
                percentage: percentage.min(100),
                last_updated: Utc::now().to_rfc3339(),
            },
        );
    }

    pub fn set_indexed(&mut self, pdf_id: &str, stats: &IndexStats) {
        self.documents.insert(
            pdf_id.to_string(),
            DocumentIndexInfo::Indexed {
                total_chunks: stats.total_chunks,
                last_updated: Utc::now().to_rfc3339(),
            },
        );
    }

    pub fn set_failed(&mut self, pdf_id: &str, error: String) {
        self.documents.insert(
            pdf_id.to_string(),
            DocumentIndexInfo::IndexFailed {
                error_message: error,
                last_updated: Utc::now().to_rfc3339(),
            },
        );
    }

    pub fn remove(&mut self, pdf_id: &str) -> Option<DocumentIndexInfo> {
        self.documents.remove(pdf_id)
    }

    pub fn get(&self, pdf_id: &str) -> Option<&DocumentIndexInfo> {
        self.documents.get(pdf_id)
    }

    pub fn is_indexing(&self, pdf_id: &str) -> bool {
        matches!(self.documents.get(pdf_id), Some(DocumentIndexInfo::Indexing { .. }))
    }

    pub fn indexed_count(&self) -> usize {
        self.documents
            .values()
            .filter(|info| matches!(info, DocumentIndexInfo::Indexed { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_v1_format() {
        let dir = tempdir().unwrap();
        let snapshot_path = dir.path().join("index_snapshot.json");

        let mut manager = SnapshotManager::new(snapshot_path.clone()).unwrap();
        manager.set_indexing("pdf1", 30);
        assert!(manager.is_indexing("pdf1"));

        manager.set_indexed(
            "pdf1",
            &IndexStats {
                total_chunks: 12,
                elapsed_secs: 0.4,
            },
        );
        manager.set_failed("pdf2", "No readable text found in the PDF file.".to_string());
        manager.save().unwrap();

        let reloaded = SnapshotManager::new(snapshot_path.clone()).unwrap();
        assert!(matches!(
            reloaded.get("pdf1"),
            Some(DocumentIndexInfo::Indexed { total_chunks: 12, .. })
        ));
        assert_eq!(reloaded.indexed_count(), 1);

        let json = std::fs::read_to_string(&snapshot_path).unwrap();
        assert!(json.contains("\"formatVersion\"") && json.contains("\"v1\""));
        assert!(json.contains("\"totalChunks\": 12"));
        assert!(json.contains("\"indexfailed\""));
    }

    #[test]
    fn test_interrupted_indexing_becomes_failure() {
        let dir = tempdir().unwrap();
        let snapshot_path = dir.path().join("index_snapshot.json");

        let mut manager = SnapshotManager::new(snapshot_path.clone()).unwrap();
        manager.set_indexing("pdf1", 50);
        manager.save().unwrap();

        let reloaded = SnapshotManager::new(snapshot_path).unwrap();
        assert!(!reloaded.is_indexing("pdf1"));
        assert!(matches!(
            reloaded.get("pdf1"),
            Some(DocumentIndexInfo::IndexFailed { error_message, .. }) if error_message.contains("interrupted")
        ));
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let mut manager = SnapshotManager::new(dir.path().join("s.json")).unwrap();
        manager.set_indexing("pdf1", 0);
        assert!(manager.remove("pdf1").is_some());
        assert!(manager.get("pdf1").is_none());
    }
}
