//! PDF blob storage
//!
//! File metadata and raw bytes live in separate trees so listing metadata
//! never pulls whole documents into memory.

use super::{decode, encode, flatten_tx};
use crate::types::new_id;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub length: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub info: FileInfo,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct FileStore {
    meta: sled::Tree,
    data: sled::Tree,
}

impl FileStore {
    pub(crate) fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            meta: db.open_tree("files")?,
            data: db.open_tree("file_data")?,
        })
    }

    /// Store a file and return its new id
    pub fn put(&self, filename: &str, content_type: &str, bytes: &[u8]) -> Result<String> {
        let info = FileInfo {
            id: new_id(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            length: bytes.len(),
            uploaded_at: Utc::now(),
        };
        let encoded = encode(&info)?;

        (&self.meta, &self.data)
            .transaction(|(meta, data)| {
                data.insert(info.id.as_bytes(), bytes)?;
                meta.insert(info.id.as_bytes(), encoded.as_slice())?;
                Ok(())
            })
            .map_err(flatten_tx)?;

        tracing::debug!("[FILES] Stored {} ({} bytes) as {}", filename, bytes.len(), info.id);
        Ok(info.id)
    }

    pub fn info(&self, id: &str) -> Result<Option<FileInfo>> {
        match self.meta.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredFile>> {
        let Some(info) = self.info(id)? else {
            return Ok(None);
        };
        let data = self
            .data
            .get(id.as_bytes())?
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default();
        Ok(Some(StoredFile { info, data }))
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.meta.contains_key(id.as_bytes())?)
    }

    /// Remove a file; returns false if it was not there
    pub fn delete(&self, id: &str) -> Result<bool> {
        (&self.meta, &self.data)
            .transaction(|(meta, data)| {
                data.remove(id.as_bytes())?;
                Ok(meta.remove(id.as_bytes())?.is_some())
            })
            .map_err(flatten_tx)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::Database;

    #[test]
    fn test_put_get_delete() {
        let db = Database::temporary().unwrap();
        let files = &db.files;

        let id = files.put("os.pdf", "application/pdf", b"%PDF-1.4 test").unwrap();
        assert!(files.exists(&id).unwrap());

        let stored = files.get(&id).unwrap().unwrap();
        assert_eq!(stored.info.filename, "os.pdf");
        assert_eq!(stored.info.length, 13);
        assert_eq!(stored.data, b"%PDF-1.4 test");

        assert!(files.delete(&id).unwrap());
        assert!(!files.delete(&id).unwrap());
        assert!(files.get(&id).unwrap().is_none());
    }
}
