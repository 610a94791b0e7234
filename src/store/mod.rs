//! Persistence on top of one Sled database
//!
//! Each collection is a Sled tree holding bincode-encoded records keyed by id.
//! Secondary lookups (email, username, pdf id) are kept in sibling trees and
//! updated inside the same transaction as the record they point to.

pub mod files;
pub mod syllabi;
pub mod users;

pub use files::{FileStore, StoredFile};
pub use syllabi::SyllabusStore;
pub use users::UserStore;

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::TransactionError;
use std::path::Path;

pub const EMBEDDINGS_TREE: &str = "pdf_embeddings";

#[derive(Clone)]
pub struct Database {
    db: sled::Db,
    pub users: UserStore,
    pub syllabi: SyllabusStore,
    pub files: FileStore,
}

impl Database {
    /// Create or open the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open Sled DB: {e}")))?;
        tracing::info!("[STORE] Opened database at {}", path.display());

        Self::from_db(db)
    }

    /// In-memory database that disappears on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            users: UserStore::open(&db)?,
            syllabi: SyllabusStore::open(&db)?,
            files: FileStore::open(&db)?,
            db,
        })
    }

    pub fn tree(&self, name: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(name)?)
    }

    pub async fn flush(&self) -> Result<usize> {
        Ok(self.db.flush_async().await?)
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(
        value,
        bincode::config::standard(),
    )?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(value)
}

/// Decode every value in a tree; a corrupt record fails the whole read
pub(crate) fn decode_all<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>> {
    tree.iter()
        .values()
        .map(|value| decode(&value?))
        .collect()
}

pub(crate) fn flatten_tx(err: TransactionError<Error>) -> Error {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    }
}
