use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use axum::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Io(#[from] io::Error),

    #[error("document {doc} is corrupt: {source}")]
    Corrupt {
        doc: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode document {doc}: {source}")]
    Encode {
        doc: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Whole-document persistence capability.
///
/// A document is an opaque named blob; callers own serialization. `persist`
/// must be all-or-nothing: a reader concurrent with a write sees either the
/// old document or the new one, never a torn mix.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load a document, `None` if it has never been written.
    async fn load(&self, doc: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Durably replace a document.
    async fn persist(&self, doc: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

/// Filesystem-backed store: one file per document under `root`.
///
/// Writes go to a sibling temp file, are fsynced, then renamed over the
/// target, so a crash mid-write leaves the prior document intact.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn load(&self, doc: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.root.join(doc)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, doc: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.root.join(doc);
        let temp_path = path.with_extension("tmp");

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemDocumentStore {
    docs: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl DocumentStore for MemDocumentStore {
    async fn load(&self, doc: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs.get(doc).cloned())
    }

    async fn persist(&self, doc: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.insert(doc.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_missing_document_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp.path().to_path_buf());

        assert!(store.load("nothing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persist_then_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp.path().to_path_buf());

        store
            .persist("tasks_a.json", b"[1,2,3]".to_vec())
            .await
            .unwrap();
        let bytes = store.load("tasks_a.json").await.unwrap().unwrap();
        assert_eq!(bytes, b"[1,2,3]");
    }

    #[tokio::test]
    async fn persist_replaces_whole_document() {
        let temp = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp.path().to_path_buf());

        store.persist("users.json", b"old".to_vec()).await.unwrap();
        store.persist("users.json", b"new".to_vec()).await.unwrap();

        let bytes = store.load("users.json").await.unwrap().unwrap();
        assert_eq!(bytes, b"new");

        // No temp file left behind after the rename.
        assert!(!temp.path().join("users.tmp").exists());
    }

    #[tokio::test]
    async fn mem_store_roundtrip() {
        let store = MemDocumentStore::default();
        assert!(store.load("users.json").await.unwrap().is_none());

        store.persist("users.json", b"[]".to_vec()).await.unwrap();
        assert_eq!(store.load("users.json").await.unwrap().unwrap(), b"[]");
    }
}
