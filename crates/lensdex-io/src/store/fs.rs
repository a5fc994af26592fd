//! Directory-backed store: each index is a sub-directory, each bulk call one
//! numbered NDJSON file in the root. Useful to inspect payloads without a server.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;

use super::IndexStore;
use crate::error::{Error, Result};

pub struct FsIndexStore {
    root: PathBuf,
    seq: AtomicU64,
}

impl FsIndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_dir(&self, index: &str) -> Result<PathBuf> {
        if index.is_empty() || index.contains(['/', '\\']) || index.starts_with('.') {
            return Err(Error::Store(format!("invalid index name '{index}'")));
        }
        Ok(self.root.join(index))
    }
}

#[async_trait]
impl IndexStore for FsIndexStore {
    async fn create(&self, index: &str) -> Result<()> {
        fs::create_dir_all(self.index_dir(index)?).await?;
        Ok(())
    }

    async fn delete(&self, index: &str) -> Result<()> {
        let dir = self.index_dir(index)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: &serde_json::Value,
    ) -> Result<()> {
        let dir = self.index_dir(index)?;
        fs::create_dir_all(&dir).await?;
        let body = serde_json::to_vec_pretty(mapping)?;
        fs::write(dir.join(format!("_mapping.{doc_type}.json")), body).await?;
        Ok(())
    }

    async fn bulk(&self, payload: &str) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        fs::write(self.root.join(format!("bulk-{n:06}.ndjson")), payload).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_numbered_payloads_and_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.create("movies").await.unwrap();
        store
            .put_mapping("movies", "movie", &serde_json::json!({"properties": {}}))
            .await
            .unwrap();
        store.bulk("a\nb\n").await.unwrap();
        store.bulk("c\nd\n").await.unwrap();

        assert!(dir.path().join("movies/_mapping.movie.json").exists());
        let second = std::fs::read_to_string(dir.path().join("bulk-000002.ndjson")).unwrap();
        assert_eq!(second, "c\nd\n");

        store.delete("movies").await.unwrap();
        store.delete("movies").await.unwrap();
        assert!(!dir.path().join("movies").exists());
    }

    #[tokio::test]
    async fn rejects_path_like_index_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        assert!(store.create("../escape").await.is_err());
    }
}
